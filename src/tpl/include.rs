use crate::Result;
use crate::error::TplError;
use crate::tpl::engine::RenderOptions;
use crate::tpl::escape::eval_attr_value;
use crate::tpl::expr::is_ident;
use crate::tpl::parser::parse_template;
use crate::tpl::render::Renderer;
use crate::tpl::render_context::Context;
use crate::tpl::tokenizer::{strip_quotes, tokenize};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves an include target against the directory of the including
/// template. Absolute targets are returned unchanged.
pub fn resolve_path(base_dir: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        base_dir.join(target)
    }
}

/// Directory that includes inside `path` resolve against.
pub(crate) fn base_dir_of(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

pub(crate) fn read_template(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| TplError::TemplateReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads, parses and renders the template at `path`. `ctx` is this
/// template's own copy of the context.
pub(crate) fn render_file(
    path: &Path,
    mut ctx: Context,
    options: &RenderOptions,
    depth: usize,
) -> Result<String> {
    let source = read_template(path)?;
    let tree = parse_template(&source);
    Renderer::new(&tree, base_dir_of(path), options, depth).render(&mut ctx)
}

/// Copies `ctx` and binds each `name=value` parameter on the copy. Values
/// are evaluated against the caller's context; tokens whose name is not an
/// identifier are skipped.
fn overlay_params(ctx: &Context, params: &[&str]) -> Context {
    // 参数在当前上下文中求值，再覆盖到副本上
    let mut merged = ctx.clone();
    for param in params {
        match param.split_once('=') {
            Some((name, raw)) if is_ident(name) && !raw.is_empty() => {
                merged.set(name, eval_attr_value(raw, ctx));
            }
            _ => debug!("include parameter `{}` ignored", param),
        }
    }
    merged
}

/// `include path [name=value ...]`
pub(crate) fn render_include(
    args: &str,
    ctx: &Context,
    base_dir: &Path,
    options: &RenderOptions,
    depth: usize,
) -> Result<String> {
    let tokens = tokenize(args);
    let Some((target, params)) = tokens.split_first() else {
        debug!("include without a target, skipped");
        return Ok(String::new());
    };

    let depth = depth + 1;
    if let Some(max) = options.max_include_depth
        && depth > max
    {
        return Err(TplError::IncludeDepthExceeded(max));
    }

    let merged = overlay_params(ctx, params);
    let path = resolve_path(base_dir, strip_quotes(target));
    debug!("include {} (depth {})", path.display(), depth);
    render_file(&path, merged, options, depth)
}
