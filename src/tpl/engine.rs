use crate::Result;
use crate::tpl::include;
use crate::tpl::parser::parse_template;
use crate::tpl::render::Renderer;
use crate::tpl::render_context::Context;
use log::debug;
use std::path::{Path, PathBuf};

/// Render-time limits.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Maximum number of nested includes. `None` means unbounded, so a
    /// template that includes itself recurses until the stack runs out.
    pub max_include_depth: Option<usize>,
}

/// Entry point for rendering templates.
///
/// An `Engine` holds no state besides its options; each call parses the
/// template afresh and renders against its own copy of the caller's
/// context, so one engine can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    options: RenderOptions,
}

impl Engine {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Renders template source text.
    ///
    /// Relative includes resolve against `base_dir`, or the current working
    /// directory when `None`.
    pub fn render(&self, source: &str, ctx: &Context, base_dir: Option<&Path>) -> Result<String> {
        let base_dir = match base_dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        debug!("render template ({} bytes), base dir {}", source.len(), base_dir.display());

        let tree = parse_template(source);
        let mut ctx = ctx.clone();
        Renderer::new(&tree, &base_dir, &self.options, 0).render(&mut ctx)
    }

    /// Reads and renders the template at `path`; its includes resolve
    /// against the file's own directory.
    pub fn render_file(&self, path: impl AsRef<Path>, ctx: &Context) -> Result<String> {
        let path = path.as_ref();
        debug!("render template file {}", path.display());
        include::render_file(path, ctx.clone(), &self.options, 0)
    }
}
