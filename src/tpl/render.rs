use crate::Result;
use crate::tpl::ast::{DirectiveKind, NodeId, NodeKind, Tag, Tree};
use crate::tpl::engine::RenderOptions;
use crate::tpl::escape::{Escape, eval_attr_value, html_escape, interpolate};
use crate::tpl::expr::evaluate;
use crate::tpl::include;
use crate::tpl::render_context::Context;
use crate::value::Value;
use log::debug;
use std::path::Path;

const DOCTYPE: &str = "<!DOCTYPE html>\n";

/// Walks a parsed [`Tree`] and produces markup.
///
/// The tree is shared and never modified; all state lives in the context
/// passed to [`Renderer::render`].
pub(crate) struct Renderer<'a> {
    tree: &'a Tree,
    /// Directory relative includes resolve against.
    base_dir: &'a Path,
    options: &'a RenderOptions,
    /// Number of includes above this template.
    depth: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(tree: &'a Tree, base_dir: &'a Path, options: &'a RenderOptions, depth: usize) -> Self {
        Self {
            tree,
            base_dir,
            options,
            depth,
        }
    }

    pub fn render(&self, ctx: &mut Context) -> Result<String> {
        let mut out = String::new();
        self.render_nodes(self.tree.roots(), ctx, &mut out)?;
        Ok(out)
    }

    fn render_nodes(&self, ids: &[NodeId], ctx: &mut Context, out: &mut String) -> Result<()> {
        // 游标式遍历：if 链会跳过已消费的 elseif/else 兄弟节点
        let mut i = 0;
        while i < ids.len() {
            let node = self.tree.node(ids[i]);
            match &node.kind {
                NodeKind::Doctype => out.push_str(DOCTYPE),
                NodeKind::Text(text) => {
                    out.push_str(&html_escape(text));
                    out.push('\n');
                }
                NodeKind::Tag(tag) => self.render_tag(ids[i], tag, ctx, out)?,
                NodeKind::Directive(d) => match &d.kind {
                    DirectiveKind::If => {
                        i = self.render_if_chain(ids, i, ctx, out)?;
                    }
                    DirectiveKind::For | DirectiveKind::Foreach => {
                        self.render_loop(ids[i], &d.args, ctx, out)?;
                    }
                    DirectiveKind::Include => {
                        let html =
                            include::render_include(&d.args, ctx, self.base_dir, self.options, self.depth)?;
                        out.push_str(&html);
                    }
                    DirectiveKind::ElseIf | DirectiveKind::Else => {
                        debug!("`{}` without a preceding `if`, skipped", d.kind.name());
                    }
                    DirectiveKind::Custom(name) => {
                        debug!("unknown directive `@{}`, skipped", name);
                    }
                },
            }
            i += 1;
        }
        Ok(())
    }

    fn render_tag(&self, id: NodeId, tag: &Tag, ctx: &mut Context, out: &mut String) -> Result<()> {
        out.push('<');
        out.push_str(&tag.name);
        for (name, raw) in &tag.attrs {
            match eval_attr_value(raw, ctx) {
                Value::Bool(true) => {
                    out.push(' ');
                    out.push_str(name);
                }
                Value::Bool(false) | Value::Null => {}
                v => {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape(&v.to_attr_string()));
                    out.push('"');
                }
            }
        }
        out.push('>');

        if tag.self_closing {
            out.push('\n');
            return Ok(());
        }
        if let Some(text) = &tag.text {
            out.push_str(&interpolate(text, ctx, Escape::Html));
        } else {
            out.push('\n');
            self.render_nodes(self.tree.children(id), ctx, out)?;
        }
        out.push_str("</");
        out.push_str(&tag.name);
        out.push_str(">\n");
        Ok(())
    }

    /// Renders the `if` at `ids[start]` together with the `elseif`/`else`
    /// siblings that follow it on the same level. Returns the index of the
    /// last sibling belonging to the chain.
    fn render_if_chain(
        &self,
        ids: &[NodeId],
        start: usize,
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<usize> {
        let level = self.tree.node(ids[start]).level;
        let mut chosen: Option<NodeId> = None;
        let mut last = start;

        for (offset, &id) in ids[start..].iter().enumerate() {
            let node = self.tree.node(id);
            let Some(d) = node.directive() else { break };
            let in_chain = match d.kind {
                DirectiveKind::If => offset == 0,
                DirectiveKind::ElseIf | DirectiveKind::Else => offset > 0 && node.level == level,
                _ => false,
            };
            if !in_chain {
                break;
            }
            last = start + offset;

            if chosen.is_some() {
                continue;
            }
            let taken = match d.kind {
                DirectiveKind::Else => true,
                _ => !d.args.is_empty() && evaluate(&d.args, ctx).is_truthy(),
            };
            if taken {
                chosen = Some(id);
            }
        }

        if let Some(id) = chosen {
            self.render_nodes(self.tree.children(id), ctx, out)?;
        }
        Ok(last)
    }

    fn render_loop(&self, id: NodeId, args: &str, ctx: &mut Context, out: &mut String) -> Result<()> {
        let Some(header) = LoopHeader::parse(args) else {
            debug!("malformed loop `{}`, skipped", args);
            return Ok(());
        };

        let iterable = evaluate(header.iterable, ctx);
        let Some(entries) = iterable.entries() else {
            debug!("loop over non-iterable {} `{}`", iterable.type_name(), header.iterable);
            return Ok(());
        };

        let names: Vec<&str> = header.key.iter().copied().chain([header.value]).collect();
        let body = self.tree.children(id);
        for (key, value) in entries {
            let cp = ctx.checkpoint(&names);
            if let Some(k) = header.key {
                ctx.set(k, key);
            }
            ctx.set(header.value, value.clone());
            let rendered = self.render_nodes(body, ctx, out);
            ctx.rollback(cp);
            rendered?;
        }
        Ok(())
    }
}

/// Parsed loop header: `v in E`, `k, v in E`, `E as $v` or `E as $k => $v`.
#[derive(Debug, PartialEq)]
struct LoopHeader<'s> {
    key: Option<&'s str>,
    value: &'s str,
    iterable: &'s str,
}

impl<'s> LoopHeader<'s> {
    fn parse(args: &'s str) -> Option<Self> {
        let args = args.trim();
        Self::parse_in(args).or_else(|| Self::parse_as(args))
    }

    fn parse_in(args: &'s str) -> Option<Self> {
        let (start, end) = find_keyword(args, "in", Find::First)?;
        let iterable = args[end..].trim();
        if iterable.is_empty() {
            return None;
        }
        let (key, value) = match args[..start].split_once(',') {
            Some((k, v)) => (Some(binding_name(k)?), binding_name(v)?),
            None => (None, binding_name(&args[..start])?),
        };
        Some(Self {
            key,
            value,
            iterable,
        })
    }

    fn parse_as(args: &'s str) -> Option<Self> {
        let (start, end) = find_keyword(args, "as", Find::LastAnyCase)?;
        let iterable = args[..start].trim();
        if iterable.is_empty() {
            return None;
        }
        let (key, value) = match args[end..].split_once("=>") {
            Some((k, v)) => (Some(binding_name(k)?), binding_name(v)?),
            None => (None, binding_name(&args[end..])?),
        };
        Some(Self {
            key,
            value,
            iterable,
        })
    }
}

#[derive(Clone, Copy)]
enum Find {
    /// First occurrence, exact case (`in`).
    First,
    /// Last occurrence, any case (`as`).
    LastAnyCase,
}

/// Byte range of `kw` as a whitespace-delimited word.
fn find_keyword(s: &str, kw: &str, find: Find) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let is_ws = |i: usize| bytes.get(i).is_some_and(|b| b.is_ascii_whitespace());
    let matches = |w: &str| match find {
        Find::First => w == kw,
        Find::LastAnyCase => w.eq_ignore_ascii_case(kw),
    };
    let mut hits = (1..s.len().saturating_sub(kw.len()))
        .filter(|&i| is_ws(i - 1) && is_ws(i + kw.len()))
        .filter(|&i| s.get(i..i + kw.len()).is_some_and(matches))
        .map(|i| (i, i + kw.len()));
    match find {
        Find::First => hits.next(),
        Find::LastAnyCase => hits.last(),
    }
}

/// A loop variable: an identifier with an optional `$`.
fn binding_name(s: &str) -> Option<&str> {
    let s = s.trim();
    let name = s.strip_prefix('$').unwrap_or(s);
    let mut chars = name.chars();
    let first = chars.next()?;
    if (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Some(name)
    } else {
        None
    }
}
