use crate::tpl::ast::{Directive, DirectiveKind, Node, NodeId, NodeKind, Tag, Tree};
use crate::tpl::tokenizer::{find_closing_paren, split_unquoted, tokenize};
use indexmap::IndexMap;
use log::debug;

/// Void elements: rendered as `<tag attrs>` with no closing tag.
const SELF_CLOSING_TAGS: [&str; 14] = [
    "br", "img", "hr", "input", "meta", "link", "source", "area", "base", "col", "embed", "param",
    "track", "wbr",
];

/// Bare names that count as boolean attributes in the space-separated form.
/// Any other bare word starts the inline text.
const BOOLEAN_ATTRS: [&str; 25] = [
    "disabled",
    "checked",
    "selected",
    "readonly",
    "required",
    "multiple",
    "autofocus",
    "hidden",
    "async",
    "defer",
    "novalidate",
    "open",
    "controls",
    "autoplay",
    "loop",
    "muted",
    "reversed",
    "ismap",
    "default",
    "formnovalidate",
    "nomodule",
    "playsinline",
    "allowfullscreen",
    "inert",
    "itemscope",
];

const DIRECTIVE_KEYWORDS: [&str; 6] = ["if", "elseif", "else", "for", "foreach", "include"];

/// A frame of the indentation stack.
///
/// `level` is the indentation level of the node that opened the frame and
/// `parent` the node collecting the children. The bottom frame stands for the
/// top level of the template (`level: None`, `parent: None`) and is never
/// popped.
struct Frame {
    level: Option<usize>,
    parent: Option<NodeId>,
}

/// Builds the node arena line by line.
///
/// Each classified line becomes a child of the nearest frame whose level is
/// strictly lower than its own. Tags without inline text (and not void) and
/// all directives push a new frame, so the following more-indented lines
/// become their children.
struct TreeBuilder {
    tree: Tree,
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            tree: Tree::default(),
            stack: vec![Frame {
                level: None,
                parent: None,
            }],
        }
    }

    fn push_line(&mut self, line_no: usize, raw: &str) {
        if raw.trim().is_empty() {
            return;
        }

        let spaces = raw.len() - raw.trim_start_matches(' ').len();
        let level = spaces / 2;
        let line = raw.trim();

        // Dropped lines leave the stack untouched.
        let Some(kind) = classify(line) else {
            if !line.starts_with("//") {
                debug!("line {}: dropped unparseable line `{}`", line_no, line);
            }
            return;
        };

        while self
            .stack
            .last()
            .is_some_and(|f| f.level.is_some_and(|l| l >= level))
        {
            self.stack.pop();
        }
        let parent = self.stack.last().and_then(|f| f.parent);

        let opens_scope = match &kind {
            NodeKind::Tag(tag) => tag.opens_block(),
            NodeKind::Directive(_) => true,
            NodeKind::Doctype | NodeKind::Text(_) => false,
        };

        let id = self.tree.push(
            parent,
            Node {
                level,
                kind,
                children: Vec::new(),
            },
        );

        if opens_scope {
            self.stack.push(Frame {
                level: Some(level),
                parent: Some(id),
            });
        }
    }

    fn finish(self) -> Tree {
        self.tree
    }
}

/// Main entry point: parse template source into a node tree.
pub fn parse_template(src: &str) -> Tree {
    let mut builder = TreeBuilder::new();
    for (i, raw) in split_lines(src).enumerate() {
        builder.push_line(i + 1, raw);
    }
    builder.finish()
}

/// Splits on `\r\n`, `\r` or `\n`.
fn split_lines(src: &str) -> impl Iterator<Item = &str> {
    src.split('\n')
        .flat_map(|l| l.strip_suffix('\r').unwrap_or(l).split('\r'))
}

/// Classifies one trimmed, non-blank line. `None` means the line contributes
/// nothing (comments and unparseable lines).
pub fn classify(line: &str) -> Option<NodeKind> {
    if line.starts_with("//") {
        return None;
    }

    if strip_keyword(line, "doctype").is_some() {
        return Some(NodeKind::Doctype);
    }

    if let Some(rest) = line.strip_prefix('|') {
        return Some(NodeKind::Text(rest.trim_start().to_string()));
    }

    if let Some(rest) = line.strip_prefix('@') {
        let name_len = ident_len(rest);
        if name_len == 0 {
            return None;
        }
        let name = rest[..name_len].to_ascii_lowercase();
        return Some(directive(&name, &rest[name_len..]));
    }

    for kw in DIRECTIVE_KEYWORDS {
        if let Some(args) = strip_keyword(line, kw) {
            return Some(directive(kw, args));
        }
    }

    parse_tag(line).map(NodeKind::Tag)
}

fn directive(name: &str, args: &str) -> NodeKind {
    NodeKind::Directive(Directive {
        kind: DirectiveKind::from_name(name),
        args: args.trim().to_string(),
    })
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Length of a leading `[A-Za-z_][A-Za-z0-9_]*` identifier, 0 if none.
fn ident_len(s: &str) -> usize {
    if !s.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return 0;
    }
    s.find(|c: char| !is_word_char(c)).unwrap_or(s.len())
}

/// Case-insensitive `keyword` prefix followed by a word boundary. Returns the
/// remainder of the line.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let head = line.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &line[keyword.len()..];
    if rest.starts_with(is_word_char) {
        return None;
    }
    Some(rest)
}

fn is_attr_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-'))
}

/// `name=value` with a valid attribute name and a non-empty value.
fn split_assignment(token: &str) -> Option<(&str, &str)> {
    let (name, value) = token.split_once('=')?;
    if is_attr_name(name) && !value.is_empty() {
        Some((name, value))
    } else {
        None
    }
}

/// Collects tag attributes, merging repeated `class` values.
#[derive(Default)]
struct AttrList {
    attrs: IndexMap<String, String>,
}

impl AttrList {
    fn insert(&mut self, name: &str, raw: &str) {
        if name == "class"
            && let Some(existing) = self.attrs.get_mut("class")
        {
            *existing = merge_class(existing, raw);
            return;
        }
        self.attrs.insert(name.to_string(), raw.to_string());
    }
}

/// Joins two raw class values. Two quoted literals stay one literal so that
/// interpolation markers keep working; anything else becomes a `~`
/// concatenation expression.
fn merge_class(first: &str, second: &str) -> String {
    let quoted = |s: &str| {
        s.len() >= 2
            && ((s.starts_with('"') && s.ends_with('"'))
                || (s.starts_with('\'') && s.ends_with('\'')))
    };
    if quoted(first) && quoted(second) {
        let q = &second[..1];
        format!(
            "{q}{} {}{q}",
            &first[1..first.len() - 1],
            &second[1..second.len() - 1]
        )
    } else {
        format!("({}) ~ ' ' ~ ({})", first, second)
    }
}

fn parse_tag(line: &str) -> Option<Tag> {
    if !line.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = line
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(line.len());
    let name = &line[..name_len];
    let mut rest = &line[name_len..];

    // `my_tag`: no word boundary after the name.
    if rest.starts_with('_') {
        return None;
    }

    let mut attrs = AttrList::default();

    // `.class` / `#id` shorthand glued to the name.
    let mut classes: Vec<&str> = Vec::new();
    let mut id: Option<&str> = None;
    loop {
        let Some(marker) = rest.chars().next().filter(|c| *c == '.' || *c == '#') else {
            break;
        };
        let body = &rest[1..];
        let len = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(body.len());
        if len == 0 || !body.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            break;
        }
        if marker == '.' {
            classes.push(&body[..len]);
        } else {
            id = Some(&body[..len]);
        }
        rest = &body[len..];
    }
    if !classes.is_empty() {
        attrs.insert("class", &format!("\"{}\"", classes.join(" ")));
    }
    if let Some(id) = id {
        attrs.insert("id", &format!("\"{}\"", id));
    }

    // `tag(name=value, flag)` attribute list.
    if rest.starts_with('(')
        && let Some(close) = find_closing_paren(rest)
    {
        for token in split_unquoted(&rest[1..close], |c| c == ' ' || c == ',') {
            if let Some((k, v)) = split_assignment(token) {
                attrs.insert(k, v);
            } else if is_attr_name(token) {
                attrs.insert(token, "true");
            }
        }
        rest = &rest[close + 1..];
    }

    let tokens = tokenize(rest.trim());
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if let Some((k, v)) = split_assignment(token) {
            attrs.insert(k, v);
        } else if is_attr_name(token) && BOOLEAN_ATTRS.contains(&token.to_ascii_lowercase().as_str())
        {
            attrs.insert(token, "true");
        } else {
            break;
        }
        i += 1;
    }

    let self_closing = SELF_CLOSING_TAGS.contains(&name.to_ascii_lowercase().as_str());
    let text = if i < tokens.len() && !self_closing {
        Some(tokens[i..].join(" "))
    } else {
        None
    };

    Some(Tag {
        name: name.to_string(),
        attrs: attrs.attrs,
        text,
        self_closing,
    })
}
