use indexmap::IndexMap;

/// Index of a node inside a [`Tree`] arena.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveKind {
    If,
    ElseIf,
    Else,
    For,
    Foreach,
    Include,
    /// `@name ...` lines. Reserved for site-specific extensions; the renderer
    /// ignores them.
    Custom(String),
}

impl DirectiveKind {
    /// Maps a lower-cased directive name to its kind.
    pub fn from_name(name: &str) -> Self {
        match name {
            "if" => DirectiveKind::If,
            "elseif" => DirectiveKind::ElseIf,
            "else" => DirectiveKind::Else,
            "for" => DirectiveKind::For,
            "foreach" => DirectiveKind::Foreach,
            "include" => DirectiveKind::Include,
            other => DirectiveKind::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DirectiveKind::If => "if",
            DirectiveKind::ElseIf => "elseif",
            DirectiveKind::Else => "else",
            DirectiveKind::For => "for",
            DirectiveKind::Foreach => "foreach",
            DirectiveKind::Include => "include",
            DirectiveKind::Custom(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    /// Attribute name -> raw, unevaluated value expression, in source order.
    pub attrs: IndexMap<String, String>,
    /// Inline text; when present the tag never has a nested block.
    pub text: Option<String>,
    pub self_closing: bool,
}

impl Tag {
    /// Whether the following, more indented lines belong to this tag.
    pub fn opens_block(&self) -> bool {
        !self.self_closing && self.text.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub args: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Doctype,
    /// `| text` lines; rendered escaped, without interpolation.
    Text(String),
    Tag(Tag),
    Directive(Directive),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Indentation level (leading spaces / 2). Only meaningful while building
    /// the tree and for matching `if`/`elseif`/`else` siblings.
    pub level: usize,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn directive(&self) -> Option<&Directive> {
        match &self.kind {
            NodeKind::Directive(d) => Some(d),
            _ => None,
        }
    }
}

/// Parsed template: a node arena plus the ordered top-level node ids.
/// Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Tree {
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends `node` under `parent` (or at the top level) and returns its id.
    pub(crate) fn push(&mut self, parent: Option<NodeId>, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}
