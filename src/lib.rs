//! jvpug: an indentation-based (Pug-like) HTML template engine.
//!
//! ```
//! use jvpug::context;
//!
//! let ctx = context! { name => "Jane", items => vec!["a", "b"] };
//! let html = jvpug::render("p Hello #{name}\nfor item in items\n  li(class=\"item\") #{item}", &ctx, None)?;
//! assert_eq!(
//!     html,
//!     "<p>Hello Jane</p>\n<li class=\"item\">a</li>\n<li class=\"item\">b</li>\n"
//! );
//! # Ok::<(), jvpug::error::TplError>(())
//! ```

extern crate self as jvpug;

pub mod error;
pub mod tpl;
pub mod value;

use std::path::Path;

pub use error::TplError;
pub use jvpug_macros::ToValue;
pub use tpl::ast::Tree;
pub use tpl::engine::{Engine, RenderOptions};
pub use tpl::render_context::{Checkpoint, Context};
pub use value::{Map, ToValue, Value};

pub type Result<T> = std::result::Result<T, TplError>;

/// Parses template source into its node tree without rendering it.
pub fn parse(source: &str) -> Tree {
    tpl::parser::parse_template(source)
}

/// Renders template source with the default [`Engine`].
pub fn render(source: &str, ctx: &Context, base_dir: Option<&Path>) -> Result<String> {
    Engine::default().render(source, ctx, base_dir)
}

/// Renders a template file with the default [`Engine`].
pub fn render_file(path: impl AsRef<Path>, ctx: &Context) -> Result<String> {
    Engine::default().render_file(path, ctx)
}
