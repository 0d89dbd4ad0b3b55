pub mod ast;
pub(crate) mod engine;
pub mod escape;
pub mod expr;
pub(crate) mod include;
pub mod parser;
mod render;
pub(crate) mod render_context;
mod tokenizer;
