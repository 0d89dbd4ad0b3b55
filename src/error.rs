use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TplError {
    #[error("Template Read Error: {}: {source}", .path.display())]
    TemplateReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Include Depth Exceeded: more than {0} nested includes")]
    IncludeDepthExceeded(usize),
    #[error("Serialization Error: {0}")]
    SerializationError(String),
    #[error("Invalid Context: {0}")]
    InvalidContext(String),
}

impl serde::ser::Error for TplError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        TplError::SerializationError(msg.to_string())
    }
}
