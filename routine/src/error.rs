use thiserror::Error;

/// Command language parse errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Command has no name: '{0}'")]
    EmptyCommand(String),
}
