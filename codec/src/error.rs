use thiserror::Error;

/// Errors produced while decoding or enciphering text
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("No closing '{close}' for '{open}' at offset {offset}")]
    Unbalanced {
        open: char,
        close: char,
        offset: usize,
    },

    #[error("Unexpected '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("Unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("Unexpected input after value at offset {offset}")]
    TrailingInput { offset: usize },

    #[error("Expected a map")]
    ExpectedMap,

    #[error("Passcode must be ASCII")]
    NonAsciiPasscode,

    #[error("Text is not encrypted")]
    NotEncrypted,
}
