use codec::CodecError;
use node_config::ConfigError;
use thiserror::Error;

/// Node construction errors
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid channel '{channel}': {source}")]
    Channel {
        channel: String,
        #[source]
        source: CodecError,
    },
}
