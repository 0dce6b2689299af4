use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Host I/O error: {0}")]
    HostIoError(String),

    #[error("Stream protocol error: {0}")]
    ProtocolError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Operation error: {0}")]
    OperationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`BridgeError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl BridgeError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a host I/O error.
    host_io => HostIoError,
    /// Create a stream protocol error.
    protocol => ProtocolError,
    /// Create a decode error.
    decode => DecodeError,
    /// Create an encode error.
    encode => EncodeError,
    /// Create an unsupported format error.
    unsupported_format => UnsupportedFormat,
    /// Create a configuration error.
    config => ConfigError,
    /// Create an operation error.
    operation => OperationError,
}

impl From<image::ImageError> for BridgeError {
    fn from(e: image::ImageError) -> Self {
        use image::ImageError;
        match e {
            ImageError::Encoding(_) => Self::EncodeError(e.to_string()),
            ImageError::Unsupported(_) => Self::UnsupportedFormat(e.to_string()),
            ImageError::IoError(io) => Self::IoError(io),
            other => Self::DecodeError(other.to_string()),
        }
    }
}

impl From<serde_yml::Error> for BridgeError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
