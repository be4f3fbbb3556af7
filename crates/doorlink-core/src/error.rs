use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Invalid correlation id: {0}")]
    InvalidCorrelationId(String),

    #[error("Invalid module id: {0}")]
    InvalidModuleId(String),

    // IO errors (required by the tokio codec traits)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let err: Error = std::io::Error::other("socket gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "IO error: socket gone");
    }

    #[test]
    fn test_protocol_error_display() {
        let err = Error::InvalidModuleId("\"\"".to_string());
        assert_eq!(err.to_string(), "Invalid module id: \"\"");
    }
}
