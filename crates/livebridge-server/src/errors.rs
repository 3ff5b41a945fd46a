use std::io;
use std::net::SocketAddr;

use livebridge_core::{BridgeError, ConfigError, WatchError};

/// All error types for the livebridge-server crate.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl BridgeError for ServerError {
    fn error_code(&self) -> &'static str {
        match self {
            ServerError::Config(e) => e.error_code(),
            ServerError::Watch(e) => e.error_code(),
            ServerError::Bind { .. } => "SERVER_BIND_FAILED",
            ServerError::HttpClient(_) => "HTTP_CLIENT_INIT_FAILED",
            ServerError::Io(_) => "SERVER_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        match self {
            ServerError::Config(e) => e.is_user_error(),
            ServerError::Watch(e) => e.is_user_error(),
            ServerError::Bind { .. } => true,
            ServerError::HttpClient(_) | ServerError::Io(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_bind_error() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:6544".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(
            err.to_string(),
            "failed to bind 127.0.0.1:6544: address in use"
        );
        assert_eq!(err.error_code(), "SERVER_BIND_FAILED");
        assert!(err.is_user_error());
    }

    #[test]
    fn test_watch_error_keeps_inner_code() {
        let err: ServerError = WatchError::WatchedPathMissing {
            path: PathBuf::from("/tmp/missing.jinja2"),
        }
        .into();
        assert_eq!(err.error_code(), "WATCHED_PATH_MISSING");
        assert!(err.is_user_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: ServerError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert_eq!(err.error_code(), "SERVER_IO_ERROR");
        assert!(!err.is_user_error());
    }
}
