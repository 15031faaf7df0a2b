/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote host was unreachable or refused the connection.
    #[error("failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Writing a line to the stream failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading from the stream failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The connection was already closed locally.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_names_host_and_port() {
        let err = TransportError::ConnectFailed {
            host: "game.example".into(),
            port: 5555,
            source: std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            ),
        };
        let text = err.to_string();
        assert!(text.contains("game.example:5555"));
        assert!(text.contains("refused"));
    }
}
