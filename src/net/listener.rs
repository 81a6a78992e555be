//! TCP listener binding.
//!
//! # Responsibilities
//! - Normalise configured addresses (":8080" means all interfaces)
//! - Bind before anything is served so failures abort startup
//! - Hand a std listener to the HTTP engine

use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Address could not be parsed.
    Address { addr: String, reason: String },
    /// Failed to bind to address.
    Bind { addr: String, source: std::io::Error },
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Address { addr, reason } => {
                write!(f, "Invalid address {:?}: {}", addr, reason)
            }
            ListenerError::Bind { addr, source } => write!(f, "Failed to bind {}: {}", addr, source),
        }
    }
}

impl std::error::Error for ListenerError {}

impl From<ListenerError> for crate::Error {
    fn from(e: ListenerError) -> Self {
        match e {
            ListenerError::Address { addr, reason } => crate::Error::InvalidAddress { addr, reason },
            ListenerError::Bind { addr, source } => crate::Error::Bind { addr, source },
        }
    }
}

/// Parse a listen address, accepting the `":port"` shorthand.
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ListenerError> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    full.parse().map_err(|e: std::net::AddrParseError| ListenerError::Address {
        addr: addr.to_string(),
        reason: e.to_string(),
    })
}

/// A bound listener, not yet accepting.
#[derive(Debug)]
pub struct BoundListener {
    inner: std::net::TcpListener,
    local_addr: SocketAddr,
}

impl BoundListener {
    /// Bind to the given address.
    pub async fn bind(addr: &str) -> Result<Self, ListenerError> {
        let parsed = parse_listen_addr(addr)?;
        let bind_err = |source| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        };

        let listener = TcpListener::bind(parsed).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        let inner = listener.into_std().map_err(bind_err)?;

        tracing::debug!(address = %local_addr, "Listener bound");

        Ok(Self { inner, local_addr })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn into_std(self) -> std::net::TcpListener {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_means_all_interfaces() {
        let addr = parse_listen_addr(":9090").unwrap();
        assert_eq!(addr, "0.0.0.0:9090".parse().unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_listen_addr("localhost"),
            Err(ListenerError::Address { .. })
        ));
    }

    #[tokio::test]
    async fn bind_reports_address_in_use() {
        let first = BoundListener::bind("127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().to_string();
        let err = BoundListener::bind(&taken).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
        assert!(err.to_string().contains(&taken));
    }
}
