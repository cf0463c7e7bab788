//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind to the configured host and port
//! - Turn "address in use" into a dedicated, clearly worded error

use std::io;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Port {port} is already in use")]
    AddrInUse { port: u16 },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Bind the gateway listener.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let address = config.bind_address();

    let listener = TcpListener::bind(&address).await.map_err(|source| {
        if source.kind() == io::ErrorKind::AddrInUse {
            ListenerError::AddrInUse { port: config.port }
        } else {
            ListenerError::Bind {
                address: address.clone(),
                source,
            }
        }
    })?;

    if let Ok(local_addr) = listener.local_addr() {
        tracing::info!(address = %local_addr, "Listener bound");
    }
    Ok(listener)
}
