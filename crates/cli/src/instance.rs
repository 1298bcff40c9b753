//! Single-instance guard for the daemon.
//!
//! Two daemons would both hook the keyboard and both open a popup on every
//! press. The first daemon holds a loopback port for its whole lifetime; a
//! second one fails to bind it and exits.

use anyhow::{bail, Result};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use tracing::debug;

/// Port reserved by a running daemon.
pub const INSTANCE_PORT: u16 = 47_391;

/// Held for as long as this process is the running daemon.
#[derive(Debug)]
pub struct InstanceGuard {
    _listener: TcpListener,
}

impl InstanceGuard {
    pub fn acquire() -> Result<Self> {
        Self::acquire_on(SocketAddr::from(([127, 0, 0, 1], INSTANCE_PORT)))
    }

    pub fn acquire_on(addr: SocketAddr) -> Result<Self> {
        match TcpListener::bind(addr) {
            Ok(listener) => {
                debug!("Instance lock held on {}", addr);
                Ok(Self {
                    _listener: listener,
                })
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                bail!("paste-helper is already running")
            }
            Err(e) => bail!("Failed to take the instance lock on {}: {}", addr, e),
        }
    }
}
