//! Ownership of the display connection.

use grabber_platform::error::{GrabError, GrabResult};
use grabber_platform::protocol::{LinkError, Protocol};
use tracing::{debug, info, warn};

use crate::error_channel::{self, error_hook};

/// Owns the protocol binding and its single server connection
pub struct ConnectionManager<P: Protocol> {
    protocol: P,
    conn: Option<P::Connection>,
}

impl<P: Protocol> ConnectionManager<P> {
    /// Install the error hook, then connect to `display` (or `$DISPLAY`).
    pub fn open(protocol: P, display: Option<&str>) -> GrabResult<Self> {
        protocol.install_error_hook(error_hook);

        let conn = error_channel::guarded("open_connection", || protocol.open_connection(display))?
            .map_err(|e| GrabError::Connection(e.to_string()))?;

        let target = display.unwrap_or("default display");
        info!("display connection open ({})", target);
        Ok(Self {
            protocol,
            conn: Some(conn),
        })
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Run one protocol operation against the live connection and drain the
    /// error channel right after it.
    pub fn call<'a, T>(
        &'a self,
        name: &'static str,
        f: impl FnOnce(&'a P, &'a P::Connection) -> Result<T, LinkError>,
    ) -> GrabResult<T> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| GrabError::Connection("connection is closed".into()))?;

        debug!("protocol call {}", name);
        error_channel::guarded(name, || f(&self.protocol, conn))?
            .map_err(|e| GrabError::Connection(format!("{name}: {e}")))
    }

    /// Release the connection. Later calls are no-ops.
    pub fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Err(e) = error_channel::guarded("close_connection", || self.protocol.close_connection(conn)) {
            warn!("error while closing display connection: {}", e);
        }
        info!("display connection closed");
    }
}

impl<P: Protocol> Drop for ConnectionManager<P> {
    fn drop(&mut self) {
        self.close();
    }
}
