//! Transport seam.
//!
//! The connection is sans-I/O: it never opens sockets. The embedding
//! application provides a [`Transport`] for outbound bytes and feeds inbound
//! events back through `Connection::on_*` methods. Any byte stream works -
//! a blocking `TcpStream`, an async socket driven by a local executor, or a
//! capture buffer in tests.

use crate::error::Result;

/// Outbound half of a connection's byte stream.
pub trait Transport {
    /// Send bytes to the server. Partial writes must be handled internally;
    /// on return the whole buffer is accepted or an error is reported.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Close the underlying stream.
    fn close(&mut self) -> Result<()>;
}
