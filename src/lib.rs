//! A sans-I/O PostgreSQL client for the v3 frontend/backend protocol.
//!
//! # Features
//!
//! - **Sans-I/O state machine**: the connection never touches a socket; the
//!   embedding application supplies a [`Transport`] and feeds inbound bytes
//! - **FIFO query pipeline**: queries enqueue without blocking and resolve
//!   strictly in call order, one on the wire at a time
//! - **Text-protocol marshaling**: BOOL/INT/temporal columns decode to
//!   native values, driven by the server-reported DateStyle
//! - **Deferred close**: `close()` drains the queue before the transport
//!   goes away, so a shutdown never desynchronizes a query mid-flight
//!
//! # Example
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use std::net::TcpStream;
//!
//! use solo_postgres::{Connection, Opts, Transport};
//!
//! struct Tcp(TcpStream);
//!
//! impl Transport for Tcp {
//!     fn send(&mut self, bytes: &[u8]) -> solo_postgres::Result<()> {
//!         self.0.write_all(bytes)?;
//!         Ok(())
//!     }
//!     fn close(&mut self) -> solo_postgres::Result<()> {
//!         self.0.shutdown(std::net::Shutdown::Both)?;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> solo_postgres::Result<()> {
//!     let opts = Opts {
//!         user: "postgres".into(),
//!         database: Some("mydb".into()),
//!         password: Some("secret".into()),
//!         ..Default::default()
//!     };
//!
//!     let stream = TcpStream::connect((opts.host.as_str(), opts.port))?;
//!     let mut conn = Connection::new(Tcp(stream.try_clone()?), opts);
//!     conn.on_connected()?;
//!
//!     let pending = conn.query("SELECT 1 AS num");
//!     let mut stream = stream;
//!     let mut buf = [0u8; 4096];
//!     while !pending.is_resolved() {
//!         let n = stream.read(&mut buf)?;
//!         if n == 0 {
//!             conn.on_eof();
//!             break;
//!         }
//!         conn.on_data(&buf[..n])?;
//!     }
//!     for row in pending.try_take().transpose()?.unwrap_or_default() {
//!         println!("num = {:?}", row.get("num"));
//!     }
//!
//!     conn.close();
//!     Ok(())
//! }
//! ```

pub mod completion;
pub mod connection;
pub mod conversion;
pub mod error;
pub mod opts;
pub mod protocol;
pub mod row;
pub mod sql;
pub mod statement;
pub mod transport;
pub mod value;

pub use completion::Completion;
pub use connection::{Connection, ConnectionState};
pub use conversion::datetime::{PgTimestamp, format_date_for_postgres, parse_date_from_postgres};
pub use error::{Error, ErrorFields, Result};
pub use opts::Opts;
pub use protocol::types::{FormatCode, Oid, TransactionStatus};
pub use row::Row;
pub use statement::PreparedStatement;
pub use transport::Transport;
pub use value::Value;
