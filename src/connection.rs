//! Connection state machine.
//!
//! Sans-I/O: the connection owns a [`Transport`] for outbound bytes but is
//! driven entirely by inbound notifications (`on_connected`, `on_data`,
//! `on_eof`, `on_disconnected`) and API calls (`query`, `prepare`, `close`).
//! All inbound frames funnel through one dispatch over [`BackendMessage`].
//!
//! Exactly one query is on the wire at a time. Enqueued queries dispatch in
//! FIFO order, each triggered by the server's ReadyForQuery; enqueueing while
//! idle reuses the same dispatch path. `close()` is deferred until the queue
//! drains and the connection is idle, so the transport never closes mid-query.

use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::completion::{Completion, Resolver, channel};
use crate::conversion::decode_column;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::backend::{AuthRequest, BackendMessage, RowDescription};
use crate::protocol::frame::FrameBuffer;
use crate::protocol::frontend::{FrontendMessage, md5_password};
use crate::protocol::types::TransactionStatus;
use crate::row::Row;
use crate::sql;
use crate::statement::PreparedStatement;
use crate::transport::Transport;
use crate::value::Value;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport dial in progress, nothing sent yet
    Connecting,
    /// Startup sent, negotiating authentication
    AuthNegotiating,
    /// Idle, ready to dispatch the next query
    Ready,
    /// One query on the wire
    Busy,
    /// Close requested, draining the queue
    Closing,
    /// Transport closed
    Closed,
}

/// Where a dispatched query's outcome goes.
enum QuerySink {
    Rows(Resolver<Vec<Row>>),
    Prepare {
        resolver: Resolver<PreparedStatement>,
        name: String,
        param_count: usize,
    },
}

struct QueuedQuery {
    sql: String,
    sink: QuerySink,
}

/// A single PostgreSQL connection.
pub struct Connection<T: Transport> {
    transport: T,
    opts: Opts,
    state: ConnectionState,
    /// Runtime parameters reported by the server (DateStyle among them)
    params: Vec<(String, String)>,
    backend_key: Option<(i32, i32)>,
    transaction_status: TransactionStatus,
    frames: FrameBuffer,
    queue: VecDeque<QueuedQuery>,
    in_flight: Option<QuerySink>,
    row_desc: Option<Rc<RowDescription>>,
    rows: Vec<Row>,
    close_requested: bool,
    write_buf: Vec<u8>,
}

impl<T: Transport> Connection<T> {
    /// Create a connection over an already-dialing transport. Nothing is
    /// sent until [`Connection::on_connected`].
    pub fn new(transport: T, opts: Opts) -> Self {
        Self {
            transport,
            opts,
            state: ConnectionState::Connecting,
            params: Vec::new(),
            backend_key: None,
            transaction_status: TransactionStatus::Idle,
            frames: FrameBuffer::new(),
            queue: VecDeque::new(),
            in_flight: None,
            row_desc: None,
            rows: Vec::new(),
            close_requested: false,
            write_buf: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Latest value of a server-reported runtime parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Process id and secret key for out-of-band cancellation, once reported.
    pub fn backend_key(&self) -> Option<(i32, i32)> {
        self.backend_key
    }

    /// Transaction status from the last ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    // ---- inbound notifications -------------------------------------------

    /// The transport finished connecting: send the startup message.
    pub fn on_connected(&mut self) -> Result<()> {
        debug!(host = %self.opts.host, port = self.opts.port, "connected, sending startup");
        let startup = FrontendMessage::StartupMessage {
            options: self.opts.startup_options(),
        };
        if let Err(err) = self.send(&startup) {
            self.fail_connection();
            return Err(err);
        }
        self.state = ConnectionState::AuthNegotiating;
        Ok(())
    }

    /// The transport delivered bytes. Extracts and dispatches every complete
    /// frame; a malformed frame body is skipped, a broken frame boundary is
    /// fatal.
    pub fn on_data(&mut self, bytes: &[u8]) -> Result<()> {
        self.frames.push_bytes(bytes);
        loop {
            let frame = match self.frames.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(err) => {
                    warn!(%err, "frame boundary lost");
                    self.fail_connection();
                    return Err(err);
                }
            };
            match BackendMessage::parse(frame.tag, &frame.payload) {
                Ok(msg) => {
                    debug!(msg = msg.kind_name(), "server message");
                    if let Err(err) = self.handle(msg) {
                        self.fail_connection();
                        return Err(err);
                    }
                }
                Err(err) if err.is_recoverable_decode() => {
                    // Frame boundary is intact; drop the frame and go on.
                    warn!(tag = %(frame.tag as char), %err, "skipping undecodable frame");
                }
                Err(err) => {
                    self.fail_connection();
                    return Err(err);
                }
            }
        }
    }

    /// The server closed its end of the stream.
    pub fn on_eof(&mut self) {
        debug!("server closed the stream");
        self.fail_connection();
    }

    /// The transport dropped, possibly with an error.
    pub fn on_disconnected(&mut self, err: Option<Error>) {
        if let Some(err) = err {
            warn!(%err, "transport disconnected");
        }
        self.fail_connection();
    }

    // ---- public operations -----------------------------------------------

    /// Enqueue a statement verbatim. Resolves with the accumulated rows of
    /// its result set (empty for statements that return none).
    pub fn query(&mut self, sql: &str) -> Completion<Vec<Row>> {
        let (resolver, completion) = channel();
        self.enqueue(QueuedQuery {
            sql: sql.to_string(),
            sink: QuerySink::Rows(resolver),
        });
        completion
    }

    /// Enqueue a statement after inline `?` substitution.
    ///
    /// Fails synchronously, enqueueing nothing, when fewer arguments are
    /// supplied than placeholders.
    pub fn query_with(&mut self, sql: &str, args: &[Value]) -> Result<Completion<Vec<Row>>> {
        let bound = sql::bind_inline(sql, args)?;
        Ok(self.query(&bound))
    }

    /// Issue a server-side `PREPARE`, resolving with a [`PreparedStatement`]
    /// once the server confirms it.
    pub fn prepare(&mut self, sql: &str) -> Completion<PreparedStatement> {
        let (treated, param_count) = sql::numbered_placeholders(sql);
        let name = sql::statement_name(sql);
        let stmt = format!("PREPARE {name} AS {treated}");
        let (resolver, completion) = channel();
        self.enqueue(QueuedQuery {
            sql: stmt,
            sink: QuerySink::Prepare {
                resolver,
                name,
                param_count,
            },
        });
        completion
    }

    /// Schedule a graceful shutdown: the transport closes only after every
    /// queued query has resolved and the connection is idle.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed || self.close_requested {
            return;
        }
        self.close_requested = true;
        if self.state == ConnectionState::Ready && self.queue.is_empty() {
            self.finish_close();
        } else {
            self.state = ConnectionState::Closing;
        }
    }

    // ---- dispatch --------------------------------------------------------

    fn handle(&mut self, msg: BackendMessage) -> Result<()> {
        match msg {
            BackendMessage::Authentication(auth) => self.handle_auth(auth),
            BackendMessage::ErrorResponse(fields) => {
                if fields.is_fatal() {
                    warn!("fatal server error: {fields}");
                    if let Some(sink) = self.in_flight.take() {
                        resolve_err(sink, Error::Server(fields.clone()));
                    }
                    self.fail_connection();
                    return Err(Error::Server(fields));
                }
                match self.in_flight.take() {
                    // The failed query still gets its ReadyForQuery; the
                    // next dispatch happens there.
                    Some(sink) => resolve_err(sink, Error::Server(fields)),
                    None => warn!("server error: {fields}"),
                }
                Ok(())
            }
            BackendMessage::NoticeResponse(fields) => {
                debug!("server notice: {fields}");
                Ok(())
            }
            BackendMessage::ParameterStatus { name, value } => {
                debug!(%name, %value, "parameter status");
                match self.params.iter_mut().find(|(k, _)| *k == name) {
                    Some(entry) => entry.1 = value,
                    None => self.params.push((name, value)),
                }
                Ok(())
            }
            BackendMessage::BackendKeyData { pid, secret } => {
                self.backend_key = Some((pid, secret));
                Ok(())
            }
            BackendMessage::ReadyForQuery { status } => {
                self.transaction_status = match TransactionStatus::from_byte(status) {
                    Some(status) => status,
                    None => {
                        warn!(status = %(status as char), "unknown transaction status");
                        TransactionStatus::Idle
                    }
                };
                self.dispatch_next();
                Ok(())
            }
            BackendMessage::RowDescription(desc) => {
                self.row_desc = Some(Rc::new(desc));
                self.rows.clear();
                Ok(())
            }
            BackendMessage::DataRow(columns) => {
                self.handle_data_row(columns);
                Ok(())
            }
            BackendMessage::CommandComplete { tag } => {
                debug!(%tag, "command complete");
                self.handle_command_complete();
                Ok(())
            }
        }
    }

    fn handle_auth(&mut self, auth: AuthRequest) -> Result<()> {
        match auth {
            AuthRequest::Ok => {
                debug!("authentication ok");
                Ok(())
            }
            AuthRequest::CleartextPassword => {
                let password = self.require_password()?.to_string();
                self.send(&FrontendMessage::PasswordMessage { password })
            }
            AuthRequest::Md5Password { salt } => {
                let password = self.require_password()?;
                let digest = md5_password(&self.opts.user, password, &salt);
                self.send(&FrontendMessage::PasswordMessage { password: digest })
            }
            // No reply path exists for these; stalling silently would hang
            // every queued completion, so fail the connection up front.
            other => Err(Error::UnsupportedAuth(other.method_name().to_string())),
        }
    }

    fn require_password(&self) -> Result<&str> {
        self.opts
            .password
            .as_deref()
            .ok_or_else(|| Error::Auth("server requested a password but none is configured".into()))
    }

    fn handle_data_row(&mut self, columns: Vec<Option<Vec<u8>>>) {
        let Some(desc) = self.row_desc.clone() else {
            warn!("data row without a row description, dropping");
            return;
        };
        if columns.len() != desc.fields.len() {
            warn!(
                got = columns.len(),
                declared = desc.fields.len(),
                "data row column count mismatch"
            );
        }
        let datestyle = self.parameter("DateStyle").map(str::to_owned);
        let values = columns
            .iter()
            .zip(desc.fields.iter())
            .map(|(raw, field)| decode_column(raw.as_deref(), field, datestyle.as_deref()))
            .collect();
        self.rows.push(Row::new(desc, values));
    }

    fn handle_command_complete(&mut self) {
        self.row_desc = None;
        let rows = std::mem::take(&mut self.rows);
        match self.in_flight.take() {
            Some(QuerySink::Rows(resolver)) => resolver.resolve(Ok(rows)),
            Some(QuerySink::Prepare {
                resolver,
                name,
                param_count,
            }) => resolver.resolve(Ok(PreparedStatement::new(name, param_count))),
            None => debug!("command complete with no in-flight query"),
        }
    }

    // ---- queue machinery -------------------------------------------------

    fn enqueue(&mut self, query: QueuedQuery) {
        match self.state {
            ConnectionState::Closed | ConnectionState::Closing => {
                resolve_err(query.sink, Error::ConnectionBroken);
            }
            ConnectionState::Ready => {
                self.queue.push_back(query);
                // Enqueue is the wake-up signal when idle.
                self.dispatch_next();
            }
            _ => self.queue.push_back(query),
        }
    }

    /// ReadyForQuery dispatch: run the queue head, or close, or go idle.
    fn dispatch_next(&mut self) {
        if let Some(query) = self.queue.pop_front() {
            debug!(sql = %query.sql, "dispatching query");
            let msg = FrontendMessage::Query {
                sql: query.sql.clone(),
            };
            match self.send(&msg) {
                Ok(()) => {
                    self.in_flight = Some(query.sink);
                    self.state = if self.close_requested {
                        ConnectionState::Closing
                    } else {
                        ConnectionState::Busy
                    };
                }
                Err(err) => {
                    warn!(%err, "send failed, closing");
                    resolve_err(query.sink, err);
                    self.fail_connection();
                }
            }
        } else if self.close_requested {
            self.finish_close();
        } else {
            self.state = ConnectionState::Ready;
        }
    }

    fn finish_close(&mut self) {
        debug!("closing connection");
        if let Err(err) = self.send(&FrontendMessage::Terminate) {
            debug!(%err, "terminate not sent");
        }
        if let Err(err) = self.transport.close() {
            debug!(%err, "transport close failed");
        }
        self.state = ConnectionState::Closed;
    }

    /// Tear down after an unrecoverable failure. Dropping the sinks resolves
    /// every outstanding completion with `ConnectionBroken`.
    fn fail_connection(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.in_flight = None;
        self.queue.clear();
        self.rows.clear();
        self.row_desc = None;
        if let Err(err) = self.transport.close() {
            debug!(%err, "transport close failed");
        }
        self.state = ConnectionState::Closed;
    }

    fn send(&mut self, msg: &FrontendMessage) -> Result<()> {
        self.write_buf.clear();
        msg.encode(&mut self.write_buf)?;
        debug!(msg = msg.kind_name(), bytes = self.write_buf.len(), "send");
        self.transport.send(&self.write_buf)
    }
}

fn resolve_err(sink: QuerySink, err: Error) {
    match sink {
        QuerySink::Rows(resolver) => resolver.resolve(Err(err)),
        QuerySink::Prepare { resolver, .. } => resolver.resolve(Err(err)),
    }
}
