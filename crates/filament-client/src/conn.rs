//! Connection — socket ownership, framing and the session state machine.
//!
//! One connection owns one socket, one session id and (for token sessions)
//! one bearer token. Requests and responses are strictly FIFO; there is no
//! multiplexing. The receive path is readiness-driven over a non-blocking
//! socket with an adaptive timeout: patient for the first byte, tightening
//! while full buffers arrive, relaxing on partial ones, and giving up
//! after a fixed number of consecutive idle polls.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream as StdTcpStream;
use std::time::Duration;

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};

use filament_wire::exec::{Value, ValueMap, require_i64};
use filament_wire::ops::{self, Opcode, Operation};
use filament_wire::{Error, Reader, Result, Writer};

use crate::config::{DriverConfig, ReceiveConfig};

const SOCKET: Token = Token(0);

/// Connection lifecycle. Only `DbOpen` supports data operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Closed,
    /// Greeting received, nothing authenticated yet.
    Greeted,
    /// CONNECT succeeded; server-level operations are available.
    Authenticated,
    /// DB_OPEN succeeded; record and command operations are available.
    DbOpen,
}

pub struct Connection {
    stream: Option<TcpStream>,
    poll: Poll,
    events: Events,
    state: ConnState,
    session_id: i32,
    token: Option<Vec<u8>>,
    token_based: bool,
    protocol_version: i16,
    receive: ReceiveConfig,
}

impl Connection {
    /// Connects, switches the socket to non-blocking mode and consumes the
    /// server greeting `(protocol:int16)`.
    pub fn open(config: &DriverConfig) -> Result<Self> {
        let std_stream = StdTcpStream::connect((config.host.as_str(), config.port))?;
        std_stream.set_nonblocking(true)?;
        let mut stream = TcpStream::from_std(std_stream);

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut stream, SOCKET, Interest::READABLE)?;

        let mut conn = Self {
            stream: Some(stream),
            poll,
            events: Events::with_capacity(8),
            state: ConnState::Closed,
            session_id: -1,
            token: None,
            token_based: false,
            protocol_version: 0,
            receive: config.receive.clone(),
        };

        let greeting = conn.receive()?;
        if greeting.len() < 2 {
            conn.close();
            return Err(Error::Serialization(
                "no protocol greeting received".into(),
            ));
        }
        conn.protocol_version = Reader::new(&greeting).read_i16()?;
        conn.state = ConnState::Greeted;
        tracing::info!(protocol = conn.protocol_version, "connection opened");
        Ok(conn)
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn session_id(&self) -> i32 {
        self.session_id
    }

    pub fn token(&self) -> Option<&[u8]> {
        self.token.as_deref()
    }

    pub fn protocol_version(&self) -> i16 {
        self.protocol_version
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Sends one request and decodes its response. Wrong-state requests
    /// are refused before any bytes touch the socket; any I/O or
    /// server-reported error closes the connection.
    pub fn exec(&mut self, op: &dyn Operation, args: &ValueMap) -> Result<ValueMap> {
        if self.stream.is_none() {
            return Err(Error::not_connected("the socket connection is not open"));
        }
        self.check_state(op.opcode())?;

        let mut frame = Writer::new();
        frame.write_i8(op.opcode().as_i8());
        frame.write_i32(self.session_id);
        let echo_token = self.token_based && op.opcode().echoes_token();
        if echo_token {
            frame.write_bytes(self.token.as_deref());
        }
        let body = op.encode_request(args)?;
        frame.write_raw(&body);

        tracing::debug!(opcode = ?op.opcode(), bytes = frame.len(), "sending request");
        self.send_all(frame.as_bytes())?;

        if !op.expects_response() {
            // DB_CLOSE: the server answers by dropping the session
            self.close();
            return Ok(ValueMap::new());
        }

        let data = self.receive()?;
        if data.is_empty() {
            self.close();
            return Err(Error::Serialization("empty response from server".into()));
        }

        match ops::decode_response(op, &data, echo_token) {
            Ok(map) => {
                self.after_response(op.opcode(), args, &map)?;
                Ok(map)
            }
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    /// Session bookkeeping after a successful response.
    fn after_response(&mut self, opcode: Opcode, args: &ValueMap, map: &ValueMap) -> Result<()> {
        match opcode {
            Opcode::Connect => {
                self.session_id = require_i64(map, "session-id")? as i32;
                let requested = matches!(args.get("token-session"), Some(Value::Bool(true)));
                match map.get("token") {
                    Some(Value::Bytes(token)) if requested && !token.is_empty() => {
                        self.token = Some(token.clone());
                        self.token_based = true;
                        tracing::debug!(len = token.len(), "token session established");
                    }
                    _ => {
                        self.token = None;
                        self.token_based = false;
                    }
                }
                self.state = ConnState::Authenticated;
                tracing::debug!(session_id = self.session_id, "session established");
            }
            Opcode::DbOpen => {
                self.session_id = require_i64(map, "session-id")? as i32;
                self.state = ConnState::DbOpen;
                tracing::debug!(session_id = self.session_id, "database opened");
            }
            _ => {}
        }
        Ok(())
    }

    fn check_state(&self, opcode: Opcode) -> Result<()> {
        let allowed = match opcode {
            Opcode::Connect => self.state == ConnState::Greeted,
            Opcode::DbOpen => {
                matches!(self.state, ConnState::Greeted | ConnState::Authenticated)
            }
            Opcode::Shutdown
            | Opcode::DbCreate
            | Opcode::DbDrop
            | Opcode::DbExist
            | Opcode::DbList
            | Opcode::ConfigGet
            | Opcode::ConfigSet
            | Opcode::ConfigList => {
                matches!(self.state, ConnState::Authenticated | ConnState::DbOpen)
            }
            Opcode::DbClose
            | Opcode::DbSize
            | Opcode::DbCountRecords
            | Opcode::DbReload
            | Opcode::RecordLoad
            | Opcode::RecordCreate
            | Opcode::RecordUpdate
            | Opcode::RecordDelete
            | Opcode::Command
            | Opcode::TxCommit
            | Opcode::RidbagGetSize => self.state == ConnState::DbOpen,
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::not_connected(format!(
                "operation {opcode:?} is not valid in state {:?}",
                self.state
            )))
        }
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            let Some(stream) = self.stream.as_mut() else {
                return Err(Error::not_connected("the socket connection is not open"));
            };
            match stream.write(&bytes[written..]) {
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => self.wait_writable()?,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.close();
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Briefly swaps the registration to writable interest and back.
    fn wait_writable(&mut self) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::not_connected("the socket connection is not open"));
        };
        self.poll
            .registry()
            .reregister(stream, SOCKET, Interest::WRITABLE)?;
        self.poll
            .poll(&mut self.events, Some(Duration::from_secs(1)))?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::not_connected("the socket connection is not open"));
        };
        self.poll
            .registry()
            .reregister(stream, SOCKET, Interest::READABLE)?;
        Ok(())
    }

    /// The adaptive receive loop. Returns whatever accumulated once the
    /// peer pauses for the configured number of idle polls.
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        let cfg = self.receive.clone();
        let mut data = Vec::new();
        let mut chunk = vec![0u8; cfg.buffer_size];
        let mut timeout = cfg.initial_timeout;
        let mut retries = cfg.idle_retries;

        'poll: loop {
            self.poll.poll(&mut self.events, Some(timeout))?;
            if self.events.is_empty() {
                retries -= 1;
                if retries == 0 {
                    break;
                }
                continue;
            }

            loop {
                let Some(stream) = self.stream.as_mut() else {
                    return Err(Error::not_connected("the socket connection is not open"));
                };
                match stream.read(&mut chunk) {
                    Ok(0) => break 'poll,
                    Ok(n) => {
                        data.extend_from_slice(&chunk[..n]);
                        retries = cfg.idle_retries;
                        timeout = cfg.short_timeout;
                        if n < cfg.buffer_size {
                            // partial buffer, give the server a little slack
                            timeout += cfg.timeout_inc;
                        } else {
                            timeout = timeout.saturating_sub(cfg.timeout_dec);
                            if timeout < cfg.min_timeout {
                                timeout = cfg.min_timeout;
                            }
                        }
                        tracing::trace!(
                            read = n,
                            total = data.len(),
                            ?timeout,
                            "receive iteration"
                        );
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) => {
                        self.close();
                        return Err(e.into());
                    }
                }
            }
        }
        tracing::debug!(bytes = data.len(), "receive complete");
        Ok(data)
    }

    /// Closes the socket and resets the state machine.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = self.poll.registry().deregister(&mut stream);
            tracing::info!("socket closed");
        }
        self.state = ConnState::Closed;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
