//! The single-inflight send/receive loop: write one `REQUEST{...}`, read
//! until a complete `REPLY`/`FAILED` is available, and rotate to the next
//! server on any connection loss.

use crate::conn::params::ServerAddr;
use crate::conn::transport::Transport;
use crate::error::{DecodeError, StashError, StashResult};
use crate::protocol::reply::{CodecTables, Reply};
use crate::protocol::result_code::ResultCode;
use log::{debug, trace, warn};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Bytes requested per growth step while waiting for a truncated reply to
/// complete (spec.md's "grow the buffer by at least 1KiB at a time").
const READ_GROWTH: usize = 1024;

struct ConnectionSlot {
    addr: ServerAddr,
    stream: Option<Box<dyn Transport>>,
}

/// Owns the ordered server list and the one live connection among them.
/// Index 0 is always the preferred server to use or reconnect to next.
pub struct Dispatcher {
    slots: Vec<ConnectionSlot>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    codec_tables: CodecTables,
}

impl Dispatcher {
    pub fn new(servers: &[ServerAddr]) -> Self {
        Dispatcher {
            slots: servers
                .iter()
                .cloned()
                .map(|addr| ConnectionSlot { addr, stream: None })
                .collect(),
            read_timeout: None,
            write_timeout: None,
            codec_tables: CodecTables::new(),
        }
    }

    /// Command ids seen on the wire that none of the five parse tables
    /// expected at that point, oldest first (spec.md §4.1).
    pub fn unexpected_commands(&self) -> impl Iterator<Item = u8> + '_ {
        self.codec_tables.unexpected_commands()
    }

    pub fn set_timeouts(&mut self, read: Option<Duration>, write: Option<Duration>) {
        self.read_timeout = read;
        self.write_timeout = write;
    }

    pub fn add_server(&mut self, addr: ServerAddr) {
        self.slots.push(ConnectionSlot { addr, stream: None });
    }

    /// Installs an already-"connected" transport as the head slot, so tests
    /// can drive the dispatcher without a real socket.
    #[cfg(test)]
    pub(crate) fn with_mock_head(addr: ServerAddr, transport: Box<dyn Transport>) -> Self {
        Dispatcher {
            slots: vec![ConnectionSlot {
                addr,
                stream: Some(transport),
            }],
            read_timeout: None,
            write_timeout: None,
            codec_tables: CodecTables::new(),
        }
    }

    pub fn head_addr(&self) -> Option<&ServerAddr> {
        self.slots.first().map(|s| &s.addr)
    }

    pub fn is_connected(&self) -> bool {
        self.slots.first().is_some_and(|s| s.stream.is_some())
    }

    /// Moves the head server to the tail after it has failed, so the next
    /// attempt tries the next-most-preferred server.
    fn rotate_head_to_tail(&mut self) {
        if self.slots.is_empty() {
            return;
        }
        let failed = self.slots.remove(0);
        warn!(
            "dropping connection to {}:{}, rotating to tail",
            failed.addr.host, failed.addr.port
        );
        self.slots.push(failed);
    }

    fn connect_head(&mut self) -> StashResult<()> {
        let slot = self
            .slots
            .first_mut()
            .ok_or(StashError::NotConnected)?;
        if slot.stream.is_some() {
            return Ok(());
        }
        let stream = TcpStream::connect((slot.addr.host.as_str(), slot.addr.port))?;
        trace!("connected to {}:{}", slot.addr.host, slot.addr.port);
        let mut stream: Box<dyn Transport> = Box::new(stream);
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)?;
        slot.stream = Some(stream);
        Ok(())
    }

    /// Connects the head server, rotating through the whole list once if
    /// earlier servers refuse the connection.
    fn ensure_connected(&mut self) -> StashResult<()> {
        let attempts = self.slots.len();
        if attempts == 0 {
            return Err(StashError::NotConnected);
        }
        for _ in 0..attempts {
            if self.connect_head().is_ok() {
                return Ok(());
            }
            self.rotate_head_to_tail();
        }
        Err(StashError::NotConnected)
    }

    /// Sends one already-encoded `REQUEST{...}` and waits for its reply.
    ///
    /// A write failure or a connection closed mid-read is not a Rust `Err`:
    /// the broken connection is dropped and rotated to the tail, and a
    /// synthesized `NOT_CONNECTED` reply is returned so callers can treat it
    /// like any other server-reported failure.
    pub fn send_request(&mut self, request: &[u8]) -> StashResult<Reply> {
        if self.ensure_connected().is_err() {
            return Ok(Reply::failed(ResultCode::NotConnected));
        }

        {
            let slot = self.slots.first_mut().expect("ensure_connected succeeded");
            let stream = slot.stream.as_mut().expect("ensure_connected succeeded");
            if stream.write_all(request).is_err() {
                slot.stream = None;
                self.rotate_head_to_tail();
                return Ok(Reply::failed(ResultCode::NotConnected));
            }
        }

        self.read_response()
    }

    fn read_response(&mut self) -> StashResult<Reply> {
        let mut buf = Vec::with_capacity(READ_GROWTH);
        loop {
            match Reply::decode_response(&mut self.codec_tables, &buf) {
                Ok(reply) => return Ok(reply),
                Err(DecodeError::Truncated(_)) => {}
                Err(other) => return Err(StashError::Decode(other)),
            }

            let slot = self.slots.first_mut().expect("ensure_connected succeeded");
            let stream = slot.stream.as_mut().expect("ensure_connected succeeded");
            let start = buf.len();
            buf.resize(start + READ_GROWTH, 0);
            let read = stream.read(&mut buf[start..]);
            match read {
                Ok(0) => {
                    debug!("connection closed before a full reply arrived");
                    buf.truncate(start);
                    slot.stream = None;
                    self.rotate_head_to_tail();
                    return Ok(Reply::failed(ResultCode::NotConnected));
                }
                Ok(n) => {
                    buf.truncate(start + n);
                }
                Err(e) => {
                    buf.truncate(start);
                    slot.stream = None;
                    self.rotate_head_to_tail();
                    return Err(e.into());
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field(
                "servers",
                &self
                    .slots
                    .iter()
                    .map(|s| format!("{}:{}", s.addr.host, s.addr.port))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::transport::mock::MockTransport;
    use crate::protocol::command;
    use crate::protocol::risp;

    fn install_mock(dispatcher: &mut Dispatcher, mock: MockTransport) {
        dispatcher.slots[0].stream = Some(Box::new(mock));
    }

    fn encode_reply(request_id: i32) -> Vec<u8> {
        let mut payload = Vec::new();
        risp::encode_int(&mut payload, command::REQUEST_ID, request_id).unwrap();
        let mut out = Vec::new();
        risp::encode_record(&mut out, command::REPLY, &payload).unwrap();
        out
    }

    #[test]
    fn send_request_reads_a_reply_delivered_in_one_chunk() {
        let mut dispatcher = Dispatcher::new(&[ServerAddr::new("localhost", 1)]);
        let mut mock = MockTransport::new();
        mock.push_reply(encode_reply(1));
        install_mock(&mut dispatcher, mock);

        let reply = dispatcher.send_request(b"irrelevant").unwrap();
        assert_eq!(reply.result_code, ResultCode::Ok);
        assert_eq!(reply.request_id, 1);
    }

    #[test]
    fn send_request_reassembles_a_reply_split_across_reads() {
        let mut dispatcher = Dispatcher::new(&[ServerAddr::new("localhost", 1)]);
        let full = encode_reply(1);
        let (head, tail) = full.split_at(2);
        let mut mock = MockTransport::new();
        mock.push_reply(head.to_vec());
        mock.push_reply(tail.to_vec());
        install_mock(&mut dispatcher, mock);

        let reply = dispatcher.send_request(b"irrelevant").unwrap();
        assert_eq!(reply.result_code, ResultCode::Ok);
    }

    #[test]
    fn eof_before_a_full_reply_synthesizes_not_connected() {
        let mut dispatcher = Dispatcher::new(&[ServerAddr::new("localhost", 1)]);
        let mut mock = MockTransport::new();
        mock.closed = true;
        install_mock(&mut dispatcher, mock);

        let reply = dispatcher.send_request(b"irrelevant").unwrap();
        assert_eq!(reply.result_code, ResultCode::NotConnected);
        assert!(!dispatcher.is_connected());
    }
}
