//! The byte-stream abstraction a [`super::dispatch::Dispatcher`] talks to.
//!
//! Real traffic goes over a `TcpStream`; tests substitute a `MockTransport`
//! that plays back canned replies without a socket.

use std::fmt::Debug;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// A connected byte stream: readable, writable, and debuggable so it can sit
/// behind a trait object inside [`super::dispatch::Dispatcher`].
pub trait Transport: Read + Write + Debug + Send {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()>;
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }
}

#[cfg(test)]
pub mod mock {
    use super::Transport;
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::time::Duration;

    /// A scripted transport: bytes written are recorded, and reads are
    /// served from a queue of pre-supplied chunks (simulating however many
    /// TCP segments the fake server's reply arrived in).
    #[derive(Debug, Default)]
    pub struct MockTransport {
        pub written: Vec<u8>,
        pub to_read: VecDeque<Vec<u8>>,
        pub closed: bool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_reply(&mut self, bytes: Vec<u8>) {
            self.to_read.push_back(bytes);
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.to_read.pop_front() {
                None => {
                    if self.closed {
                        Ok(0)
                    } else {
                        Err(io::Error::new(io::ErrorKind::WouldBlock, "no more data"))
                    }
                }
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        let mut rest = chunk;
                        rest.drain(..n);
                        self.to_read.push_front(rest);
                    }
                    Ok(n)
                }
            }
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.closed {
                return Ok(0);
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MockTransport {
        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }
}
