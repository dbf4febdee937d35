//! Byte stream transport.
//!
//! The transport only moves bytes. Framing, correlation and decoding
//! happen in the [`Client`](crate::Client).

use std::{
    fmt, io,
    io::{Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

/// Default Modbus TCP port.
pub const DEFAULT_PORT: u16 = 502;

/// Ordered, reliable duplex byte channel.
///
/// A transport is owned by exactly one client and is never used
/// concurrently.
pub trait Transport {
    /// Write all bytes of `buf`.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read at least one byte into `buf`, waiting at most `timeout`.
    ///
    /// `Ok(0)` signals that the peer closed the connection. An elapsed
    /// timeout is reported as [`io::ErrorKind::TimedOut`] or
    /// [`io::ErrorKind::WouldBlock`].
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Close the channel. Pending reads are unblocked.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read(buf, timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Blocking TCP transport.
pub struct TcpTransport {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl TcpTransport {
    /// Connect to a Modbus TCP server.
    ///
    /// Every address `addr` resolves to is tried in turn, each attempt
    /// is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the error of the last failed attempt.
    pub fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> io::Result<Self> {
        let mut last_err = None;
        for peer_addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&peer_addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_write_timeout(Some(timeout))?;
                    log::debug!("Connected to {peer_addr}");
                    return Ok(Self { stream, peer_addr });
                }
                Err(err) => {
                    log::debug!("Failed to connect to {peer_addr}: {err}");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "could not resolve to any address",
            )
        }))
    }

    /// Wrap an already connected stream.
    ///
    /// Writes are bounded by `timeout`.
    pub fn from_stream(stream: TcpStream, timeout: Duration) -> io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(Self { stream, peer_addr })
    }

    /// Returns the address of the server.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Transport for TcpTransport {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)?;
        self.stream.flush()
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if timeout.is_zero() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.read(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(err),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer_addr", &self.peer_addr)
            .field("local_addr", &self.stream.local_addr().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{net::TcpListener, thread};

    #[test]
    fn default_port() {
        assert_eq!(DEFAULT_PORT, 502);
    }

    #[test]
    fn exchange_bytes_with_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut transport = TcpTransport::connect(addr, Duration::from_secs(2)).unwrap();
        assert_eq!(transport.peer_addr(), addr);
        transport.write_all(&[1, 2, 3, 4]).unwrap();

        let mut received = Vec::new();
        let mut buf = [0; 16];
        while received.len() < 4 {
            let n = transport.read(&mut buf, Duration::from_secs(2)).unwrap();
            assert!(n > 0);
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, vec![1, 2, 3, 4]);
        server.join().unwrap();
        transport.close().unwrap();
    }

    #[test]
    fn read_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut transport = TcpTransport::connect(addr, Duration::from_secs(2)).unwrap();
        let _accepted = listener.accept().unwrap();

        let mut buf = [0; 16];
        let err = transport
            .read(&mut buf, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
        let err = transport.read(&mut buf, Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn wrap_connected_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).unwrap();
        let _accepted = listener.accept().unwrap();

        let transport = TcpTransport::from_stream(stream, Duration::from_millis(300)).unwrap();
        assert_eq!(transport.peer_addr(), addr);
        assert_eq!(
            transport.stream.write_timeout().unwrap(),
            Some(Duration::from_millis(300))
        );
    }

    #[test]
    fn debug_output() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let transport = TcpTransport::connect(addr, Duration::from_secs(2)).unwrap();
        let debug_str = format!("{transport:?}");
        assert!(debug_str.contains("TcpTransport"));
        assert!(debug_str.contains(&addr.to_string()));
    }
}
