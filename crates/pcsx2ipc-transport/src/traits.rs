use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use crate::error::Result;

/// A connected emulator socket. Implements Read + Write.
///
/// On Unix this is normally a Unix domain socket stream; on Windows (and
/// wherever a TCP endpoint is configured) it is a loopback TCP stream.
pub struct IpcStream {
    inner: IpcStreamInner,
    deadline: Option<Instant>,
}

enum IpcStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Read for IpcStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some(remaining) = self.remaining()? {
            self.set_read_timeout(Some(remaining))
                .map_err(std::io::Error::other)?;
        }
        match &mut self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.read(buf),
            IpcStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for IpcStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(remaining) = self.remaining()? {
            self.set_write_timeout(Some(remaining))
                .map_err(std::io::Error::other)?;
        }
        match &mut self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.write(buf),
            IpcStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.flush(),
            IpcStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl IpcStream {
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: IpcStreamInner::Unix(stream),
            deadline: None,
        }
    }

    pub fn from_tcp(stream: TcpStream) -> Self {
        // Commands are tiny and latency bound.
        let _ = stream.set_nodelay(true);
        Self {
            inner: IpcStreamInner::Tcp(stream),
            deadline: None,
        }
    }

    /// Apply the same timeout to reads and writes.
    ///
    /// `None` makes both directions block indefinitely.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            IpcStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            IpcStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Clone the stream handle so reads and writes can be split.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => IpcStreamInner::Unix(stream.try_clone()?),
            IpcStreamInner::Tcp(stream) => IpcStreamInner::Tcp(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            deadline: self.deadline,
        })
    }

    /// Bound every following read and write by `deadline`.
    ///
    /// While set, each call gets the time left as its socket timeout and
    /// fails with `TimedOut` once the deadline has passed, however the
    /// peer paces its bytes. `None` leaves the last socket timeout in place.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn remaining(&self) -> std::io::Result<Option<Duration>> {
        let Some(deadline) = self.deadline else {
            return Ok(None);
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(std::io::Error::new(
                ErrorKind::TimedOut,
                "deadline elapsed",
            ));
        }
        Ok(Some(remaining))
    }

    /// Shut down both directions of the socket.
    ///
    /// The descriptor itself is released when the stream is dropped.
    /// Errors from an already-disconnected peer are ignored.
    pub fn shutdown(&self) {
        let result = match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
            IpcStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
        };
        if let Err(err) = result {
            tracing::trace!(error = %err, "socket shutdown after peer close");
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(_) => "unix-domain-socket",
            IpcStreamInner::Tcp(_) => "tcp-loopback",
        }
    }

    /// Get the credentials of the connected peer (Linux Unix sockets only).
    ///
    /// Returns `(uid, gid, pid)` via `SO_PEERCRED`, or `None` if unavailable.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            IpcStreamInner::Unix(stream) => stream.as_raw_fd(),
            IpcStreamInner::Tcp(_) => return None,
        };

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and `fd` is an open Unix socket descriptor owned by this process.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }

    /// Get the credentials of the connected peer.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

impl std::fmt::Debug for IpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcStream")
            .field("type", &self.transport_name())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn timeouts_apply_to_unix_pair() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = IpcStream::from_unix(left);
        stream
            .set_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut stream = stream;
        let mut buf = [0u8; 1];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(crate::is_timeout(&err));
    }

    #[test]
    fn deadline_bounds_a_trickling_peer() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut stream = IpcStream::from_unix(left);
        let writer = std::thread::spawn(move || {
            let mut right = right;
            for byte in 0..10u8 {
                std::thread::sleep(Duration::from_millis(30));
                if right.write_all(&[byte]).is_err() {
                    break;
                }
            }
        });

        let started = Instant::now();
        stream.set_deadline(Some(started + Duration::from_millis(100)));
        let mut received = 0;
        let mut buf = [0u8; 1];
        let err = loop {
            match stream.read(&mut buf) {
                Ok(0) => panic!("peer closed before the deadline"),
                Ok(n) => received += n,
                Err(err) => break err,
            }
        };
        assert!(crate::is_timeout(&err));
        assert!(received < 10);
        assert!(started.elapsed() < Duration::from_millis(290));

        stream.shutdown();
        writer.join().unwrap();
    }

    #[test]
    fn elapsed_deadline_fails_writes_at_once() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut stream = IpcStream::from_unix(left);
        stream.set_deadline(Some(Instant::now()));
        let err = stream.write(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);

        // Clones keep the deadline.
        let clone = stream.try_clone().unwrap();
        assert_eq!(clone.deadline(), stream.deadline());
    }

    #[test]
    fn shutdown_makes_peer_see_eof() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = IpcStream::from_unix(left);
        stream.shutdown();
        // Second shutdown must not panic.
        stream.shutdown();

        let mut peer = IpcStream::from_unix(right);
        let mut buf = [0u8; 4];
        assert_eq!(peer.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn debug_names_transport() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = IpcStream::from_unix(left);
        assert!(format!("{stream:?}").contains("unix-domain-socket"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn peer_credentials_name_this_process() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = IpcStream::from_unix(left);
        let (_, _, pid) = stream.peer_credentials().expect("SO_PEERCRED on a socketpair");
        assert_eq!(pid, std::process::id());
    }
}
