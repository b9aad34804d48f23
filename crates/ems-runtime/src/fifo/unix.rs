//! Unix FIFO transport
//!
//! The well-known pipe is read by one [`FifoListener`]. The listener also
//! keeps a write end of its own pipe open, so the reader never sees end of
//! stream between clients and a read only returns once a client writes.
//!
//! Each SETUP frame is written by the client with a single `write`. Frames
//! no larger than `PIPE_BUF` are never interleaved with other writers, so
//! the listener can read fixed-size frames back to back. Bytes from a
//! writer that does not follow that rule are skipped by a [`SetupFramer`]
//! until the stream lines up with a frame again.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use ems_core::constants::SETUP_FRAME_LEN;
use ems_core::SetupFramer;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{mkfifo, unlink};
use tracing::debug;

use crate::acceptor::{Listener, PendingConnection};
use crate::error::{ServerError, ServerResult};

#[cfg(target_os = "linux")]
const _: () = assert!(SETUP_FRAME_LEN <= libc::PIPE_BUF);

/// Create a FIFO at `path` with mode 0640, replacing any stale entry.
pub fn create(path: &Path) -> io::Result<()> {
    remove(path)?;
    mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP)?;
    Ok(())
}

/// Unlink `path`; a missing entry is not an error.
pub fn remove(path: &Path) -> io::Result<()> {
    match unlink(path) {
        Ok(()) | Err(Errno::ENOENT) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Open a client's request pipe for reading.
///
/// Blocks until the client opens its write end.
pub fn open_request(path: &Path) -> io::Result<File> {
    File::open(path)
}

/// Open a client's response pipe for writing.
///
/// Blocks until the client opens its read end.
pub fn open_response(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).open(path)
}

/// Open both ends of a FIFO without blocking on either.
fn open_pair(path: &Path) -> io::Result<(File, File)> {
    // A non-blocking read open succeeds with no writer present, after
    // which the write open succeeds immediately.
    let reader = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)?;
    let writer = OpenOptions::new().write(true).open(path)?;
    fcntl(reader.as_raw_fd(), FcntlArg::F_SETFL(OFlag::empty()))?;
    Ok((reader, writer))
}

/// Reader of the well-known registration pipe
#[derive(Debug)]
pub struct FifoListener {
    path: PathBuf,
    reader: File,
    keepalive: File,
    framer: SetupFramer,
}

impl FifoListener {
    /// Create the FIFO at `path` and open it.
    pub fn bind(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();
        create(&path).map_err(|source| ServerError::Fifo {
            path: path.clone(),
            source,
        })?;
        let (reader, keepalive) = open_pair(&path).map_err(|source| ServerError::Open {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "listening");
        Ok(Self {
            path,
            reader,
            keepalive,
            framer: SetupFramer::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle that can unblock a pending `accept`
    pub fn waker(&self) -> io::Result<FifoWaker> {
        Ok(FifoWaker(self.keepalive.try_clone()?))
    }
}

impl Listener for FifoListener {
    fn accept(&mut self) -> io::Result<PendingConnection> {
        self.framer.next_frame(&mut self.reader).map(PendingConnection::new)
    }

    fn reopen(&mut self) -> io::Result<()> {
        let (reader, keepalive) = open_pair(&self.path)?;
        self.reader = reader;
        self.keepalive = keepalive;
        self.framer.reset();
        Ok(())
    }
}

/// Writes a blank frame into the registration pipe
#[derive(Debug)]
pub struct FifoWaker(File);

impl FifoWaker {
    pub fn wake(&mut self) -> io::Result<()> {
        self.0.write_all(&[0u8; SETUP_FRAME_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_core::SetupRequest;
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn test_create_replaces_stale_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server");
        std::fs::write(&path, b"stale").unwrap();

        create(&path).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.file_type().is_fifo());

        remove(&path).unwrap();
        assert!(!path.exists());
        remove(&path).unwrap();
    }

    #[test]
    fn test_listener_reads_whole_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server");
        let mut listener = FifoListener::bind(&path).unwrap();

        let mut writer = open_response(&path).unwrap();
        for n in 0..3 {
            let setup = SetupRequest::new(format!("/req{n}"), format!("/resp{n}"));
            writer.write_all(&setup.encode().unwrap()).unwrap();
        }
        drop(writer);

        for n in 0..3 {
            let conn = listener.accept().unwrap();
            let setup = SetupRequest::decode(conn.frame()).unwrap();
            assert_eq!(setup.request_path, format!("/req{n}"));
        }
    }

    #[test]
    fn test_listener_skips_stray_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server");
        let mut listener = FifoListener::bind(&path).unwrap();

        let setup = SetupRequest::new("/req", "/resp");
        let mut writer = open_response(&path).unwrap();
        writer.write_all(&[ems_core::OpCode::Setup as u8]).unwrap();
        writer.write_all(&setup.encode().unwrap()).unwrap();
        drop(writer);

        let conn = loop {
            match listener.accept() {
                Ok(conn) => break conn,
                Err(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
            }
        };
        assert_eq!(SetupRequest::decode(conn.frame()).unwrap(), setup);
    }

    #[test]
    fn test_waker_unblocks_accept() {
        let dir = tempfile::tempdir().unwrap();
        let mut listener = FifoListener::bind(dir.path().join("server")).unwrap();
        let mut waker = listener.waker().unwrap();

        let h = std::thread::spawn(move || listener.accept().map_err(|e| e.kind()));
        waker.wake().unwrap();
        assert_eq!(h.join().unwrap().unwrap_err(), io::ErrorKind::InvalidData);
    }
}
