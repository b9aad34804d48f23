//! # ems-client
//!
//! Request-marshaling stub for the EMS named-pipe protocol.
//!
//! A [`Client`] owns one session: it creates its two private FIFOs,
//! registers them on the server's well-known pipe, and then exchanges
//! one request frame for one response frame per call.
//!
//! ```ignore
//! let mut client = Client::connect("/tmp/req", "/tmp/resp", "/tmp/ems")?;
//! client.create(EventId::new(1), 2, 2)?;
//! client.reserve(EventId::new(1), &[Seat::new(1, 1), Seat::new(2, 2)])?;
//! print!("{}", render_grid(&client.show(EventId::new(1))?));
//! client.quit()?;
//! ```

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ems_core::protocol::read_session_id;
use ems_core::{
    EmsError, EventId, GridSnapshot, OpCode, ProtocolError, Request, Response, Seat, SessionId,
    SetupRequest, Status,
};
use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd::{mkfifo, unlink};
use thiserror::Error;
use tracing::debug;

/// Errors returned by [`Client`]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot create pipe {}: {source}", path.display())]
    Fifo { path: PathBuf, source: io::Error },

    #[error("pipe path {} is not valid UTF-8", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("channel error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Ems(#[from] EmsError),

    /// The server answered FAILURE
    #[error("server rejected {0:?} request")]
    Rejected(OpCode),
}

pub type ClientResult<T> = Result<T, ClientError>;

fn make_fifo(path: &Path) -> ClientResult<()> {
    let fifo = || -> nix::Result<()> {
        match unlink(path) {
            Ok(()) | Err(Errno::ENOENT) => {}
            Err(e) => return Err(e),
        }
        mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP)
    };
    fifo().map_err(|e| ClientError::Fifo {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn path_str(path: &Path) -> ClientResult<&str> {
    path.to_str()
        .ok_or_else(|| ClientError::NonUtf8Path(path.to_path_buf()))
}

/// One open session with the server
#[derive(Debug)]
pub struct Client {
    session_id: SessionId,
    requests: File,
    responses: File,
    request_path: PathBuf,
    response_path: PathBuf,
}

impl Client {
    /// Create both private pipes and register them with the server.
    ///
    /// Blocks until a worker picks the session up.
    pub fn connect(
        request_path: impl AsRef<Path>,
        response_path: impl AsRef<Path>,
        server_path: impl AsRef<Path>,
    ) -> ClientResult<Self> {
        let request_path = request_path.as_ref().to_path_buf();
        let response_path = response_path.as_ref().to_path_buf();

        let frame = SetupRequest::new(path_str(&request_path)?, path_str(&response_path)?).encode()?;

        make_fifo(&request_path)?;
        make_fifo(&response_path)?;

        match Self::register(&request_path, &response_path, server_path.as_ref(), &frame) {
            Ok((requests, responses, session_id)) => {
                debug!(session = %session_id, "connected");
                Ok(Self {
                    session_id,
                    requests,
                    responses,
                    request_path,
                    response_path,
                })
            }
            Err(e) => {
                let _ = unlink(request_path.as_path());
                let _ = unlink(response_path.as_path());
                Err(e)
            }
        }
    }

    fn register(
        request_path: &Path,
        response_path: &Path,
        server_path: &Path,
        frame: &[u8],
    ) -> ClientResult<(File, File, SessionId)> {
        // One write keeps the frame whole on the shared pipe.
        let mut server = OpenOptions::new().write(true).open(server_path)?;
        server.write_all(frame)?;
        drop(server);

        // Same order as the server: request end first, then response.
        let requests = OpenOptions::new().write(true).open(request_path)?;
        let mut responses = File::open(response_path)?;
        let session_id = read_session_id(&mut responses)?;
        Ok((requests, responses, session_id))
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn send(&mut self, request: &Request) -> ClientResult<()> {
        request.write_to(&mut self.requests)?;
        Ok(())
    }

    fn expect_success(&mut self, opcode: OpCode) -> ClientResult<()> {
        match Response::read_status(&mut self.responses)? {
            Status::Success => Ok(()),
            Status::Failure => Err(ClientError::Rejected(opcode)),
        }
    }

    pub fn create(&mut self, event_id: EventId, rows: usize, cols: usize) -> ClientResult<()> {
        self.send(&Request::Create { event_id, rows, cols })?;
        self.expect_success(OpCode::Create)
    }

    pub fn reserve(&mut self, event_id: EventId, seats: &[Seat]) -> ClientResult<()> {
        self.send(&Request::Reserve {
            event_id,
            seats: seats.to_vec(),
        })?;
        self.expect_success(OpCode::Reserve)
    }

    pub fn show(&mut self, event_id: EventId) -> ClientResult<GridSnapshot> {
        self.send(&Request::Show { event_id })?;
        Response::read_grid(&mut self.responses)?.ok_or(ClientError::Rejected(OpCode::Show))
    }

    pub fn list(&mut self) -> ClientResult<Vec<EventId>> {
        self.send(&Request::List)?;
        Response::read_events(&mut self.responses)?.ok_or(ClientError::Rejected(OpCode::List))
    }

    /// End the session. The server sends no reply.
    pub fn quit(mut self) -> ClientResult<()> {
        self.send(&Request::Quit)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = unlink(self.request_path.as_path());
        let _ = unlink(self.response_path.as_path());
    }
}

/// One line per row, seat values separated by a single space
pub fn render_grid(grid: &GridSnapshot) -> String {
    let mut out = String::new();
    for row in grid.rows() {
        let line: Vec<String> = row.iter().map(u32::to_string).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// `Event: <id>` per line, or `No events`
pub fn render_events(ids: &[EventId]) -> String {
    if ids.is_empty() {
        return "No events\n".to_string();
    }
    let mut out = String::new();
    for id in ids {
        let _ = writeln!(out, "Event: {}", id);
    }
    out
}
