//! Wire protocol codec
//!
//! Frames are one opcode byte followed by fixed-width fields in native
//! byte order. `size_t` fields are encoded as the platform `usize`.
//!
//! | Opcode  | Request fields                              | Response fields                          |
//! |---------|---------------------------------------------|------------------------------------------|
//! | SETUP   | req_path[256], resp_path[256]               | session_id:u32 (on the response channel) |
//! | CREATE  | event_id:u32, rows:usize, cols:usize        | status:i32                               |
//! | RESERVE | event_id:u32, n:usize, xs:usize[n], ys[n]   | status:i32                               |
//! | SHOW    | event_id:u32                                | status, [rows, cols, seats:u32[r*c]]     |
//! | LIST    | -                                           | status, [count:usize, ids:u32[count]]    |
//! | QUIT    | -                                           | -                                        |
//!
//! Encoders build the whole frame in memory so callers can hand it to a
//! single `write_all`; on a pipe, writes up to `PIPE_BUF` bytes are not
//! interleaved with other writers.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::constants::{MAX_EVENT_SEATS, MAX_PIPE_PATH_LEN, MAX_RESERVATION_SIZE, SETUP_FRAME_LEN};
use crate::error::{EmsError, EmsResult};
use crate::event::{GridSnapshot, Seat};
use crate::id::{EventId, SessionId};

/// Request opcodes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Setup = 1,
    Quit = 2,
    Create = 3,
    Reserve = 4,
    Show = 5,
    List = 6,
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(v: u8) -> Result<Self, ProtocolError> {
        match v {
            1 => Ok(OpCode::Setup),
            2 => Ok(OpCode::Quit),
            3 => Ok(OpCode::Create),
            4 => Ok(OpCode::Reserve),
            5 => Ok(OpCode::Show),
            6 => Ok(OpCode::List),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

/// Two-valued result code carried in every reply
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success = 0,
    Failure = 1,
}

impl TryFrom<i32> for Status {
    type Error = ProtocolError;

    fn try_from(v: i32) -> Result<Self, ProtocolError> {
        match v {
            0 => Ok(Status::Success),
            1 => Ok(Status::Failure),
            other => Err(ProtocolError::InvalidStatus(other)),
        }
    }
}

/// Malformed or unexpected frame contents
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("opcode {0:?} is not valid here")]
    UnexpectedOpcode(OpCode),

    #[error("frame truncated while reading {0}")]
    Truncated(&'static str),

    #[error("{what} of {len} exceeds the frame limit")]
    Oversized { what: &'static str, len: usize },

    #[error("invalid pipe path")]
    InvalidPath,

    #[error("invalid status {0}")]
    InvalidStatus(i32),
}

// ============================================================================
// Field readers
// ============================================================================

fn read_exact_field<R: Read, const N: usize>(r: &mut R, what: &'static str) -> EmsResult<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => EmsError::Protocol(ProtocolError::Truncated(what)),
        _ => EmsError::Channel(e),
    })?;
    Ok(buf)
}

fn read_u32<R: Read>(r: &mut R, what: &'static str) -> EmsResult<u32> {
    read_exact_field(r, what).map(u32::from_ne_bytes)
}

fn read_i32<R: Read>(r: &mut R, what: &'static str) -> EmsResult<i32> {
    read_exact_field(r, what).map(i32::from_ne_bytes)
}

fn read_usize<R: Read>(r: &mut R, what: &'static str) -> EmsResult<usize> {
    read_exact_field(r, what).map(usize::from_ne_bytes)
}

fn read_usizes<R: Read>(r: &mut R, n: usize, what: &'static str) -> EmsResult<Vec<usize>> {
    (0..n).map(|_| read_usize(r, what)).collect()
}

/// Read one opcode byte; `None` on a clean end of stream.
fn read_opcode<R: Read>(r: &mut R) -> EmsResult<Option<u8>> {
    let mut op = [0u8; 1];
    loop {
        match r.read(&mut op) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(op[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// Registration sent by a client on the well-known channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    /// Client-created channel the server reads requests from
    pub request_path: String,
    /// Client-created channel the server writes responses to
    pub response_path: String,
}

impl SetupRequest {
    pub fn new(request_path: impl Into<String>, response_path: impl Into<String>) -> Self {
        Self {
            request_path: request_path.into(),
            response_path: response_path.into(),
        }
    }

    /// Encode the full SETUP frame: opcode plus two NUL-padded path fields.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut frame = Vec::with_capacity(SETUP_FRAME_LEN);
        frame.push(OpCode::Setup as u8);
        for path in [&self.request_path, &self.response_path] {
            let bytes = path.as_bytes();
            // One byte is kept for the terminating NUL.
            if bytes.is_empty()
                || bytes.len() >= MAX_PIPE_PATH_LEN
                || bytes.iter().any(u8::is_ascii_control)
            {
                return Err(ProtocolError::InvalidPath);
            }
            frame.extend_from_slice(bytes);
            frame.resize(frame.len() + MAX_PIPE_PATH_LEN - bytes.len(), 0);
        }
        Ok(frame)
    }

    /// Decode a complete SETUP frame.
    pub fn decode(frame: &[u8]) -> EmsResult<Self> {
        if frame.len() != SETUP_FRAME_LEN {
            return Err(ProtocolError::Truncated("setup frame").into());
        }
        match OpCode::try_from(frame[0])? {
            OpCode::Setup => {}
            other => return Err(ProtocolError::UnexpectedOpcode(other).into()),
        }
        let (req, resp) = frame[1..].split_at(MAX_PIPE_PATH_LEN);
        Ok(Self {
            request_path: decode_path(req)?,
            response_path: decode_path(resp)?,
        })
    }

    /// Read and decode a SETUP frame from a stream.
    pub fn read_from<R: Read>(r: &mut R) -> EmsResult<Self> {
        let frame: [u8; SETUP_FRAME_LEN] = read_exact_field(r, "setup frame")?;
        Self::decode(&frame)
    }
}

/// A path field is a non-empty run of printable bytes followed by NUL
/// padding to the end of the field.
fn decode_path(field: &[u8]) -> Result<String, ProtocolError> {
    let end = field
        .iter()
        .position(|&b| b == 0)
        .ok_or(ProtocolError::InvalidPath)?;
    let (path, padding) = field.split_at(end);
    if path.is_empty() || path.iter().any(u8::is_ascii_control) || padding.iter().any(|&b| b != 0) {
        return Err(ProtocolError::InvalidPath);
    }
    std::str::from_utf8(path)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::InvalidPath)
}

/// Splits the shared registration stream into SETUP frames.
///
/// Well-behaved clients write whole frames, but any writer can leave a
/// partial or garbage frame on the channel. When the buffered bytes do
/// not decode as a registration, the framer drops them up to the next
/// SETUP opcode byte and reports the skip as `InvalidData`. Paths never
/// contain control bytes, so an opcode byte can only start a frame or
/// belong to garbage.
#[derive(Debug, Default)]
pub struct SetupFramer {
    pending: Vec<u8>,
}

impl SetupFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back from an incomplete frame
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Forget any partial frame.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Read until one full frame is buffered and return it if it decodes.
    ///
    /// Never reads past the end of the frame being assembled.
    pub fn next_frame<R: Read>(&mut self, r: &mut R) -> io::Result<Vec<u8>> {
        let mut chunk = [0u8; SETUP_FRAME_LEN];
        while self.pending.len() < SETUP_FRAME_LEN {
            let want = SETUP_FRAME_LEN - self.pending.len();
            match r.read(&mut chunk[..want]) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        if SetupRequest::decode(&self.pending).is_ok() {
            return Ok(std::mem::take(&mut self.pending));
        }

        let skip = self.pending[1..]
            .iter()
            .position(|&b| b == OpCode::Setup as u8)
            .map_or(self.pending.len(), |i| i + 1);
        self.pending.drain(..skip);
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("skipped {skip} bytes of misaligned registration data"),
        ))
    }
}

/// Handshake reply: the assigned session id
pub fn write_session_id<W: Write>(w: &mut W, id: SessionId) -> io::Result<()> {
    w.write_all(&id.as_u32().to_ne_bytes())?;
    w.flush()
}

pub fn read_session_id<R: Read>(r: &mut R) -> EmsResult<SessionId> {
    read_u32(r, "session id").map(SessionId::new)
}

// ============================================================================
// Requests
// ============================================================================

/// A decoded request from a session's private request channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create {
        event_id: EventId,
        rows: usize,
        cols: usize,
    },
    Reserve {
        event_id: EventId,
        seats: Vec<Seat>,
    },
    Show {
        event_id: EventId,
    },
    List,
    Quit,
}

impl Request {
    pub fn opcode(&self) -> OpCode {
        match self {
            Request::Create { .. } => OpCode::Create,
            Request::Reserve { .. } => OpCode::Reserve,
            Request::Show { .. } => OpCode::Show,
            Request::List => OpCode::List,
            Request::Quit => OpCode::Quit,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![self.opcode() as u8];
        match self {
            Request::Create { event_id, rows, cols } => {
                frame.extend_from_slice(&event_id.as_u32().to_ne_bytes());
                frame.extend_from_slice(&rows.to_ne_bytes());
                frame.extend_from_slice(&cols.to_ne_bytes());
            }
            Request::Reserve { event_id, seats } => {
                frame.extend_from_slice(&event_id.as_u32().to_ne_bytes());
                frame.extend_from_slice(&seats.len().to_ne_bytes());
                for seat in seats {
                    frame.extend_from_slice(&seat.row.to_ne_bytes());
                }
                for seat in seats {
                    frame.extend_from_slice(&seat.col.to_ne_bytes());
                }
            }
            Request::Show { event_id } => {
                frame.extend_from_slice(&event_id.as_u32().to_ne_bytes());
            }
            Request::List | Request::Quit => {}
        }
        frame
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.encode())?;
        w.flush()
    }

    /// Read the next request.
    ///
    /// Returns `Ok(None)` when the channel closes cleanly between frames.
    /// End of stream inside a frame is [`ProtocolError::Truncated`].
    pub fn read_from<R: Read>(r: &mut R) -> EmsResult<Option<Request>> {
        let Some(op) = read_opcode(r)? else {
            return Ok(None);
        };

        let request = match OpCode::try_from(op)? {
            OpCode::Setup => return Err(ProtocolError::UnexpectedOpcode(OpCode::Setup).into()),
            OpCode::Quit => Request::Quit,
            OpCode::List => Request::List,
            OpCode::Create => Request::Create {
                event_id: EventId::new(read_u32(r, "event id")?),
                rows: read_usize(r, "row count")?,
                cols: read_usize(r, "column count")?,
            },
            OpCode::Show => Request::Show {
                event_id: EventId::new(read_u32(r, "event id")?),
            },
            OpCode::Reserve => {
                let event_id = EventId::new(read_u32(r, "event id")?);
                let n = read_usize(r, "seat count")?;
                if n > MAX_RESERVATION_SIZE {
                    return Err(ProtocolError::Oversized { what: "seat count", len: n }.into());
                }
                let xs = read_usizes(r, n, "seat rows")?;
                let ys = read_usizes(r, n, "seat columns")?;
                let seats = xs.into_iter().zip(ys).map(Seat::from).collect();
                Request::Reserve { event_id, seats }
            }
        };
        Ok(Some(request))
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A reply on a session's private response channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Bare status: CREATE, RESERVE, and every failed request
    Status(Status),
    /// Successful SHOW
    Grid(GridSnapshot),
    /// Successful LIST
    Events(Vec<EventId>),
}

impl Response {
    pub const fn success() -> Self {
        Response::Status(Status::Success)
    }

    pub const fn failure() -> Self {
        Response::Status(Status::Failure)
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Status(status) => (*status as i32).to_ne_bytes().to_vec(),
            Response::Grid(grid) => {
                let mut frame = Vec::with_capacity(4 + 16 + grid.seats.len() * 4);
                frame.extend_from_slice(&(Status::Success as i32).to_ne_bytes());
                frame.extend_from_slice(&grid.rows.to_ne_bytes());
                frame.extend_from_slice(&grid.cols.to_ne_bytes());
                for seat in &grid.seats {
                    frame.extend_from_slice(&seat.to_ne_bytes());
                }
                frame
            }
            Response::Events(ids) => {
                let mut frame = Vec::with_capacity(4 + 8 + ids.len() * 4);
                frame.extend_from_slice(&(Status::Success as i32).to_ne_bytes());
                frame.extend_from_slice(&ids.len().to_ne_bytes());
                for id in ids {
                    frame.extend_from_slice(&id.as_u32().to_ne_bytes());
                }
                frame
            }
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.encode())?;
        w.flush()
    }

    pub fn read_status<R: Read>(r: &mut R) -> EmsResult<Status> {
        Ok(Status::try_from(read_i32(r, "status")?)?)
    }

    /// Read a SHOW reply; `None` when the server answered FAILURE.
    pub fn read_grid<R: Read>(r: &mut R) -> EmsResult<Option<GridSnapshot>> {
        if Self::read_status(r)? == Status::Failure {
            return Ok(None);
        }
        let rows = read_usize(r, "row count")?;
        let cols = read_usize(r, "column count")?;
        let cells = rows
            .checked_mul(cols)
            .filter(|&n| n <= MAX_EVENT_SEATS)
            .ok_or(ProtocolError::Oversized { what: "grid", len: rows.saturating_mul(cols) })?;
        let seats = (0..cells)
            .map(|_| read_u32(r, "seats"))
            .collect::<EmsResult<Vec<_>>>()?;
        Ok(Some(GridSnapshot { rows, cols, seats }))
    }

    /// Read a LIST reply; `None` when the server answered FAILURE.
    pub fn read_events<R: Read>(r: &mut R) -> EmsResult<Option<Vec<EventId>>> {
        if Self::read_status(r)? == Status::Failure {
            return Ok(None);
        }
        let count = read_usize(r, "event count")?;
        if count > u32::MAX as usize {
            return Err(ProtocolError::Oversized { what: "event count", len: count }.into());
        }
        let ids = (0..count)
            .map(|_| read_u32(r, "event ids").map(EventId::new))
            .collect::<EmsResult<Vec<_>>>()?;
        Ok(Some(ids))
    }
}
