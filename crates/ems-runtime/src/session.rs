//! Per-session command loop
//!
//! A session moves through three states:
//!
//! ```text
//!   AwaitOpcode ──frame──▶ Processing(req) ──reply──▶ AwaitOpcode
//!        │                       │
//!        └──EOF / bad frame──────┴──QUIT / write error──▶ Terminated
//! ```
//!
//! Each request is executed and answered before the next frame is read.
//! Validation failures are answered with FAILURE and the loop goes on;
//! only channel and protocol errors end the session.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use ems_core::protocol::write_session_id;
use ems_core::{EmsError, EmsResult, ReservationEngine, Request, Response, SessionId, SetupRequest};
use tracing::{debug, warn};

use crate::acceptor::PendingConnection;
use crate::fifo;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Client sent QUIT
    Quit,
    /// Request channel closed between frames
    ChannelClosed,
    /// Malformed or unexpected frame
    Protocol,
    /// Read or write failure on a private channel
    Channel,
}

#[derive(Debug)]
enum State {
    AwaitOpcode,
    Processing(Request),
    Terminated(EndReason),
}

/// Decode a registration and open the client's private channels.
///
/// Opens the request channel first, then the response channel, matching
/// the order in which the client opens its ends, and replies with the
/// session id.
pub fn handshake(id: SessionId, conn: &PendingConnection) -> EmsResult<(File, File)> {
    let setup = SetupRequest::decode(conn.frame())?;
    let requests = fifo::open_request(Path::new(&setup.request_path))?;
    let mut responses = fifo::open_response(Path::new(&setup.response_path))?;
    write_session_id(&mut responses, id)?;
    debug!(session = %id, request = %setup.request_path, response = %setup.response_path, "handshake complete");
    Ok((requests, responses))
}

/// One client's command loop over its private channels
pub struct Session<R, W> {
    id: SessionId,
    engine: ReservationEngine,
    requests: R,
    responses: W,
    handled: u64,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(id: SessionId, engine: ReservationEngine, requests: R, responses: W) -> Self {
        Self {
            id,
            engine,
            requests,
            responses,
            handled: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Requests answered so far
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Drive the state machine until the session ends.
    pub fn run(&mut self) -> EndReason {
        let mut state = State::AwaitOpcode;
        loop {
            state = match state {
                State::AwaitOpcode => self.next_request(),
                State::Processing(request) => self.process(request),
                State::Terminated(reason) => return reason,
            };
        }
    }

    fn next_request(&mut self) -> State {
        match Request::read_from(&mut self.requests) {
            Ok(Some(request)) => State::Processing(request),
            Ok(None) => State::Terminated(EndReason::ChannelClosed),
            Err(EmsError::Protocol(e)) => {
                warn!(session = %self.id, error = %e, "malformed frame");
                State::Terminated(EndReason::Protocol)
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "request channel failed");
                State::Terminated(EndReason::Channel)
            }
        }
    }

    fn process(&mut self, request: Request) -> State {
        let Some(response) = self.dispatch(request) else {
            return State::Terminated(EndReason::Quit);
        };
        match response.write_to(&mut self.responses) {
            Ok(()) => {
                self.handled += 1;
                State::AwaitOpcode
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "response channel failed");
                State::Terminated(EndReason::Channel)
            }
        }
    }

    /// Execute one request; `None` for QUIT, which gets no reply.
    pub fn dispatch(&self, request: Request) -> Option<Response> {
        let opcode = request.opcode();
        let result = match request {
            Request::Quit => return None,
            Request::Create { event_id, rows, cols } => self
                .engine
                .create(event_id, rows, cols)
                .map(|()| Response::success()),
            Request::Reserve { event_id, seats } => self
                .engine
                .reserve(event_id, &seats)
                .map(|_| Response::success()),
            Request::Show { event_id } => self.engine.show(event_id).map(Response::Grid),
            Request::List => Ok(Response::Events(self.engine.list())),
        };

        Some(result.unwrap_or_else(|e| {
            if e.is_request_failure() {
                debug!(session = %self.id, ?opcode, error = %e, "request rejected");
            } else {
                warn!(session = %self.id, ?opcode, error = %e, "request failed");
            }
            Response::failure()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_core::protocol::Status;
    use ems_core::{EventId, EventStore, OpCode, Seat};
    use std::io::Cursor;
    use std::sync::Arc;

    fn engine() -> ReservationEngine {
        ReservationEngine::new(Arc::new(EventStore::default()))
    }

    fn frames(requests: &[Request]) -> Cursor<Vec<u8>> {
        Cursor::new(requests.iter().flat_map(Request::encode).collect())
    }

    #[test]
    fn test_scenario_replies() {
        let ev = EventId::new(1);
        let input = frames(&[
            Request::Create { event_id: ev, rows: 2, cols: 2 },
            Request::Reserve { event_id: ev, seats: vec![Seat::new(1, 1), Seat::new(2, 2)] },
            Request::Show { event_id: ev },
            Request::Reserve { event_id: ev, seats: vec![Seat::new(1, 1)] },
            Request::List,
            Request::Quit,
            Request::List,
        ]);
        let mut session = Session::new(SessionId::new(1), engine(), input, Vec::new());
        assert_eq!(session.run(), EndReason::Quit);
        assert_eq!(session.handled(), 5);

        let mut out = Cursor::new(session.responses);
        assert_eq!(Response::read_status(&mut out).unwrap(), Status::Success);
        assert_eq!(Response::read_status(&mut out).unwrap(), Status::Success);
        let grid = Response::read_grid(&mut out).unwrap().unwrap();
        assert_eq!(grid.seats, vec![1, 0, 0, 1]);
        assert_eq!(Response::read_status(&mut out).unwrap(), Status::Failure);
        assert_eq!(Response::read_events(&mut out).unwrap(), Some(vec![ev]));
        // Nothing after QUIT was answered.
        assert_eq!(out.position() as usize, out.get_ref().len());
    }

    #[test]
    fn test_failures_keep_session_alive() {
        let input = frames(&[
            Request::Show { event_id: EventId::new(9) },
            Request::Reserve { event_id: EventId::new(9), seats: vec![Seat::new(1, 1)] },
            Request::Create { event_id: EventId::new(1), rows: 0, cols: 3 },
            Request::List,
        ]);
        let mut session = Session::new(SessionId::new(1), engine(), input, Vec::new());
        assert_eq!(session.run(), EndReason::ChannelClosed);

        let mut out = Cursor::new(session.responses);
        assert_eq!(Response::read_grid(&mut out).unwrap(), None);
        assert_eq!(Response::read_status(&mut out).unwrap(), Status::Failure);
        assert_eq!(Response::read_status(&mut out).unwrap(), Status::Failure);
        assert_eq!(Response::read_events(&mut out).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_malformed_frame_ends_session() {
        let mut bytes = Request::List.encode();
        bytes.push(0xEE);
        let mut session = Session::new(SessionId::new(1), engine(), Cursor::new(bytes), Vec::new());
        assert_eq!(session.run(), EndReason::Protocol);
        assert_eq!(session.handled(), 1);
    }

    #[test]
    fn test_setup_on_private_channel_ends_session() {
        let bytes = vec![OpCode::Setup as u8];
        let mut session = Session::new(SessionId::new(1), engine(), Cursor::new(bytes), Vec::new());
        assert_eq!(session.run(), EndReason::Protocol);
    }

    #[test]
    fn test_handshake_rejects_garbage() {
        let conn = PendingConnection::new(vec![0u8; ems_core::constants::SETUP_FRAME_LEN]);
        assert!(matches!(
            handshake(SessionId::new(1), &conn),
            Err(EmsError::Protocol(_))
        ));
    }

    #[test]
    fn test_handshake_missing_pipes() {
        let dir = tempfile::tempdir().unwrap();
        let setup = SetupRequest::new(
            dir.path().join("req").to_string_lossy(),
            dir.path().join("resp").to_string_lossy(),
        );
        let conn = PendingConnection::new(setup.encode().unwrap());
        assert!(matches!(
            handshake(SessionId::new(1), &conn),
            Err(EmsError::Channel(_))
        ));
    }
}
