//! Session acceptor
//!
//! One thread reads registrations off the well-known channel, numbers
//! them, and hands them to the worker pool through the session buffer.
//! The listener keeps the stream aligned on frame boundaries; decoding a
//! registration is left to the worker that serves it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ems_core::{SessionBuffer, SessionId};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

/// Pause before retrying after a failed reopen
const REOPEN_BACKOFF: Duration = Duration::from_millis(50);

/// Raw, undecoded registration frame read off the well-known channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConnection {
    frame: Vec<u8>,
}

impl PendingConnection {
    pub fn new(frame: Vec<u8>) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &[u8] {
        &self.frame
    }
}

/// A numbered registration waiting for a worker
#[derive(Debug)]
pub struct Admission {
    pub id: SessionId,
    pub conn: PendingConnection,
}

/// Source of pending connections
pub trait Listener: Send + 'static {
    /// Block until the next registration arrives.
    ///
    /// `InvalidData` means malformed bytes were discarded and the channel
    /// is still usable.
    fn accept(&mut self) -> io::Result<PendingConnection>;

    /// Re-establish the channel after a failed `accept`.
    fn reopen(&mut self) -> io::Result<()>;
}

/// Accept loop state
pub struct Acceptor<L: Listener> {
    listener: L,
    buffer: Arc<SessionBuffer<Admission>>,
    /// Next id to hand out, `None` once the id space is used up. Held
    /// across `put` so ids enter the buffer in the order they are assigned.
    next_id: Mutex<Option<SessionId>>,
    stop: Arc<AtomicBool>,
}

impl<L: Listener> Acceptor<L> {
    pub fn new(listener: L, buffer: Arc<SessionBuffer<Admission>>, stop: Arc<AtomicBool>) -> Self {
        Self {
            listener,
            buffer,
            next_id: Mutex::new(Some(SessionId::FIRST)),
            stop,
        }
    }

    #[inline]
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Run until the stop flag is raised or the buffer is closed.
    ///
    /// Returns the number of sessions admitted.
    pub fn run(mut self) -> u64 {
        let mut admitted = 0u64;

        while !self.stopped() {
            let conn = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    if self.stopped() {
                        break;
                    }
                    warn!(error = %e, "discarded malformed registration");
                    continue;
                }
                Err(e) => {
                    if self.stopped() {
                        break;
                    }
                    warn!(error = %e, "read on registration channel failed, reopening");
                    if let Err(e) = self.listener.reopen() {
                        error!(error = %e, "cannot reopen registration channel");
                        thread::sleep(REOPEN_BACKOFF);
                    }
                    continue;
                }
            };

            if self.stopped() {
                break;
            }

            let mut next_id = self.next_id.lock();
            let Some(id) = *next_id else {
                error!("session ids exhausted, no longer admitting");
                break;
            };
            if self.buffer.put(Admission { id, conn }).is_err() {
                break;
            }
            *next_id = id.next();
            drop(next_id);

            admitted += 1;
            debug!(session = %id, "session admitted");
        }

        debug!(admitted, "acceptor stopped");
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted accept results, then raises the stop flag.
    struct Scripted {
        script: VecDeque<io::Result<PendingConnection>>,
        reopens: Arc<Mutex<usize>>,
        stop: Arc<AtomicBool>,
    }

    impl Listener for Scripted {
        fn accept(&mut self) -> io::Result<PendingConnection> {
            match self.script.pop_front() {
                Some(result) => result,
                None => {
                    self.stop.store(true, Ordering::Release);
                    Err(io::Error::new(io::ErrorKind::Other, "script exhausted"))
                }
            }
        }

        fn reopen(&mut self) -> io::Result<()> {
            *self.reopens.lock() += 1;
            Ok(())
        }
    }

    fn frame(tag: u8) -> io::Result<PendingConnection> {
        Ok(PendingConnection::new(vec![tag]))
    }

    #[test]
    fn test_sequential_ids_and_retry() {
        let stop = Arc::new(AtomicBool::new(false));
        let reopens = Arc::new(Mutex::new(0));
        let listener = Scripted {
            script: VecDeque::from(vec![
                frame(1),
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")),
                frame(2),
                frame(3),
            ]),
            reopens: Arc::clone(&reopens),
            stop: Arc::clone(&stop),
        };
        let buffer = Arc::new(SessionBuffer::new(4));

        let admitted = Acceptor::new(listener, Arc::clone(&buffer), stop).run();
        assert_eq!(admitted, 3);
        assert_eq!(*reopens.lock(), 1);

        let got: Vec<(u32, u8)> = std::iter::from_fn(|| buffer.try_take())
            .map(|a| (a.id.as_u32(), a.conn.frame()[0]))
            .collect();
        assert_eq!(got, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_malformed_registration_skipped_without_reopen() {
        let stop = Arc::new(AtomicBool::new(false));
        let reopens = Arc::new(Mutex::new(0));
        let listener = Scripted {
            script: VecDeque::from(vec![
                Err(io::Error::new(io::ErrorKind::InvalidData, "skipped 1 byte")),
                frame(7),
            ]),
            reopens: Arc::clone(&reopens),
            stop: Arc::clone(&stop),
        };
        let buffer = Arc::new(SessionBuffer::new(2));

        assert_eq!(Acceptor::new(listener, Arc::clone(&buffer), stop).run(), 1);
        assert_eq!(*reopens.lock(), 0);
        let admission = buffer.try_take().unwrap();
        assert_eq!((admission.id, admission.conn.frame()[0]), (SessionId::FIRST, 7));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let stop = Arc::new(AtomicBool::new(false));
        let listener = Scripted {
            script: VecDeque::from(vec![frame(1), frame(2)]),
            reopens: Arc::new(Mutex::new(0)),
            stop: Arc::clone(&stop),
        };
        let buffer = Arc::new(SessionBuffer::new(2));
        let mut acceptor = Acceptor::new(listener, Arc::clone(&buffer), stop);
        acceptor.next_id = Mutex::new(Some(SessionId::new(u32::MAX)));

        assert_eq!(acceptor.run(), 1);
        assert_eq!(buffer.try_take().unwrap().id, SessionId::new(u32::MAX));
        assert!(buffer.try_take().is_none());
    }

    #[test]
    fn test_closed_buffer_stops_acceptor() {
        let stop = Arc::new(AtomicBool::new(false));
        let listener = Scripted {
            script: VecDeque::from(vec![frame(1), frame(2)]),
            reopens: Arc::new(Mutex::new(0)),
            stop: Arc::clone(&stop),
        };
        let buffer = Arc::new(SessionBuffer::new(1));
        buffer.close();

        assert_eq!(Acceptor::new(listener, buffer, stop).run(), 0);
    }
}
