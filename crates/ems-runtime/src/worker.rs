//! Worker pool
//!
//! Spawns N OS threads at start. Each worker takes one admission from the
//! session buffer, performs the handshake, and runs that session to its
//! end before taking the next one. At most N sessions are served at once.
//!
//! No dynamic scaling.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ems_core::{ReservationEngine, SessionBuffer};
use tracing::{debug, info, warn};

use crate::acceptor::Admission;
use crate::error::{ServerError, ServerResult};
use crate::session::{self, Session};

/// Shared state between the pool handle and its workers.
struct PoolInner {
    buffer: Arc<SessionBuffer<Admission>>,
    engine: ReservationEngine,
    /// Workers currently inside a session
    active: AtomicUsize,
    /// Sessions that completed the handshake
    served: AtomicU64,
    shutdown: AtomicBool,
}

/// Fixed pool of session workers
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `n` workers draining `buffer`.
    pub fn start(
        n: usize,
        buffer: Arc<SessionBuffer<Admission>>,
        engine: ReservationEngine,
    ) -> ServerResult<Self> {
        let inner = Arc::new(PoolInner {
            buffer,
            engine,
            active: AtomicUsize::new(0),
            served: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        });

        let mut pool = WorkerPool {
            inner,
            handles: Vec::with_capacity(n),
        };
        for worker_id in 0..n {
            let inner = Arc::clone(&pool.inner);
            let name = format!("ems-worker-{}", worker_id);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(inner, worker_id));
            match handle {
                Ok(handle) => pool.handles.push(handle),
                Err(source) => {
                    pool.shutdown();
                    return Err(ServerError::Spawn { name, source });
                }
            }
        }
        Ok(pool)
    }

    /// Stop taking new sessions and wake idle workers.
    ///
    /// Workers inside a session finish it first.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.buffer.close();
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Wait for every worker to exit.
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Workers currently serving a session
    #[inline]
    pub fn active_sessions(&self) -> usize {
        self.inner.active.load(Ordering::Relaxed)
    }

    /// Sessions served since start
    #[inline]
    pub fn sessions_served(&self) -> u64 {
        self.inner.served.load(Ordering::Relaxed)
    }
}

/// Worker thread main loop.
fn worker_loop(inner: Arc<PoolInner>, worker_id: usize) {
    debug!(worker = worker_id, "worker started");

    while let Some(Admission { id, conn }) = inner.buffer.take() {
        inner.active.fetch_add(1, Ordering::Relaxed);

        match session::handshake(id, &conn) {
            Ok((requests, responses)) => {
                inner.served.fetch_add(1, Ordering::Relaxed);
                info!(session = %id, worker = worker_id, "session started");
                let mut session = Session::new(id, inner.engine.clone(), requests, responses);
                let reason = session.run();
                info!(session = %id, ?reason, requests = session.handled(), "session ended");
                // Dropping the session closes both private channels.
            }
            Err(e) => warn!(session = %id, error = %e, "handshake failed"),
        }

        inner.active.fetch_sub(1, Ordering::Relaxed);
        if inner.shutdown.load(Ordering::Acquire) {
            break;
        }
    }

    debug!(worker = worker_id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::PendingConnection;
    use ems_core::{EventStore, SessionId};
    use std::time::{Duration, Instant};

    fn engine() -> ReservationEngine {
        ReservationEngine::new(Arc::new(EventStore::default()))
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_and_shutdown() {
        let buffer = Arc::new(SessionBuffer::new(4));
        let pool = WorkerPool::start(4, Arc::clone(&buffer), engine()).unwrap();
        assert_eq!(pool.num_workers(), 4);
        assert_eq!(pool.active_sessions(), 0);

        pool.shutdown();
        assert!(pool.is_shutdown());
        pool.join();
    }

    #[test]
    fn test_bad_handshake_recycles_worker() {
        let buffer = Arc::new(SessionBuffer::new(2));
        let pool = WorkerPool::start(1, Arc::clone(&buffer), engine()).unwrap();

        for n in 0..3 {
            let conn = PendingConnection::new(vec![0xFF; 3]);
            buffer.put(Admission { id: SessionId::new(n), conn }).unwrap();
        }
        // One worker drains all three: a failed handshake does not kill it.
        wait_for(|| buffer.is_empty() && pool.active_sessions() == 0);
        assert_eq!(pool.sessions_served(), 0);

        pool.shutdown();
        pool.join();
    }
}
