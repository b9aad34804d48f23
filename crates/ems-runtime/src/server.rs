//! Server assembly and lifecycle
//!
//! ```text
//!   well-known FIFO ─▶ Acceptor ─▶ SessionBuffer ─▶ WorkerPool ─▶ ReservationEngine ─▶ EventStore
//! ```
//!
//! `bind` creates everything and fails fast; `spawn` starts the acceptor
//! and the workers; `shutdown` stops admissions, tears the store down
//! under its write lock, and removes the well-known FIFO.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ems_core::{EventStore, ReservationEngine, SessionBuffer};
use tracing::{info, warn};

use crate::acceptor::{Acceptor, Admission};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::fifo::{self, FifoListener, FifoWaker};
use crate::worker::WorkerPool;

struct Running {
    acceptor: JoinHandle<u64>,
    waker: FifoWaker,
    pool: WorkerPool,
}

/// The reservation server
pub struct Server {
    config: ServerConfig,
    engine: ReservationEngine,
    buffer: Arc<SessionBuffer<Admission>>,
    listener: Option<FifoListener>,
    running: Option<Running>,
    stop: Arc<AtomicBool>,
    terminated: bool,
}

impl Server {
    /// Validate `config`, create the well-known FIFO and the event store.
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;

        let listener = FifoListener::bind(config.pipe_path())?;
        let store = Arc::new(EventStore::new(config.delay()));
        let engine = ReservationEngine::new(store);
        let buffer = Arc::new(SessionBuffer::new(config.pool_size));

        info!(
            path = %config.pipe_path().display(),
            workers = config.pool_size,
            delay_us = config.state_access_delay.as_micros() as u64,
            "server bound"
        );

        Ok(Self {
            config,
            engine,
            buffer,
            listener: Some(listener),
            running: None,
            stop: Arc::new(AtomicBool::new(false)),
            terminated: false,
        })
    }

    /// Start the worker pool and the acceptor thread.
    pub fn spawn(&mut self) -> ServerResult<()> {
        let listener = self.listener.take().ok_or(ServerError::AlreadyRunning)?;
        let waker = listener.waker().map_err(|source| ServerError::Open {
            path: self.config.pipe_path.clone(),
            source,
        })?;

        let pool = WorkerPool::start(self.config.pool_size, Arc::clone(&self.buffer), self.engine.clone())?;

        let acceptor = Acceptor::new(listener, Arc::clone(&self.buffer), Arc::clone(&self.stop));
        let acceptor = thread::Builder::new()
            .name("ems-acceptor".to_string())
            .spawn(move || acceptor.run());
        let acceptor = match acceptor {
            Ok(handle) => handle,
            Err(source) => {
                pool.shutdown();
                return Err(ServerError::Spawn {
                    name: "ems-acceptor".to_string(),
                    source,
                });
            }
        };

        self.running = Some(Running { acceptor, waker, pool });
        info!("server running");
        Ok(())
    }

    pub fn engine(&self) -> &ReservationEngine {
        &self.engine
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn pipe_path(&self) -> &Path {
        self.config.pipe_path()
    }

    pub fn active_sessions(&self) -> usize {
        self.running.as_ref().map_or(0, |r| r.pool.active_sessions())
    }

    pub fn sessions_served(&self) -> u64 {
        self.running.as_ref().map_or(0, |r| r.pool.sessions_served())
    }

    /// Stop admissions, release the event store and remove the FIFO.
    ///
    /// Workers still inside a session keep their channels and see an
    /// empty store from now on. Returns the number of events released.
    /// Calling it again is a no-op.
    pub fn shutdown(&mut self) -> usize {
        if self.terminated {
            return 0;
        }
        self.terminated = true;

        self.stop.store(true, Ordering::Release);
        self.buffer.close();

        if let Some(mut running) = self.running.take() {
            if let Err(e) = running.waker.wake() {
                warn!(error = %e, "cannot wake acceptor");
            }
            match running.acceptor.join() {
                Ok(admitted) => info!(admitted, "acceptor joined"),
                Err(_) => warn!("acceptor panicked"),
            }
            running.pool.shutdown();
        }
        self.listener = None;

        let released = self.engine.store().terminate();
        if let Err(e) = fifo::remove(self.config.pipe_path()) {
            warn!(path = %self.config.pipe_path().display(), error = %e, "cannot remove pipe");
        }
        info!(events = released, "server stopped");
        released
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}
