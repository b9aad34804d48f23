//! EMS Server
//!
//! Event reservation server over named pipes. Clients register on the
//! well-known FIFO, then talk to one worker over their own pair of FIFOs.
//!
//! Usage:
//!     cargo build --release -p ems-server
//!     ./target/release/ems-server <pipe_path> [delay_us] [--workers N]
//!
//! Environment:
//!     EMS_POOL_SIZE              worker count (default 8)
//!     EMS_STATE_ACCESS_DELAY_US  artificial delay per state access (default 10)
//!     EMS_LOG_LEVEL              off|error|warn|info|debug|trace
//!
//! Stops cleanly on SIGINT/SIGTERM: the event store is released and the
//! well-known FIFO removed.

use std::ffi::c_int;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::info;

use ems_runtime::{logging, Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "ems-server", about = "Event reservation server over named pipes", version)]
struct Cli {
    /// Path of the well-known registration FIFO
    #[arg(value_name = "PIPE_PATH")]
    pipe_path: PathBuf,

    /// Artificial state-access delay in microseconds
    #[arg(value_name = "DELAY_US")]
    delay_us: Option<u32>,

    /// Number of workers (and concurrent sessions)
    #[arg(long, env = "EMS_POOL_SIZE", value_name = "N")]
    workers: Option<usize>,
}

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_signal(_sig: c_int) {
    RUNNING.store(false, Ordering::Relaxed);
}

fn install_signal_handlers() -> anyhow::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // Safety: the handler only stores to an atomic.
        unsafe { sigaction(signal, &action) }
            .with_context(|| format!("cannot install {signal} handler"))?;
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ServerConfig::from_env(cli.pipe_path);
    if let Some(us) = cli.delay_us {
        config = config.state_access_delay_us(us);
    }
    if let Some(n) = cli.workers {
        config = config.pool_size(n);
    }

    install_signal_handlers()?;

    let mut server = Server::bind(config).context("server initialization failed")?;
    server.spawn().context("cannot start server")?;

    while RUNNING.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    info!("shutdown requested");
    server.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    logging::init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ems-server: {e:#}");
            ExitCode::FAILURE
        }
    }
}
