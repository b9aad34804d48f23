//! EMS End-to-End Smoke Test
//!
//! Drives a running ems-server through the client stub:
//!   Part A, Single session: create, reserve, show, list
//!   Part B, Rejections: conflicts, bad coordinates, unknown events
//!   Part C, Concurrent sessions reserving disjoint rows of one event
//!
//! Run:
//!     ./target/release/ems-server /tmp/ems &
//!     ./target/release/ems-smoke /tmp/ems [clients]

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{bail, Context};
use ems_client::{render_events, render_grid, Client, ClientError};
use ems_core::{EventId, OpCode, Seat};

// ── Test harness ──

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new() -> Self {
        Self { total: 0, passed: 0, failed: 0 }
    }

    fn section(&self, name: &str) {
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        self.total += 1;
        if ok {
            self.passed += 1;
            println!("  [{:2}] {:<52} PASS", self.total, name);
        } else {
            self.failed += 1;
            println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
        }
    }

    fn summary(&self) {
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.total, self.passed, self.failed
        );
        println!("{}", LINE);
    }
}

/// Private pipe paths unique to this process and session name
fn pipes(name: &str) -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir();
    let pid = std::process::id();
    (
        dir.join(format!("ems-smoke-{pid}-{name}.req")),
        dir.join(format!("ems-smoke-{pid}-{name}.resp")),
    )
}

fn connect(server: &Path, name: &str) -> anyhow::Result<Client> {
    let (req, resp) = pipes(name);
    Client::connect(&req, &resp, server).with_context(|| format!("session {name} failed to connect"))
}

fn rejected(result: Result<impl Sized, ClientError>, op: OpCode) -> bool {
    matches!(result, Err(ClientError::Rejected(o)) if o == op)
}

// ════════════════════════════════════════════════════════════
// Part A: Single session
// ════════════════════════════════════════════════════════════

fn test_single_session(t: &mut TestRunner, server: &Path, base: u32) -> anyhow::Result<()> {
    t.section("Part A: Single session");

    let mut client = connect(server, "a")?;
    t.check("connect", true, "");
    println!("       session id {}", client.session_id());

    let ev = EventId::new(base);
    t.check("create 2x2", client.create(ev, 2, 2).is_ok(), "create rejected");
    t.check(
        "reserve (1,1) (2,2)",
        client.reserve(ev, &[Seat::new(1, 1), Seat::new(2, 2)]).is_ok(),
        "reserve rejected",
    );

    let grid = client.show(ev)?;
    print!("{}", render_grid(&grid));
    t.check("show reflects reservation", grid.seats == [1, 0, 0, 1], "unexpected grid");

    let events = client.list()?;
    print!("{}", render_events(&events));
    t.check("list contains event", events.contains(&ev), "event missing");

    client.quit()?;
    Ok(())
}

// ════════════════════════════════════════════════════════════
// Part B: Rejections
// ════════════════════════════════════════════════════════════

fn test_rejections(t: &mut TestRunner, server: &Path, base: u32) -> anyhow::Result<()> {
    t.section("Part B: Rejections");

    let mut client = connect(server, "b")?;
    let ev = EventId::new(base + 1);
    client.create(ev, 3, 3)?;
    client.reserve(ev, &[Seat::new(2, 2)])?;
    let before = client.show(ev)?;

    t.check("duplicate create", rejected(client.create(ev, 1, 1), OpCode::Create), "accepted");
    t.check(
        "conflicting reserve",
        rejected(client.reserve(ev, &[Seat::new(1, 1), Seat::new(2, 2)]), OpCode::Reserve),
        "accepted",
    );
    t.check(
        "out-of-bounds reserve",
        rejected(client.reserve(ev, &[Seat::new(4, 1)]), OpCode::Reserve),
        "accepted",
    );
    t.check(
        "unknown event",
        rejected(client.show(EventId::new(base + 99)), OpCode::Show),
        "accepted",
    );
    t.check("grid unchanged", client.show(ev)? == before, "partial write");

    client.quit()?;
    Ok(())
}

// ════════════════════════════════════════════════════════════
// Part C: Concurrent sessions
// ════════════════════════════════════════════════════════════

fn test_concurrent(t: &mut TestRunner, server: &Path, base: u32, clients: usize) -> anyhow::Result<()> {
    t.section("Part C: Concurrent sessions");

    let ev = EventId::new(base + 2);
    let mut setup = connect(server, "c-setup")?;
    setup.create(ev, clients, 8)?;

    let handles: Vec<_> = (1..=clients)
        .map(|row| {
            let server = server.to_path_buf();
            thread::spawn(move || -> anyhow::Result<()> {
                let mut client = connect(&server, &format!("c{row}"))?;
                let seats: Vec<Seat> = (1..=8).map(|col| Seat::new(row, col)).collect();
                client.reserve(ev, &seats)?;
                client.quit()?;
                Ok(())
            })
        })
        .collect();

    let mut ok = 0;
    for h in handles {
        match h.join() {
            Ok(Ok(())) => ok += 1,
            Ok(Err(e)) => println!("       client error: {e:#}"),
            Err(_) => println!("       client thread panicked"),
        }
    }
    t.check(&format!("{clients} clients reserved"), ok == clients, "some clients failed");

    let grid = setup.show(ev)?;
    let rows_whole = grid.rows().all(|r| r[0] != 0 && r.iter().all(|&s| s == r[0]));
    t.check("each row holds one reservation", rows_whole, "rows interleaved");

    setup.quit()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(server) = args.get(1).map(PathBuf::from) else {
        bail!("usage: ems-smoke <server_pipe> [clients]");
    };
    let clients: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(4);

    println!("=== EMS End-to-End Smoke Test ===");
    println!("    server: {}", server.display());

    // Event ids derived from the pid so repeated runs against one server
    // do not collide.
    let base = (std::process::id() % 100_000) * 100;

    let mut t = TestRunner::new();
    test_single_session(&mut t, &server, base)?;
    test_rejections(&mut t, &server, base)?;
    test_concurrent(&mut t, &server, base, clients)?;
    t.summary();

    if t.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
