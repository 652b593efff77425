//! Background reaper for leaked browser processes.
//!
//! Browser processes can outlive their pool when a shutdown is unclean. The
//! reaper periodically scans the OS process table for browser-engine
//! processes old enough to be orphans, verifies they were spawned by our
//! automation (their command line references one of our disposable profile
//! directories), and terminates them gracefully, then forcefully.

use std::sync::Arc;
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::PROFILE_MARKER;

/// Process names that identify the browser engine in the process table.
const ENGINE_PROCESS_NAMES: &[&str] = &["chrome", "chromium", "headless_shell"];

/// Configuration for the process reaper.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between periodic sweeps.
    pub interval: Duration,
    /// Minimum age before a process is considered orphaned.
    pub max_age: Duration,
    /// Substring that marks a process as spawned by this crate's pool.
    pub profile_marker: String,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_age: Duration::from_secs(30 * 60),
            profile_marker: PROFILE_MARKER.to_string(),
        }
    }
}

/// One row of the process table, re-read on every sweep.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    /// OS process id.
    pub pid: u32,
    /// Seconds since the process started.
    pub elapsed_secs: u64,
    /// Process (executable) name, lowercased.
    pub name: String,
    /// Full command line.
    pub cmdline: String,
}

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOutcome {
    /// Engine processes examined.
    pub examined: usize,
    /// Processes terminated (or found already exited).
    pub terminated: usize,
}

/// Observability snapshot over the engine processes currently alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaperStats {
    /// Engine processes in the table.
    pub process_count: usize,
    /// Their summed memory, in bytes.
    pub memory_bytes: u64,
    /// Age of the oldest engine process, in seconds.
    pub oldest_uptime_secs: u64,
}

/// Periodic process sweeper. See the module docs for the policy.
pub struct ProcessReaper {
    config: ReaperConfig,
}

/// Abort handle for the background sweep task. The task never keeps the
/// process alive past normal shutdown.
pub struct ReaperHandle {
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Cancels the periodic sweep.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ProcessReaper {
    /// Creates a reaper with the given configuration.
    pub fn new(config: ReaperConfig) -> Self {
        Self { config }
    }

    /// Starts the background task: one immediate sweep, then one per
    /// configured interval until the handle is dropped or stopped.
    pub fn start(self: &Arc<Self>) -> ReaperHandle {
        let reaper = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reaper.config.interval);
            loop {
                // First tick fires immediately.
                ticker.tick().await;
                let outcome = reaper.sweep().await;
                if outcome.terminated > 0 {
                    info!(
                        terminated = outcome.terminated,
                        examined = outcome.examined,
                        "Reaper sweep reclaimed orphaned browser processes"
                    );
                }
            }
        });
        ReaperHandle { task }
    }

    /// Runs one sweep: terminate fingerprinted engine processes older than
    /// `max_age`, leaving everything else untouched.
    pub async fn sweep(&self) -> SweepOutcome {
        let config = self.config.clone();
        let own_pid = std::process::id();
        tokio::task::spawn_blocking(move || sweep_blocking(&config, own_pid, false))
            .await
            .unwrap_or_default()
    }

    /// Terminates every engine process except our own, regardless of age
    /// or fingerprint. Last-resort cleanup.
    pub async fn emergency_sweep(&self) -> SweepOutcome {
        let config = self.config.clone();
        let own_pid = std::process::id();
        tokio::task::spawn_blocking(move || sweep_blocking(&config, own_pid, true))
            .await
            .unwrap_or_default()
    }

    /// Snapshot of the engine processes currently running.
    pub async fn stats(&self) -> ReaperStats {
        tokio::task::spawn_blocking(stats_blocking)
            .await
            .unwrap_or_default()
    }
}

/// Whether `record` should be terminated by a periodic sweep.
///
/// A candidate must match the engine's process-name signature, not be this
/// process, be older than `max_age`, and carry the profile fingerprint in
/// its command line. Anything without the fingerprint is left alone no
/// matter how old it is.
fn is_reap_candidate(record: &ProcessRecord, own_pid: u32, config: &ReaperConfig) -> bool {
    matches_engine_name(&record.name)
        && record.pid != own_pid
        && record.elapsed_secs > config.max_age.as_secs()
        && record.cmdline.contains(&config.profile_marker)
}

/// Whether `record` falls under an emergency sweep: every engine process
/// except our own, age and fingerprint ignored.
fn is_emergency_candidate(record: &ProcessRecord, own_pid: u32) -> bool {
    matches_engine_name(&record.name) && record.pid != own_pid
}

fn matches_engine_name(name: &str) -> bool {
    ENGINE_PROCESS_NAMES.iter().any(|n| name.contains(n))
}

fn collect_records(sys: &System) -> Vec<ProcessRecord> {
    sys.processes()
        .iter()
        .map(|(pid, process)| ProcessRecord {
            pid: pid.as_u32(),
            elapsed_secs: process.run_time(),
            name: process.name().to_string_lossy().to_lowercase(),
            cmdline: process
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join(" "),
        })
        .filter(|r| matches_engine_name(&r.name))
        .collect()
}

fn sweep_blocking(config: &ReaperConfig, own_pid: u32, emergency: bool) -> SweepOutcome {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let records = collect_records(&sys);
    let mut outcome = SweepOutcome {
        examined: records.len(),
        terminated: 0,
    };

    let targets: Vec<u32> = records
        .iter()
        .filter(|r| {
            if emergency {
                is_emergency_candidate(r, own_pid)
            } else {
                is_reap_candidate(r, own_pid, config)
            }
        })
        .map(|r| r.pid)
        .collect();

    for pid in targets {
        if terminate(&mut sys, pid) {
            outcome.terminated += 1;
        }
    }
    outcome
}

/// Graceful-then-forced termination. A target that has already exited is
/// success, not an error.
fn terminate(sys: &mut System, pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let Some(process) = sys.process(pid) else {
        // Raced with its own exit; the goal is met.
        return true;
    };

    debug!(pid = pid.as_u32(), "Terminating orphaned browser process");
    match process.kill_with(Signal::Term) {
        Some(_) => {}
        None => {
            // Platform without TERM support: go straight to a hard kill.
            process.kill();
        }
    }

    std::thread::sleep(Duration::from_secs(1));
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    if let Some(survivor) = sys.process(pid) {
        warn!(pid = pid.as_u32(), "Process survived TERM, force killing");
        survivor.kill();
    }
    true
}

fn stats_blocking() -> ReaperStats {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let records = collect_records(&sys);
    let memory_bytes = sys
        .processes()
        .iter()
        .filter(|(_, p)| matches_engine_name(&p.name().to_string_lossy().to_lowercase()))
        .map(|(_, p)| p.memory())
        .sum();

    ReaperStats {
        process_count: records.len(),
        memory_bytes,
        oldest_uptime_secs: records.iter().map(|r| r.elapsed_secs).max().unwrap_or(0),
    }
}
