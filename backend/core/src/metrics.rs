//! Operation metrics collector.
//!
//! One instance is created at startup and injected into every component
//! (never a module global) so tests can substitute a fresh collector.
//! Counters are monotonic for the process lifetime and atomically
//! incremented; they reset only on restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Which kind of operation a transport adapter just performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Capture,
    Ocr,
    ActivityLog,
}

pub struct Metrics {
    started: Instant,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    capture_operations: AtomicU64,
    ocr_operations: AtomicU64,
    activity_log_operations: AtomicU64,
    last_request_at: RwLock<Option<DateTime<Utc>>>,
    system: Mutex<System>,
    pid: Pid,
}

/// Point-in-time view of the counters, merged with uptime on demand.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub capture_operations: u64,
    pub ocr_operations: u64,
    pub activity_log_operations: u64,
    pub last_request_at: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
}

/// Process-level figures sampled from the OS.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStats {
    pub pid: u32,
    pub memory_mb: f64,
    pub cpu_percent: f32,
}

impl Metrics {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());
        // First refresh establishes the baseline for CPU deltas.
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        Self {
            started: Instant::now(),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            capture_operations: AtomicU64::new(0),
            ocr_operations: AtomicU64::new(0),
            activity_log_operations: AtomicU64::new(0),
            last_request_at: RwLock::new(None),
            system: Mutex::new(system),
            pid,
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request_at.write() {
            *last = Some(Utc::now());
        }
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_operation(&self, kind: OperationKind) {
        let counter = match kind {
            OperationKind::Capture => &self.capture_operations,
            OperationKind::Ocr => &self.ocr_operations,
            OperationKind::ActivityLog => &self.activity_log_operations,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            capture_operations: self.capture_operations.load(Ordering::Relaxed),
            ocr_operations: self.ocr_operations.load(Ordering::Relaxed),
            activity_log_operations: self.activity_log_operations.load(Ordering::Relaxed),
            last_request_at: self.last_request_at.read().ok().and_then(|l| *l),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Sample current memory/CPU for this process. CPU percentages need two
    /// refreshes over time to produce a delta; the constructor primes the
    /// first one.
    pub fn process_stats(&self) -> ProcessStats {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]));
        match system.process(self.pid) {
            Some(process) => ProcessStats {
                pid: self.pid.as_u32(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
                cpu_percent: process.cpu_usage(),
            },
            None => ProcessStats {
                pid: self.pid.as_u32(),
                memory_mb: 0.0,
                cpu_percent: 0.0,
            },
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
