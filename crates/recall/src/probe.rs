//! Process memory probe.
//!
//! Reports resident-set size as a fraction of a configured budget,
//! driving the query cache's pressure eviction. Reads
//! `/proc/self/status` on Linux; on other platforms (or when the read
//! fails) utilization is reported as 0.0, which disables
//! pressure-triggered eviction while TTL expiry still applies.

use recall_core::cache::MemoryProbe;
use tracing::debug;

pub struct ProcessMemoryProbe {
    budget_bytes: u64,
}

impl ProcessMemoryProbe {
    pub fn new(budget_mb: u64) -> Self {
        Self {
            budget_bytes: budget_mb * 1024 * 1024,
        }
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn heap_utilization(&self) -> f64 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        match resident_bytes() {
            Some(rss) => (rss as f64 / self.budget_bytes as f64).min(1.0),
            None => 0.0,
        }
    }

    fn request_gc(&self) {
        // Rust has no host GC to invoke; the flush performed by the
        // cache is the actual relief. The hook stays for probes backed
        // by runtimes that do expose one.
        debug!("gc requested; no host collector available");
    }
}

/// VmRSS from `/proc/self/status`, in bytes.
fn resident_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}
