//! RSS sampling for the indexer's spill heuristics. On platforms where
//! `sysinfo` cannot read the current process' memory, callers fall back to
//! an accounting-based estimate instead (see the `index` crate).

use sysinfo::{Pid, System};

pub struct RssProbe {
    sys: System,
    pid: Pid,
}

impl RssProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().expect("failed to resolve current pid");
        let mut sys = System::new();
        sys.refresh_process(pid);
        Self { sys, pid }
    }

    /// Resident set size of the current process, in megabytes. Returns `None`
    /// if the platform doesn't expose process memory info.
    pub fn rss_mb(&mut self) -> Option<f64> {
        self.sys.refresh_process(self.pid);
        self.sys
            .process(self.pid)
            .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
    }
}

impl Default for RssProbe {
    fn default() -> Self {
        Self::new()
    }
}
