//! Rolling tick-timing statistics for the run loop.

/// Rolling statistics over a window of per-tick durations.
#[derive(Debug)]
pub struct TickStats {
    samples: Vec<f64>,
    window_size: usize,
    total_ticks: u64,
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new(600)
    }
}

impl TickStats {
    pub fn new(window_size: usize) -> Self {
        Self { samples: Vec::with_capacity(window_size), window_size, total_ticks: 0 }
    }

    /// Record one tick's duration.
    pub fn record(&mut self, tick_ms: f64) {
        if self.samples.len() >= self.window_size {
            self.samples.remove(0);
        }
        self.samples.push(tick_ms);
        self.total_ticks += 1;
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn avg_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn max_ms(&self) -> f64 {
        self.samples.iter().copied().fold(0.0, f64::max)
    }

    /// One-line summary for periodic logging.
    pub fn summary(&self) -> String {
        format!(
            "{} ticks, avg {:.2}ms, max {:.2}ms over last {}",
            self.total_ticks,
            self.avg_ms(),
            self.max_ms(),
            self.samples.len(),
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
