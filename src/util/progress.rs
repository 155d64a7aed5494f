use std::time::{Duration, Instant};

use tracing::info;

use super::env::env_parse;

/// Progress logging interval (rows). Override with env PROGRESS_INTERVAL.
fn progress_interval() -> usize {
    env_parse("PROGRESS_INTERVAL", 5_000usize).max(1)
}

/// Row counter that logs rate and ETA under the `progress` target.
#[derive(Clone)]
pub struct Progress {
    label: String,
    total: Option<usize>,
    every: usize,
    start: Instant,
    last_logged: usize,
    processed: usize,
}

impl Progress {
    pub fn new<L: Into<String>>(label: L, total: Option<usize>) -> Self {
        Self {
            label: label.into(),
            total,
            every: progress_interval(),
            start: Instant::now(),
            last_logged: 0,
            processed: 0,
        }
    }

    pub fn tick(&mut self, n: usize) {
        self.processed += n;
        if self.processed - self.last_logged >= self.every {
            self.last_logged = self.processed;
            self.log(false);
        }
    }

    pub fn finish(&mut self) {
        self.log(true);
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    fn log(&self, done: bool) {
        let elapsed = self.start.elapsed().max(Duration::from_millis(1)).as_secs_f64();
        let rate = format!("{:.1}/s", self.processed as f64 / elapsed);
        match self.total {
            Some(total) if !done && self.processed > 0 => {
                let remaining = total.saturating_sub(self.processed);
                let eta = elapsed / self.processed as f64 * remaining as f64;
                info!(target: "progress", label = %self.label, processed = self.processed, remaining, total, rate = %rate, eta = %format!("{eta:.1}s"), "progress");
            }
            _ if done => {
                info!(target: "progress", label = %self.label, processed = self.processed, total = ?self.total, rate = %rate, took = %format!("{elapsed:.1}s"), "done");
            }
            _ => {
                info!(target: "progress", label = %self.label, processed = self.processed, rate = %rate, "progress");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_tick() {
        let mut p = Progress::new("genre", Some(10));
        p.tick(4);
        p.tick(6);
        p.finish();
        assert_eq!(p.processed(), 10);
    }
}
