use tokio::time::Instant;

use crate::platform::ProgressReport;

/// Progress of a batch of mutations, reported every `step` items.
///
/// Batches below `threshold` items are silent.
#[derive(Debug)]
pub struct Progress {
    description: String,
    total: usize,
    step: usize,
    enabled: bool,
    started: Instant,
}

impl Progress {
    pub fn new(description: impl Into<String>, total: usize, threshold: usize, step: usize) -> Self {
        Self {
            description: description.into(),
            total,
            step: step.max(1),
            enabled: total > 0 && total >= threshold,
            started: Instant::now(),
        }
    }

    /// The report announcing the batch, if it is reported at all.
    #[must_use]
    pub fn start(&self) -> Option<ProgressReport> {
        self.enabled.then(|| self.report(0))
    }

    /// The report due after `processed` items, if any.
    #[must_use]
    pub fn after(&self, processed: usize) -> Option<ProgressReport> {
        let due = processed % self.step == 0 || processed == self.total;
        (self.enabled && processed > 0 && due).then(|| self.report(processed))
    }

    fn report(&self, processed: usize) -> ProgressReport {
        let elapsed = self.started.elapsed();
        let remaining = (processed > 0).then(|| {
            let left = self.total.saturating_sub(processed) as f64;
            elapsed.mul_f64(left / processed as f64)
        });
        ProgressReport {
            description: self.description.clone(),
            processed,
            total: self.total,
            elapsed,
            remaining,
        }
    }
}

impl ProgressReport {
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.processed >= self.total
    }
}

impl std::fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}/{}", self.description, self.processed, self.total)?;
        if let Some(remaining) = self.remaining {
            write!(
                f,
                ", elapsed {:.2}s, remaining {:.2}s",
                self.elapsed.as_secs_f64(),
                remaining.as_secs_f64()
            )?;
        }
        Ok(())
    }
}
