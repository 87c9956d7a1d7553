use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::engine::FormatKey;

#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
}

/// Timings of every generator that ran during a build.
#[derive(Debug)]
pub struct Diagnostics<K> {
    pub execution_times: HashMap<K, TaskExecution>,
}

impl<K> Default for Diagnostics<K> {
    fn default() -> Self {
        Self {
            execution_times: HashMap::new(),
        }
    }
}

impl<K: FormatKey> Diagnostics<K> {
    /// Total wall time from the first generator start to the last finish.
    pub fn wall_time(&self) -> Duration {
        let start = self.execution_times.values().map(|t| t.start).min();
        let end = self
            .execution_times
            .values()
            .map(|t| t.start + t.duration)
            .max();

        match (start, end) {
            (Some(start), Some(end)) => end.duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// One line per generator, in start order, with the offset from the
    /// first start and the duration.
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut ran: Vec<_> = self.execution_times.iter().collect();
        ran.sort_by(|(a_name, a), (b_name, b)| a.start.cmp(&b.start).then(a_name.cmp(b_name)));

        let Some(global_start) = ran.first().map(|(_, t)| t.start) else {
            return String::from("No formats generated");
        };

        let width = ran.iter().map(|(name, _)| name.to_string().len()).max().unwrap_or(0);
        let mut output = String::new();

        for (name, execution) in ran {
            let offset = execution.start.duration_since(global_start);
            let _ = writeln!(
                output,
                "{:<width$}  +{:>8.2}ms  {:>8.2}ms",
                name.to_string(),
                offset.as_secs_f64() * 1000.0,
                execution.duration.as_secs_f64() * 1000.0,
            );
        }

        let _ = write!(
            output,
            "{:<width$}  {:>19.2}ms",
            "total",
            self.wall_time().as_secs_f64() * 1000.0
        );

        output
    }
}
