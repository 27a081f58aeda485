//! Wall-clock measurement helpers.
//!
//! Step and total timings are part of the selection results, so this is a
//! flat stopwatch rather than a scope hierarchy; the [`timed!`] macro covers
//! the cases where a duration is only wanted in the logs.

use std::time::Instant;

/// A running wall-clock stopwatch reporting milliseconds.
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1e3
    }
}

/// Evaluates an expression and logs its duration at `Debug` level.
#[macro_export]
macro_rules! timed {
    ($ctx:expr, $exp:expr) => {{
        let watch = $crate::util::timing::Stopwatch::start();
        let res = $exp;
        log::debug!("{} took {:.2} ms", $ctx, watch.elapsed_ms());
        res
    }};
}
