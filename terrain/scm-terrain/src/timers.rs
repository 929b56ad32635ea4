//! Accumulating stage timers.

use std::time::{Duration, Instant};

/// A manually started/stopped timer accumulating across start/stop pairs.
#[derive(Debug, Default, Clone)]
pub(crate) struct StageTimer {
    total: Duration,
    started: Option<Instant>,
}

impl StageTimer {
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        if let Some(t0) = self.started.take() {
            self.total += t0.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.total = Duration::ZERO;
        self.started = None;
    }

    /// Accumulated time in milliseconds.
    pub fn ms(&self) -> f64 {
        self.total.as_secs_f64() * 1e3
    }
}

/// Timers for every stage of the step pipeline.
#[derive(Debug, Default, Clone)]
pub(crate) struct Timers {
    pub active_domains: StageTimer,
    pub ray_testing: StageTimer,
    pub ray_casting: StageTimer,
    pub contact_patches: StageTimer,
    pub contact_forces: StageTimer,
    pub bulldozing: StageTimer,
    pub bulldozing_boundary: StageTimer,
    pub bulldozing_domain: StageTimer,
    pub bulldozing_erosion: StageTimer,
    pub visualization: StageTimer,
}

impl Timers {
    pub fn reset_all(&mut self) {
        self.active_domains.reset();
        self.ray_testing.reset();
        self.ray_casting.reset();
        self.contact_patches.reset();
        self.contact_forces.reset();
        self.bulldozing.reset();
        self.bulldozing_boundary.reset();
        self.bulldozing_domain.reset();
        self.bulldozing_erosion.reset();
        self.visualization.reset();
    }
}
