use super::pid::{PidGains, PidLoop};

// ---------------------------------------------------------------------------
// Cascaded position loop: position → velocity setpoint → attitude setpoint
// ---------------------------------------------------------------------------

/// Outer position loop feeding an inner velocity loop on one horizontal axis.
#[derive(Debug, Clone)]
pub struct CascadedLoop {
    outer: PidLoop,
    inner: PidLoop,
}

impl CascadedLoop {
    /// `max_velocity` bounds the outer output, `max_inner_setpoint` the inner one.
    pub fn new(
        outer: PidGains,
        inner: PidGains,
        max_velocity: f64,
        max_inner_setpoint: f64,
    ) -> Self {
        Self {
            outer: PidLoop::symmetric(outer, max_velocity),
            inner: PidLoop::symmetric(inner, max_inner_setpoint),
        }
    }

    pub fn update(&mut self, position_setpoint: f64, position: f64, velocity: f64, dt: f64) -> f64 {
        let velocity_setpoint = self.outer.update(position_setpoint, position, dt);
        self.inner.update(velocity_setpoint, velocity, dt)
    }

    pub fn reset(&mut self) {
        self.outer.reset();
        self.inner.reset();
    }

    pub fn resync(&mut self) {
        self.outer.resync();
        self.inner.resync();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.outer.set_enabled(enabled);
        self.inner.set_enabled(enabled);
    }

    pub fn set_gains(&mut self, outer: PidGains, inner: PidGains) {
        self.outer.set_gains(outer);
        self.inner.set_gains(inner);
    }

    pub fn set_limits(&mut self, max_velocity: f64, max_inner_setpoint: f64) {
        self.outer.set_limits(-max_velocity, max_velocity);
        self.inner.set_limits(-max_inner_setpoint, max_inner_setpoint);
    }

    /// Velocity setpoint produced by the last outer update.
    pub fn velocity_setpoint(&self) -> f64 {
        self.outer.output()
    }

    /// Position error seen by the last outer update.
    pub fn position_error(&self) -> f64 {
        self.outer.error()
    }

    pub fn output(&self) -> f64 {
        self.inner.output()
    }

    pub fn outer(&self) -> &PidLoop {
        &self.outer
    }

    pub fn inner(&self) -> &PidLoop {
        &self.inner
    }
}
