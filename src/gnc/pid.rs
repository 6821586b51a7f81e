use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PID gains (one set per control axis)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub enabled: bool,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd, enabled: true }
    }

    pub const fn disabled() -> Self {
        Self { kp: 0.0, ki: 0.0, kd: 0.0, enabled: false }
    }

    pub fn is_finite(&self) -> bool {
        self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()
    }
}

// ---------------------------------------------------------------------------
// PID loop (single axis) with anti-windup and output clamping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PidLoop {
    gains: PidGains,
    output_min: f64,
    output_max: f64,
    error: f64,
    integral: f64,
    derivative: f64,
    last_error: f64,
    primed: bool, // last_error belongs to the previous update
    output: f64,
}

impl PidLoop {
    pub fn new(gains: PidGains, output_min: f64, output_max: f64) -> Self {
        debug_assert!(gains.is_finite(), "non-finite gains: {:?}", gains);
        debug_assert!(output_min <= output_max, "empty output range");
        Self {
            gains,
            output_min,
            output_max,
            error: 0.0,
            integral: 0.0,
            derivative: 0.0,
            last_error: 0.0,
            primed: false,
            output: 0.0,
        }
    }

    /// Loop with a symmetric output range of ±`limit`.
    pub fn symmetric(gains: PidGains, limit: f64) -> Self {
        Self::new(gains, -limit, limit)
    }

    /// One control update. `dt` must be positive.
    pub fn update(&mut self, setpoint: f64, measurement: f64, dt: f64) -> f64 {
        debug_assert!(dt > 0.0 && dt.is_finite(), "dt must be positive, got {}", dt);
        if !self.gains.enabled {
            return 0.0;
        }

        let error = setpoint - measurement;
        self.error = error;
        self.integral += error * dt;
        // First update after a reset or resync has no history to differentiate.
        self.derivative = if self.primed { (error - self.last_error) / dt } else { 0.0 };
        self.last_error = error;
        self.primed = true;

        let PidGains { kp, ki, kd, .. } = self.gains;
        let raw = kp * error + ki * self.integral + kd * self.derivative;

        // Anti-windup: drop this step's integration while pushing further into saturation.
        let high = raw > self.output_max && error > 0.0;
        let low = raw < self.output_min && error < 0.0;
        if high || low {
            self.integral -= error * dt;
        }

        self.output = raw.clamp(self.output_min, self.output_max);
        self.output
    }

    pub fn reset(&mut self) {
        self.error = 0.0;
        self.integral = 0.0;
        self.derivative = 0.0;
        self.last_error = 0.0;
        self.primed = false;
        self.output = 0.0;
    }

    /// Forget the last error so the next update starts without a derivative
    /// term. Integral and output are kept.
    pub fn resync(&mut self) {
        self.primed = false;
    }

    /// Replace gains; accumulated state survives unless the loop is disabled.
    pub fn set_gains(&mut self, gains: PidGains) {
        debug_assert!(gains.is_finite(), "non-finite gains: {:?}", gains);
        self.gains = gains;
        if !gains.enabled {
            self.reset();
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.gains.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    pub fn set_limits(&mut self, output_min: f64, output_max: f64) {
        debug_assert!(output_min <= output_max, "empty output range");
        self.output_min = output_min;
        self.output_max = output_max;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn is_enabled(&self) -> bool {
        self.gains.enabled
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn derivative(&self) -> f64 {
        self.derivative
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn limits(&self) -> (f64, f64) {
        (self.output_min, self.output_max)
    }
}
