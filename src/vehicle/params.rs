use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::dynamics::state::GRAVITY;

/// Throttle fraction the default airframe needs to hover.
pub const NOMINAL_HOVER_THROTTLE: f64 = 0.65;

// ---------------------------------------------------------------------------
// Vehicle parameters (X-configuration quadrotor)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleParameters {
    pub mass: f64,                // kg
    pub arm_length: f64,          // m, CG to rotor hub
    pub inertia: Vector3<f64>,    // [Ixx, Iyy, Izz] principal moments, kg·m^2
    pub drag_coeff: f64,          // N/(m/s)^2, quadratic
    pub max_motor_thrust: f64,    // N per rotor at full command
    pub thrust_to_torque: f64,    // m, reaction torque per newton of rotor thrust
}

impl Default for VehicleParameters {
    fn default() -> Self {
        presets::trainer()
    }
}

impl VehicleParameters {
    pub fn weight(&self) -> f64 {
        self.mass * GRAVITY
    }

    /// Total thrust available with every rotor at full command (N).
    pub fn max_total_thrust(&self) -> f64 {
        4.0 * self.max_motor_thrust
    }

    /// Uniform motor fraction that exactly balances gravity.
    pub fn hover_throttle(&self) -> f64 {
        self.weight() / self.max_total_thrust()
    }

    /// Thrust-to-weight ratio at full command.
    pub fn twr(&self) -> f64 {
        self.max_total_thrust() / self.weight()
    }

    /// Merge the fields present in `update`, leaving the rest untouched.
    pub fn merge(&mut self, update: &VehicleParametersUpdate) {
        if let Some(v) = update.mass {
            self.mass = v;
        }
        if let Some(v) = update.arm_length {
            self.arm_length = v;
        }
        if let Some(v) = update.inertia {
            self.inertia = v;
        }
        if let Some(v) = update.drag_coeff {
            self.drag_coeff = v;
        }
        if let Some(v) = update.max_motor_thrust {
            self.max_motor_thrust = v;
        }
        if let Some(v) = update.thrust_to_torque {
            self.thrust_to_torque = v;
        }
    }

    /// Check for values the force model cannot integrate.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("mass", self.mass),
            ("arm_length", self.arm_length),
            ("inertia.x", self.inertia.x),
            ("inertia.y", self.inertia.y),
            ("inertia.z", self.inertia.z),
            ("max_motor_thrust", self.max_motor_thrust),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(format!("{} must be positive and finite, got {}", name, v));
            }
        }
        let non_negative = [
            ("drag_coeff", self.drag_coeff),
            ("thrust_to_torque", self.thrust_to_torque),
        ];
        for (name, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{} must be non-negative and finite, got {}", name, v));
            }
        }
        Ok(())
    }
}

/// Partial update for [`VehicleParameters`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleParametersUpdate {
    pub mass: Option<f64>,
    pub arm_length: Option<f64>,
    pub inertia: Option<Vector3<f64>>,
    pub drag_coeff: Option<f64>,
    pub max_motor_thrust: Option<f64>,
    pub thrust_to_torque: Option<f64>,
}

// ---------------------------------------------------------------------------
// Vehicle builder
// ---------------------------------------------------------------------------

pub struct VehicleBuilder {
    params: VehicleParameters,
}

impl VehicleBuilder {
    pub fn new() -> Self {
        Self { params: presets::trainer() }
    }

    pub fn mass(mut self, v: f64) -> Self { self.params.mass = v; self }
    pub fn arm_length(mut self, v: f64) -> Self { self.params.arm_length = v; self }
    pub fn inertia(mut self, v: Vector3<f64>) -> Self { self.params.inertia = v; self }
    pub fn drag_coeff(mut self, v: f64) -> Self { self.params.drag_coeff = v; self }
    pub fn max_motor_thrust(mut self, v: f64) -> Self { self.params.max_motor_thrust = v; self }
    pub fn thrust_to_torque(mut self, v: f64) -> Self { self.params.thrust_to_torque = v; self }

    /// Size the rotors so the airframe hovers at `throttle`.
    pub fn hover_at(mut self, throttle: f64) -> Self {
        self.params.max_motor_thrust = self.params.weight() / (4.0 * throttle);
        self
    }

    pub fn build(self) -> VehicleParameters {
        self.params
    }
}

impl Default for VehicleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Preset airframes
// ---------------------------------------------------------------------------

pub mod presets {
    use super::*;

    /// 1 kg, 250 mm-arm training quad that hovers at the nominal throttle.
    pub fn trainer() -> VehicleParameters {
        VehicleParameters {
            mass: 1.0,
            arm_length: 0.25,
            inertia: Vector3::new(0.01, 0.01, 0.02),
            drag_coeff: 0.1,
            max_motor_thrust: GRAVITY / (4.0 * NOMINAL_HOVER_THROTTLE),
            thrust_to_torque: 0.05,
        }
    }

    /// Heavier camera platform with the same hover point and slower rotation.
    pub fn heavy_lift() -> VehicleParameters {
        VehicleBuilder::new()
            .mass(2.5)
            .arm_length(0.35)
            .inertia(Vector3::new(0.03, 0.03, 0.055))
            .drag_coeff(0.2)
            .thrust_to_torque(0.06)
            .hover_at(NOMINAL_HOVER_THROTTLE)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn trainer_hovers_at_nominal_throttle() {
        let p = presets::trainer();
        assert_relative_eq!(p.hover_throttle(), NOMINAL_HOVER_THROTTLE, epsilon = 1e-12);
        assert!(p.twr() > 1.0);
    }

    #[test]
    fn builder_hover_at_sizes_rotors() {
        let p = presets::heavy_lift();
        assert_relative_eq!(p.hover_throttle(), NOMINAL_HOVER_THROTTLE, epsilon = 1e-12);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn merge_only_touches_given_fields() {
        let mut p = presets::trainer();
        p.merge(&VehicleParametersUpdate {
            mass: Some(1.4),
            ..Default::default()
        });
        assert_relative_eq!(p.mass, 1.4);
        assert_relative_eq!(p.arm_length, presets::trainer().arm_length);
    }

    #[test]
    fn validate_rejects_zero_mass() {
        let p = VehicleBuilder::new().mass(0.0).build();
        assert!(p.validate().is_err());
    }
}
