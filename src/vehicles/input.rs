//! Driver-input conditioning: reverse-as-brake gear logic, rise/fall-rate
//! smoothing and the steer-vs-forward-speed attenuation curve.

use crate::vehicles::GearState;

/// Forward speeds beyond this oppose an opposite-sign throttle hard enough
/// to lock the throttle out and force full brake.
pub const INVALID_DIRECTION_THRESHOLD: f32 = 80.0;
/// Below this absolute speed an idle throttle holds the vehicle with brakes.
pub const BRAKE_THRESHOLD: f32 = 8.0;
/// Digital ("key") input dead zone.
pub const DIGITAL_DEAD_ZONE: f32 = 0.1;

const ZERO_TOLERANCE: f32 = 1e-4;

/// Input channels in smoothing-table order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Channel {
    Accel = 0,
    Brake = 1,
    Handbrake = 2,
    SteerLeft = 3,
    SteerRight = 4,
}

/// Per-channel rise/fall rates, in input units per second.
#[derive(Copy, Clone, Debug)]
pub struct SmoothingRates {
    pub rise: [f32; 5],
    pub fall: [f32; 5],
}

/// Smoothing rates for analog "pad" input.
pub const PAD_SMOOTHING: SmoothingRates = SmoothingRates {
    rise: [6.0, 6.0, 12.0, 2.5, 2.5],
    fall: [10.0, 10.0, 12.0, 5.0, 5.0],
};

/// Smoothing rates for digital "key" input.
pub const KEY_SMOOTHING: SmoothingRates = SmoothingRates {
    rise: [3.0, 3.0, 10.0, 2.5, 2.5],
    fall: [5.0, 5.0, 10.0, 5.0, 5.0],
};

/// Steer multiplier keyed on forward speed, clamped beyond the last point.
pub const STEER_VS_FORWARD_SPEED: [(f32, f32); 4] =
    [(0.0, 1.0), (20.0, 0.9), (65.0, 0.8), (120.0, 0.7)];

/// Clamped piecewise-linear sample of `table` at `x`.
pub fn sample_table(table: &[(f32, f32)], x: f32) -> f32 {
    let first = table[0];
    if x <= first.0 {
        return first.1;
    }
    for pair in table.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            let t = (x - x0) / (x1 - x0);
            return y0 + (y1 - y0) * t;
        }
    }
    table[table.len() - 1].1
}

/// Steer attenuation at the given forward speed.
pub fn steer_attenuation(forward_speed: f32) -> f32 {
    sample_table(&STEER_VS_FORWARD_SPEED, forward_speed.abs())
}

/// Persistent per-vehicle smoothed channel values.
#[derive(Copy, Clone, Debug, Default)]
pub struct SmoothedControls {
    values: [f32; 5],
}

impl SmoothedControls {
    /// Moves every channel toward its target at the rise rate (increasing)
    /// or fall rate (decreasing), never overshooting.
    pub fn smooth(&mut self, rates: &SmoothingRates, targets: [f32; 5], dt: f32) {
        for (i, value) in self.values.iter_mut().enumerate() {
            let target = targets[i];
            if target > *value {
                *value = (*value + rates.rise[i] * dt).min(target);
            } else {
                *value = (*value - rates.fall[i] * dt).max(target);
            }
        }
    }

    /// Digital mode: raw inputs snap to 0/1 targets through the dead zone,
    /// then smooth with the key rates.
    pub fn smooth_digital(&mut self, rates: &SmoothingRates, raw: [f32; 5], dt: f32) {
        let mut targets = [0.0f32; 5];
        for (target, value) in targets.iter_mut().zip(raw) {
            *target = if value > DIGITAL_DEAD_ZONE { 1.0 } else { 0.0 };
        }
        self.smooth(rates, targets, dt);
    }

    pub fn channel(&self, channel: Channel) -> f32 {
        self.values[channel as usize]
    }

    pub fn accel(&self) -> f32 {
        self.values[Channel::Accel as usize]
    }

    pub fn brake(&self) -> f32 {
        self.values[Channel::Brake as usize]
    }

    pub fn handbrake(&self) -> f32 {
        self.values[Channel::Handbrake as usize]
    }

    /// Signed steer: right minus left.
    pub fn steer(&self) -> f32 {
        self.values[Channel::SteerRight as usize] - self.values[Channel::SteerLeft as usize]
    }
}

/// Splits a signed steer input into (left, right) channel targets.
pub fn split_steer(steering: f32) -> (f32, f32) {
    ((-steering).max(0.0), steering.max(0.0))
}

/// Effective throttle/brake after the reverse-as-brake policy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DriveDecision {
    /// Always non-negative; direction is carried by the gear.
    pub throttle: f32,
    pub brake: f32,
    /// Automatic gear change requested by the direction state machine.
    pub shift_gear: Option<i32>,
}

/// Reverse-as-brake state machine keyed on forward speed.
///
/// Without the policy, negative throttle is clamped off and the raw brake
/// passes through.
pub fn resolve_drive_input(
    throttle: f32,
    brake: f32,
    forward_speed: f32,
    gears: GearState,
    use_reverse_as_brake: bool,
) -> DriveDecision {
    if !use_reverse_as_brake {
        return DriveDecision {
            throttle: throttle.max(0.0),
            brake,
            shift_gear: None,
        };
    }

    let mut throttle = throttle;
    let mut brake = brake;
    let mut shift_gear = None;

    // Automatic gear change when changing driving direction
    if forward_speed.abs() < INVALID_DIRECTION_THRESHOLD {
        if throttle < -ZERO_TOLERANCE && gears.current >= 0 && gears.target >= 0 {
            shift_gear = Some(-1);
        } else if throttle > ZERO_TOLERANCE && gears.current <= 0 && gears.target <= 0 {
            shift_gear = Some(1);
        }
    }

    // Full brake while the driver's intent opposes current motion
    if throttle > 0.0 {
        if forward_speed < -INVALID_DIRECTION_THRESHOLD {
            brake = 1.0;
            throttle = 0.0;
        }
    } else if throttle < 0.0 {
        if forward_speed > INVALID_DIRECTION_THRESHOLD {
            brake = 1.0;
            throttle = 0.0;
        }
    } else if forward_speed.abs() < BRAKE_THRESHOLD {
        // Hold the vehicle in place while idle
        brake = 1.0;
    }

    // Block throttle while the gear change is still pending
    let target = shift_gear.unwrap_or(gears.target);
    if (throttle > 0.0 && target < 0) || (throttle < 0.0 && target > 0) {
        throttle = 0.0;
    }

    DriveDecision {
        throttle: throttle.abs(),
        brake,
        shift_gear,
    }
}
