//! Asynchronous step dispatch with optional fixed-size substepping.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use rayon::ThreadPool;
use serde::Deserialize;

use crate::backend::SimulationWorld;

/// Deltas below this are too small to simulate; the step is skipped.
pub const MIN_SIMULATION_DELTA: f32 = 1e-5;

/// Temporary memory block size used by the backend during a step.
/// Must be a multiple of 4 KiB.
pub const SCRATCH_BLOCK_SIZE: usize = 1024 * 128;

/// What happens to the frame-delta remainder once the full substeps are cut.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub enum RemainderPolicy {
    /// Append the remainder as a final partial substep.
    #[default]
    Absorb,
    /// Discard the remainder.
    Drop,
}

#[derive(Copy, Clone, Debug)]
enum StepMode {
    Fixed(f32),
    Substeps {
        sub_dt: f32,
        max_substeps: u32,
        remainder: RemainderPolicy,
    },
}

/// Deterministically splits a frame delta into at most `max_substeps` full
/// substeps of `sub_dt`, with the remainder handled per `remainder`.
pub fn substep_schedule(
    dt: f32,
    sub_dt: f32,
    max_substeps: u32,
    remainder: RemainderPolicy,
) -> Vec<f32> {
    if dt < MIN_SIMULATION_DELTA || sub_dt < MIN_SIMULATION_DELTA {
        return Vec::new();
    }
    let full = ((dt / sub_dt).floor() as u32).min(max_substeps);
    let mut steps = vec![sub_dt; full as usize];
    if full < max_substeps {
        let rest = dt - full as f32 * sub_dt;
        if rest >= MIN_SIMULATION_DELTA && remainder == RemainderPolicy::Absorb {
            steps.push(rest);
        }
    }
    steps
}

/// Wraps one simulation step, optionally split into fixed substeps.
///
/// `advance` dispatches the step(s) onto the worker pool and returns
/// immediately; `wait` blocks the owning thread until they finish. Once
/// dispatched a step always runs to completion.
pub struct FixedStepper {
    mode: StepMode,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
    in_flight: bool,
    frame_consumed: bool,
}

impl FixedStepper {
    pub fn new() -> Self {
        let (done_tx, done_rx) = bounded(1);
        Self {
            mode: StepMode::Fixed(0.0),
            done_tx,
            done_rx,
            in_flight: false,
            frame_consumed: true,
        }
    }

    /// Configures a single fixed step of `dt`.
    pub fn setup_fixed(&mut self, dt: f32) {
        self.mode = StepMode::Fixed(dt);
    }

    /// Configures substep mode.
    pub fn setup_substeps(&mut self, sub_dt: f32, max_substeps: u32, remainder: RemainderPolicy) {
        self.mode = StepMode::Substeps {
            sub_dt,
            max_substeps,
            remainder,
        };
    }

    /// Begins the step(s) asynchronously. Returns `false` without effect when
    /// `dt` is too small to simulate.
    pub fn advance(
        &mut self,
        world: &Arc<dyn SimulationWorld>,
        dt: f32,
        scratch: &Arc<Mutex<Vec<u8>>>,
        pool: &ThreadPool,
    ) -> bool {
        debug_assert!(!self.in_flight, "step already dispatched");
        debug_assert!(self.frame_consumed, "previous frame results not consumed");
        let schedule = match self.mode {
            StepMode::Fixed(step_dt) => {
                let step_dt = step_dt.min(dt);
                if step_dt < MIN_SIMULATION_DELTA {
                    return false;
                }
                vec![step_dt]
            }
            StepMode::Substeps {
                sub_dt,
                max_substeps,
                remainder,
            } => substep_schedule(dt, sub_dt, max_substeps, remainder),
        };
        if schedule.is_empty() {
            return false;
        }

        let world = Arc::clone(world);
        let scratch = Arc::clone(scratch);
        let done = self.done_tx.clone();
        self.in_flight = true;
        self.frame_consumed = false;
        pool.spawn(move || {
            let mut scratch = scratch.lock();
            for step_dt in schedule {
                world.step(step_dt, &mut scratch);
            }
            drop(scratch);
            let _ = done.send(());
        });
        true
    }

    /// Blocks until all dispatched steps finish.
    pub fn wait(&mut self) {
        if !self.in_flight {
            return;
        }
        let _ = self.done_rx.recv();
        self.in_flight = false;
    }

    /// Signals that consumers finished reading the previous frame's results,
    /// permitting a pipelined next step.
    pub fn render_done(&mut self) {
        self.frame_consumed = true;
    }
}

impl Default for FixedStepper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_splits_and_absorbs_remainder() {
        let steps = substep_schedule(0.05, 0.02, 4, RemainderPolicy::Absorb);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0], 0.02);
        assert_eq!(steps[1], 0.02);
        assert!((steps[2] - 0.01).abs() < 1e-6);
        // Identical inputs reproduce the identical schedule
        assert_eq!(steps, substep_schedule(0.05, 0.02, 4, RemainderPolicy::Absorb));
    }

    #[test]
    fn schedule_drops_remainder_when_configured() {
        let steps = substep_schedule(0.05, 0.02, 4, RemainderPolicy::Drop);
        assert_eq!(steps, vec![0.02, 0.02]);
    }

    #[test]
    fn schedule_caps_at_max_substeps() {
        let steps = substep_schedule(0.5, 0.02, 4, RemainderPolicy::Absorb);
        assert_eq!(steps, vec![0.02; 4]);
    }

    #[test]
    fn schedule_rejects_degenerate_deltas() {
        assert!(substep_schedule(0.0, 0.02, 4, RemainderPolicy::Absorb).is_empty());
        assert!(substep_schedule(1e-6, 0.02, 4, RemainderPolicy::Absorb).is_empty());
        assert!(substep_schedule(0.05, 0.0, 4, RemainderPolicy::Absorb).is_empty());
    }
}
