//! Constant-acceleration step planner
//!
//! Generates STEP/DIR pulses with a trapezoidal speed profile. Step
//! intervals follow the recurrence from D. Austin, "Generate stepper-motor
//! speed profiles in real time" (2005):
//!
//! ```text
//! c0 = 0.676 * sqrt(2 / a)          first interval, from rest
//! cn = cn-1 - 2 * cn-1 / (4n + 1)    accelerating (n > 0) or braking (n < 0)
//! ```
//!
//! `n` counts steps into the current ramp; it goes negative while braking
//! so the same update slows the motor down. Intervals never drop below
//! `1 / max_speed`.
//!
//! The planner is polled: [`AccelStepper::run`] must be called at least as
//! often as the step rate, with a free-running microsecond timestamp.

use embedded_hal::delay::DelayNs;
use vmstep_core::traits::MotionPlanner;
use vmstep_hal::OutputPin;

/// STEP high time in microseconds
pub const STEP_PULSE_US: u32 = 2;

const MICROS_PER_SEC: f32 = 1_000_000.0;

/// Direction of travel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Decreasing position
    Negative,
    /// Increasing position
    Positive,
}

/// Trapezoidal step generator on a STEP/DIR interface
pub struct AccelStepper<STEP, DIR, D> {
    step_pin: STEP,
    dir_pin: DIR,
    delay: D,
    /// Invert the DIR output
    invert_dir: bool,
    position: i32,
    target: i32,
    /// Signed speed in steps/s
    speed: f32,
    max_speed: f32,
    accel: f32,
    /// Interval of the next step in µs, 0 when stopped
    step_interval: u32,
    last_step_us: u32,
    /// Step number within the current ramp
    n: i32,
    /// Initial interval in µs
    c0: f32,
    /// Current interval in µs
    cn: f32,
    /// Interval at max speed in µs
    cmin: f32,
    direction: Direction,
}

impl<STEP, DIR, D> AccelStepper<STEP, DIR, D>
where
    STEP: OutputPin,
    DIR: OutputPin,
    D: DelayNs,
{
    /// Create a stopped planner at position 0
    pub fn new(mut step_pin: STEP, dir_pin: DIR, delay: D, max_speed: u32, accel: u32) -> Self {
        step_pin.set_low();
        let mut stepper = Self {
            step_pin,
            dir_pin,
            delay,
            invert_dir: false,
            position: 0,
            target: 0,
            speed: 0.0,
            max_speed: 0.0,
            accel: 0.0,
            step_interval: 0,
            last_step_us: 0,
            n: 0,
            c0: 0.0,
            cn: 0.0,
            cmin: 1.0,
            direction: Direction::Positive,
        };
        stepper.set_max_speed(max_speed);
        stepper.set_acceleration(accel);
        stepper
    }

    /// Invert the DIR output
    pub fn with_inverted_direction(mut self, invert: bool) -> Self {
        self.invert_dir = invert;
        self
    }

    /// Signed speed in steps/s
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Target position in steps
    pub fn target_position(&self) -> i32 {
        self.target
    }

    /// Interval until the next step in µs (0 when stopped)
    pub fn step_interval(&self) -> u32 {
        self.step_interval
    }

    /// Direction of the current ramp
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Poll the planner
    ///
    /// Steps at most once. Returns `true` while the motor is still moving
    /// or has distance to go.
    pub fn run(&mut self, now_us: u32) -> bool {
        if self.run_speed(now_us) {
            self.compute_new_speed();
        }
        self.speed != 0.0 || self.distance_to_go() != 0
    }

    /// Set the speed ceiling in steps/s
    pub fn set_max_speed(&mut self, max_speed: u32) {
        let max_speed = max_speed.max(1) as f32;
        if self.max_speed != max_speed {
            self.max_speed = max_speed;
            self.cmin = MICROS_PER_SEC / max_speed;
            // Slowing the ceiling while cruising starts a braking ramp
            if self.n > 0 {
                self.n = self.steps_to_stop();
                self.compute_new_speed();
            }
        }
    }

    /// Set the acceleration in steps/s²
    ///
    /// Zero is ignored.
    pub fn set_acceleration(&mut self, accel: u32) {
        if accel == 0 {
            return;
        }
        let accel = accel as f32;
        if self.accel != accel {
            if self.accel != 0.0 {
                // Rescale the ramp position to the new slope
                self.n = (self.n as f32 * (self.accel / accel)) as i32;
            }
            self.c0 = initial_interval_us(accel as u32);
            self.accel = accel;
            self.compute_new_speed();
        }
    }

    /// Steps needed to brake from the current speed
    fn steps_to_stop(&self) -> i32 {
        ((self.speed * self.speed) / (2.0 * self.accel)) as i32
    }

    /// Take one step if the interval has elapsed
    fn run_speed(&mut self, now_us: u32) -> bool {
        if self.step_interval == 0 {
            return false;
        }
        if now_us.wrapping_sub(self.last_step_us) < self.step_interval {
            return false;
        }
        match self.direction {
            Direction::Positive => self.position = self.position.wrapping_add(1),
            Direction::Negative => self.position = self.position.wrapping_sub(1),
        }
        self.pulse();
        self.last_step_us = now_us;
        true
    }

    /// Recompute the interval for the next step
    fn compute_new_speed(&mut self) {
        let distance = self.distance_to_go();
        let steps_to_stop = self.steps_to_stop();

        if distance == 0 && steps_to_stop <= 1 {
            self.step_interval = 0;
            self.speed = 0.0;
            self.n = 0;
            return;
        }

        let remaining = distance.unsigned_abs();
        let braking = steps_to_stop.unsigned_abs();
        let heading = if distance > 0 {
            Direction::Positive
        } else {
            Direction::Negative
        };

        if distance != 0 {
            if self.n > 0 {
                // Brake if we would overshoot, or we are heading the wrong way
                if braking >= remaining || self.direction != heading {
                    self.n = -steps_to_stop;
                }
            } else if self.n < 0 && braking < remaining && self.direction == heading {
                self.n = -self.n;
            }
        }

        if self.n == 0 {
            self.cn = self.c0;
            self.direction = heading;
        } else {
            self.cn -= (2.0 * self.cn) / ((4 * self.n + 1) as f32);
            if self.cn < self.cmin {
                self.cn = self.cmin;
            }
        }
        self.n += 1;
        self.step_interval = self.cn as u32;
        self.speed = MICROS_PER_SEC / self.cn;
        if self.direction == Direction::Negative {
            self.speed = -self.speed;
        }
    }

    fn pulse(&mut self) {
        let forward = self.direction == Direction::Positive;
        self.dir_pin.set_state(forward != self.invert_dir);
        self.step_pin.set_high();
        self.delay.delay_us(STEP_PULSE_US);
        self.step_pin.set_low();
    }
}

impl<STEP, DIR, D> MotionPlanner for AccelStepper<STEP, DIR, D>
where
    STEP: OutputPin,
    DIR: OutputPin,
    D: DelayNs,
{
    fn move_to(&mut self, target: i32) {
        if self.target != target {
            self.target = target;
            self.compute_new_speed();
        }
    }

    fn stop(&mut self) {
        if self.speed != 0.0 {
            let steps = self.steps_to_stop() + 1;
            let target = if self.speed > 0.0 {
                self.position.saturating_add(steps)
            } else {
                self.position.saturating_sub(steps)
            };
            self.move_to(target);
        }
    }

    fn hard_stop(&mut self) {
        self.target = self.position;
        self.speed = 0.0;
        self.n = 0;
        self.step_interval = 0;
    }

    fn current_position(&self) -> i32 {
        self.position
    }

    fn set_current_position(&mut self, position: i32) {
        self.position = position;
        self.hard_stop();
    }

    /// Saturates at the i32 range so far targets keep their sign
    fn distance_to_go(&self) -> i32 {
        self.target.saturating_sub(self.position)
    }

    fn set_speed_limits(&mut self, max_speed: u32, accel: u32) {
        self.set_max_speed(max_speed);
        self.set_acceleration(accel);
    }

    fn is_moving(&self) -> bool {
        self.speed != 0.0 || self.distance_to_go() != 0
    }
}

/// First step interval from rest in µs: `0.676 * sqrt(2 / a) * 1e6`
fn initial_interval_us(accel: u32) -> f32 {
    0.676 * isqrt(2_000_000_000_000 / accel.max(1) as u64) as f32
}

/// Integer square root (floor)
fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}
