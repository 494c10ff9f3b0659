//! Motion planner trait
//!
//! The planner owns step timing and the position counter. The controller
//! only issues targets and polls for completion; it never generates steps
//! itself.

/// Trait for step generators with acceleration limiting
///
/// Positions are absolute step counts relative to the last zeroing.
pub trait MotionPlanner {
    /// Start a move to an absolute position
    ///
    /// Replaces any target already in progress.
    fn move_to(&mut self, target: i32);

    /// Decelerate to a stop at the configured acceleration
    ///
    /// The planner keeps running until the deceleration ends, so
    /// `distance_to_go()` stays non-zero for a while after this call.
    fn stop(&mut self);

    /// Stop immediately without deceleration
    fn hard_stop(&mut self);

    /// Current absolute position in steps
    fn current_position(&self) -> i32;

    /// Redefine the current position without moving
    ///
    /// Also clears any remaining distance.
    fn set_current_position(&mut self, position: i32);

    /// Remaining steps to the target (signed)
    fn distance_to_go(&self) -> i32;

    /// Set the speed ceiling (steps/s) and acceleration (steps/s²)
    fn set_speed_limits(&mut self, max_speed: u32, accel: u32);

    /// Check if a move is in progress
    fn is_moving(&self) -> bool {
        self.distance_to_go() != 0
    }
}
