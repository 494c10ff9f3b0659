//! Command dispatcher
//!
//! Owns the controller state and the settings record. Each ready frame is
//! handled exactly once by [`Dispatcher::handle`]; asynchronous reports
//! (DONE, latched faults) come out of [`Dispatcher::service`].
//!
//! Gating order for every frame:
//! 1. unknown code → FAULT(NACK)
//! 2. faulted and not on the allow-list → FAULT(NACK), no side effect
//! 3. wrong argument length or sub-code → FAULT(INVALID_PARAMETERS)
//! 4. state precondition not met → FAULT(NACK)

use embedded_hal::delay::DelayNs;
use vmstep_protocol::{
    Command, FaultCode, Frame, ProtocolError, QueryKind, Reply, ReplyCode, Request, SETTINGS_LEN,
};

use super::identity::DeviceInfo;
use crate::safety::HardwareFault;
use crate::settings::{validate, verify_applied, Retry, Settings};
use crate::state::{ControllerState, Event};
use crate::traits::{DriverChip, MotionPlanner, SwitchInputs};

/// Distance commanded by HOME before giving up on the home switch
pub const HOMING_TRAVEL_STEPS: i32 = 1_000_000;

/// Command dispatcher and controller state owner
pub struct Dispatcher<M, D, S, W> {
    motion: M,
    driver: D,
    switches: S,
    delay: W,
    state: ControllerState,
    settings: Settings,
    identity: DeviceInfo,
    retry: Retry,
    homing_travel: i32,
    /// The latched fault has been sent to the host
    fault_reported: bool,
    /// Driver is running at the sleep current
    asleep: bool,
    /// Start of the current idle period
    idle_since_ms: Option<u32>,
}

impl<M, D, S, W> Dispatcher<M, D, S, W>
where
    M: MotionPlanner,
    D: DriverChip,
    S: SwitchInputs,
    W: DelayNs,
{
    /// Create a dispatcher in the Idle state with default settings
    pub fn new(motion: M, driver: D, switches: S, delay: W) -> Self {
        Self {
            motion,
            driver,
            switches,
            delay,
            state: ControllerState::Idle,
            settings: Settings::default(),
            identity: DeviceInfo::VMSTEP,
            retry: Retry::VERIFY,
            homing_travel: HOMING_TRAVEL_STEPS,
            fault_reported: false,
            asleep: false,
            idle_since_ms: None,
        }
    }

    /// Override the identity strings
    pub fn with_identity(mut self, identity: DeviceInfo) -> Self {
        self.identity = identity;
        self
    }

    /// Override the verification retry policy
    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// Override the homing travel distance
    pub fn with_homing_travel(mut self, steps: i32) -> Self {
        self.homing_travel = steps.max(1);
        self
    }

    /// Bring the driver up and push the current settings
    ///
    /// Call once after power-up: clears latched driver faults, applies the
    /// settings and energizes the outputs. On failure the controller
    /// latches DRIVER_SYNC.
    pub fn init(&mut self) -> Result<(), HardwareFault> {
        let ready = self.driver.clear_faults().is_ok()
            && self.apply_settings()
            && self.driver.enable().is_ok();
        if ready {
            Ok(())
        } else {
            self.latch(HardwareFault::DriverSync);
            Err(HardwareFault::DriverSync)
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Driver is running at the reduced idle current
    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    pub fn motion(&self) -> &M {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut M {
        &mut self.motion
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn switches_mut(&mut self) -> &mut S {
        &mut self.switches
    }

    /// Handle one decoded frame and produce its reply
    pub fn handle(&mut self, frame: &Frame) -> Reply {
        match self.gate(frame) {
            Ok(request) => self.execute(request),
            Err(e) => Reply::fault(e.fault_code()),
        }
    }

    fn gate(&self, frame: &Frame) -> Result<Request, ProtocolError> {
        let command = Command::from_byte(frame.code()).ok_or(ProtocolError::UnknownCommand)?;

        if self.state.is_faulted() && !command.allowed_while_faulted() {
            return Err(ProtocolError::IllegalInState);
        }

        let request = Request::decode(command, frame.payload())?;

        if !self.state.permits(command) {
            return Err(ProtocolError::IllegalInState);
        }

        Ok(request)
    }

    fn execute(&mut self, request: Request) -> Reply {
        match request {
            Request::Goto { target } => self.goto(target),
            Request::Stop => self.stop(),
            Request::Home { toward_positive } => self.home(toward_positive),
            Request::Reset => self.reset(),
            Request::Query(kind) => self.query(kind),
            Request::UpdateParameters(raw) => self.update_parameters(&raw),
            Request::Echo(payload) => Reply::new(ReplyCode::Echo, &payload)
                .unwrap_or_else(|_| Reply::fault(FaultCode::InvalidParameters)),
            Request::Enable => self.enable(),
            Request::Disable => self.disable(),
            Request::ResetPosition => {
                self.motion.set_current_position(0);
                Reply::ack()
            }
        }
    }

    fn goto(&mut self, target: i32) -> Reply {
        if !self.wake() {
            return self.reply_latched(HardwareFault::DriverSync);
        }
        self.motion.move_to(target);
        self.transition(Event::MoveStarted);
        Reply::ack()
    }

    fn home(&mut self, toward_positive: bool) -> Reply {
        if !self.settings.flags().enable_home {
            // Rejected without latching
            return Reply::fault(FaultCode::Home);
        }
        if !self.wake() {
            return self.reply_latched(HardwareFault::DriverSync);
        }

        let position = self.motion.current_position();
        let target = if toward_positive {
            position.saturating_add(self.homing_travel)
        } else {
            position.saturating_sub(self.homing_travel)
        };
        self.motion.move_to(target);
        self.transition(Event::HomingStarted);
        Reply::ack()
    }

    /// The planner brakes on its own after the state drops to Idle
    fn stop(&mut self) -> Reply {
        if self.state.in_motion() {
            self.motion.stop();
        }
        self.transition(Event::Stop);
        Reply::ack()
    }

    fn reset(&mut self) -> Reply {
        let cleared = self.driver.clear_faults().is_ok()
            && matches!(self.driver.fault_active(), Ok(false));

        match self.state.fault() {
            Some(_) if cleared => {
                // A fault can shut the bridge off; Idle needs it energized
                if self.driver.enable().is_err() {
                    return Reply::fault(FaultCode::DriverSync);
                }
                self.transition(Event::FaultsCleared);
                self.fault_reported = false;
                Reply::ack()
            }
            Some(kind) => Reply::fault(kind.fault_code()),
            None if cleared => Reply::ack(),
            None => Reply::fault(FaultCode::Driver),
        }
    }

    fn query(&mut self, kind: QueryKind) -> Reply {
        match kind {
            QueryKind::ModelNo => self.text_reply(self.identity.model),
            QueryKind::SerialNo => self.text_reply(self.identity.serial),
            QueryKind::Firmware => self.text_reply(self.identity.firmware),
            QueryKind::Parameters => self.data_reply(&self.settings.to_bytes()),
            QueryKind::Faults => match self.state.fault() {
                None => Reply::ack(),
                Some(kind) => {
                    self.fault_reported = true;
                    self.fault_reply(kind)
                }
            },
            QueryKind::Position => self.data_reply(&self.motion.current_position().to_le_bytes()),
            QueryKind::Mode => Reply::byte(ReplyCode::Ack, self.state.device_mode().to_byte()),
            QueryKind::FaultRegs => match self.driver.read_fault_registers() {
                Ok(regs) => self.data_reply(&regs.to_bytes()),
                Err(_) => Reply::fault(FaultCode::Driver),
            },
        }
    }

    fn update_parameters(&mut self, raw: &[u8; SETTINGS_LEN]) -> Reply {
        let settings = match validate(raw) {
            Ok(settings) => settings,
            Err(_) => return Reply::fault(FaultCode::InvalidParameters),
        };

        let previous = core::mem::replace(&mut self.settings, settings);
        if self.apply_settings() {
            Reply::ack()
        } else {
            // Keep reporting the last record the driver confirmed
            self.settings = previous;
            self.reply_latched(HardwareFault::DriverSync)
        }
    }

    fn enable(&mut self) -> Reply {
        if self.driver.enable().is_err() {
            return self.reply_latched(HardwareFault::DriverSync);
        }
        self.transition(Event::Enable);
        Reply::ack()
    }

    fn disable(&mut self) -> Reply {
        self.motion.hard_stop();
        self.transition(Event::Disable);
        if self.driver.disable().is_err() {
            return self.reply_latched(HardwareFault::DriverSync);
        }
        Reply::ack()
    }

    /// Poll the collaborators for asynchronous events
    ///
    /// Returns at most one unsolicited reply; call once per loop iteration.
    pub fn service(&mut self, now_ms: u32) -> Option<Reply> {
        if !self.state.is_faulted() && matches!(self.driver.fault_active(), Ok(true)) {
            self.latch(HardwareFault::Driver);
        }

        if let Some(kind) = self.state.fault() {
            if self.fault_reported {
                return None;
            }
            self.fault_reported = true;
            return Some(self.fault_reply(kind));
        }

        if self.state.in_motion() {
            if let Some(reply) = self.check_switches() {
                return Some(reply);
            }
            if !self.motion.is_moving() {
                return Some(self.motion_finished());
            }
            return None;
        }

        self.idle_current(now_ms);
        None
    }

    fn check_switches(&mut self) -> Option<Reply> {
        let flags = self.settings.flags();
        let levels = self.switches.sample();

        if flags.enable_limit1 && flags.limit1_level().is_active(levels.limit1_high) {
            return Some(self.reply_latched(HardwareFault::Limit1));
        }
        if flags.enable_limit2 && flags.limit2_level().is_active(levels.limit2_high) {
            return Some(self.reply_latched(HardwareFault::Limit2));
        }

        if self.state == ControllerState::Homing
            && flags.enable_home
            && flags.home_level().is_active(levels.home_high)
        {
            self.motion.hard_stop();
            self.motion.set_current_position(0);
            self.transition(Event::MotionComplete);
            return Some(Reply::done(0));
        }

        None
    }

    fn motion_finished(&mut self) -> Reply {
        if self.state == ControllerState::Homing {
            // Ran out of travel without seeing the home switch
            return self.reply_latched(HardwareFault::Home);
        }
        self.transition(Event::MotionComplete);
        Reply::done(self.motion.current_position())
    }

    fn idle_current(&mut self, now_ms: u32) {
        if self.state != ControllerState::Idle || self.asleep {
            return;
        }
        if self.motion.is_moving() {
            // Still braking after STOP
            self.idle_since_ms = None;
            return;
        }
        let Some(timeout_ms) = self.settings.sleep_timeout_ms() else {
            return;
        };

        let since = *self.idle_since_ms.get_or_insert(now_ms);
        if now_ms.wrapping_sub(since) >= timeout_ms
            && self.driver.set_current(self.settings.sleep_current()).is_ok()
        {
            self.asleep = true;
        }
    }

    /// Restore the run current before motion
    fn wake(&mut self) -> bool {
        if self.asleep {
            if self.driver.set_current(self.settings.run_current()).is_err() {
                return false;
            }
            self.asleep = false;
        }
        true
    }

    fn apply_settings(&mut self) -> bool {
        let level = if self.asleep {
            self.settings.sleep_current()
        } else {
            self.settings.run_current()
        };

        if self.driver.set_current(level).is_err()
            || self.driver.set_microstep(self.settings.microstep()).is_err()
        {
            return false;
        }
        self.motion
            .set_speed_limits(self.settings.top_speed(), self.settings.acceleration());

        verify_applied(&mut self.driver, &mut self.delay, self.retry)
    }

    fn transition(&mut self, event: Event) {
        let next = self.state.transition(event);
        if next.in_motion() || next != self.state {
            self.idle_since_ms = None;
        }
        self.state = next;
    }

    /// Enter Faulted, stopping motion first
    fn latch(&mut self, kind: HardwareFault) {
        if self.state.is_faulted() {
            return;
        }
        self.motion.hard_stop();
        self.transition(Event::FaultDetected(kind));
        self.fault_reported = false;
    }

    /// Latch a fault and report it in the current reply
    fn reply_latched(&mut self, kind: HardwareFault) -> Reply {
        self.latch(kind);
        self.fault_reported = true;
        let latched = self.state.fault().unwrap_or(kind);
        self.fault_reply(latched)
    }

    fn fault_reply(&mut self, kind: HardwareFault) -> Reply {
        match kind {
            HardwareFault::Driver => match self.driver.read_fault_registers() {
                Ok(regs) => Reply::driver_fault(regs.to_bytes()),
                Err(_) => Reply::fault(FaultCode::Driver),
            },
            other => Reply::fault(other.fault_code()),
        }
    }

    fn text_reply(&self, text: &str) -> Reply {
        Reply::text(ReplyCode::Ack, text).unwrap_or_else(|_| Reply::fault(FaultCode::Nack))
    }

    fn data_reply(&self, data: &[u8]) -> Reply {
        Reply::new(ReplyCode::Ack, data).unwrap_or_else(|_| Reply::fault(FaultCode::Nack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::FaultRegisters;
    use crate::traits::SwitchLevels;
    use vmstep_protocol::DeviceMode;

    /// Planner that completes moves only when told to
    #[derive(Default)]
    struct FakeMotion {
        position: i32,
        target: i32,
        moves: u32,
        stops: u32,
        hard_stops: u32,
        limits: Option<(u32, u32)>,
    }

    impl FakeMotion {
        fn arrive(&mut self) {
            self.position = self.target;
        }
    }

    impl MotionPlanner for FakeMotion {
        fn move_to(&mut self, target: i32) {
            self.target = target;
            self.moves += 1;
        }
        fn stop(&mut self) {
            self.stops += 1;
        }
        fn hard_stop(&mut self) {
            self.target = self.position;
            self.hard_stops += 1;
        }
        fn current_position(&self) -> i32 {
            self.position
        }
        fn set_current_position(&mut self, position: i32) {
            self.position = position;
            self.target = position;
        }
        fn distance_to_go(&self) -> i32 {
            self.target - self.position
        }
        fn set_speed_limits(&mut self, max_speed: u32, accel: u32) {
            self.limits = Some((max_speed, accel));
        }
    }

    #[derive(Default)]
    struct FakeDriver {
        regs: FaultRegisters,
        enabled: bool,
        current: Option<u8>,
        microstep: Option<u8>,
        clear_calls: u32,
        clear_works: bool,
        commit_after: Option<u32>,
        verify_calls: u32,
        bus_down: bool,
        enable_fails: bool,
    }

    impl FakeDriver {
        fn healthy() -> Self {
            Self {
                clear_works: true,
                commit_after: Some(0),
                ..Self::default()
            }
        }

        fn check_bus(&self) -> Result<(), ()> {
            if self.bus_down {
                Err(())
            } else {
                Ok(())
            }
        }
    }

    impl DriverChip for FakeDriver {
        type Error = ();

        fn enable(&mut self) -> Result<(), ()> {
            self.check_bus()?;
            if self.enable_fails {
                return Err(());
            }
            self.enabled = true;
            Ok(())
        }
        fn disable(&mut self) -> Result<(), ()> {
            self.check_bus()?;
            self.enabled = false;
            Ok(())
        }
        fn set_current(&mut self, level: u8) -> Result<(), ()> {
            self.check_bus()?;
            self.current = Some(level);
            Ok(())
        }
        fn set_microstep(&mut self, mode: u8) -> Result<(), ()> {
            self.check_bus()?;
            self.microstep = Some(mode);
            Ok(())
        }
        fn clear_faults(&mut self) -> Result<(), ()> {
            self.check_bus()?;
            self.clear_calls += 1;
            if self.clear_works {
                self.regs = FaultRegisters::default();
            }
            Ok(())
        }
        fn read_fault(&mut self) -> Result<u8, ()> {
            self.check_bus()?;
            Ok(self.regs.fault)
        }
        fn read_diag1(&mut self) -> Result<u8, ()> {
            self.check_bus()?;
            Ok(self.regs.diag1)
        }
        fn read_diag2(&mut self) -> Result<u8, ()> {
            self.check_bus()?;
            Ok(self.regs.diag2)
        }
        fn verify_settings_committed(&mut self) -> Result<bool, ()> {
            self.check_bus()?;
            let attempt = self.verify_calls;
            self.verify_calls += 1;
            Ok(self.commit_after.is_some_and(|n| attempt >= n))
        }
    }

    #[derive(Default)]
    struct FakeSwitches {
        levels: SwitchLevels,
    }

    impl SwitchInputs for FakeSwitches {
        fn sample(&mut self) -> SwitchLevels {
            self.levels
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    type TestDispatcher = Dispatcher<FakeMotion, FakeDriver, FakeSwitches, NoDelay>;

    fn dispatcher() -> TestDispatcher {
        Dispatcher::new(
            FakeMotion::default(),
            FakeDriver::healthy(),
            FakeSwitches::default(),
            NoDelay,
        )
    }

    fn frame(code: u8, payload: &[u8]) -> Frame {
        Frame::new(code, payload).unwrap()
    }

    fn goto(target: i32) -> Frame {
        frame(b'G', &target.to_le_bytes())
    }

    fn settings_frame(settings: &Settings) -> Frame {
        frame(b'P', &settings.to_bytes())
    }

    fn latch_driver_fault(d: &mut TestDispatcher) {
        d.driver_mut().regs = FaultRegisters {
            fault: 0x88,
            diag1: 0x01,
            diag2: 0x00,
        };
        let report = d.service(0).unwrap();
        assert_eq!(report.fault_code(), Some(FaultCode::Driver));
    }

    #[test]
    fn test_goto_from_idle() {
        let mut d = dispatcher();
        let reply = d.handle(&frame(b'G', &[0x64, 0x00, 0x00, 0x00]));

        assert_eq!(reply, Reply::ack());
        assert_eq!(d.state(), ControllerState::Moving);
        assert_eq!(d.motion().target, 100);

        // Still travelling
        assert_eq!(d.service(0), None);

        d.motion_mut().arrive();
        assert_eq!(d.service(0), Some(Reply::done(100)));
        assert_eq!(d.state(), ControllerState::Idle);
    }

    #[test]
    fn test_unknown_command() {
        let mut d = dispatcher();
        assert_eq!(d.handle(&frame(b'?', &[])), Reply::fault(FaultCode::Nack));
        assert_eq!(d.state(), ControllerState::Idle);
    }

    #[test]
    fn test_wrong_argument_length_touches_nothing() {
        let mut d = dispatcher();
        let reply = d.handle(&frame(b'G', &[1, 2]));
        assert_eq!(reply, Reply::fault(FaultCode::InvalidParameters));
        assert_eq!(d.motion().moves, 0);
        assert_eq!(d.state(), ControllerState::Idle);
    }

    #[test]
    fn test_faulted_rejects_goto_without_side_effects() {
        let mut d = dispatcher();
        latch_driver_fault(&mut d);
        assert_eq!(d.motion().hard_stops, 1);

        let reply = d.handle(&goto(500));
        assert_eq!(reply, Reply::fault(FaultCode::Nack));
        assert_eq!(d.motion().moves, 0);
        assert!(d.state().is_faulted());

        // Allow-list is checked before argument length
        assert_eq!(
            d.handle(&frame(b'G', &[])),
            Reply::fault(FaultCode::Nack)
        );
        for code in [b'S', b'Y', b'X', b'Z', b'H'] {
            assert_eq!(d.handle(&frame(code, &[])), Reply::fault(FaultCode::Nack));
        }
    }

    #[test]
    fn test_reset_clears_fault() {
        let mut d = dispatcher();
        latch_driver_fault(&mut d);

        assert_eq!(d.handle(&frame(b'R', &[])), Reply::ack());
        assert_eq!(d.state(), ControllerState::Idle);
        assert_eq!(d.driver().clear_calls, 1);
        assert_eq!(d.service(0), None);
    }

    #[test]
    fn test_reset_that_fails_stays_faulted() {
        let mut d = dispatcher();
        latch_driver_fault(&mut d);
        d.driver_mut().clear_works = false;

        let reply = d.handle(&frame(b'R', &[]));
        assert_eq!(reply.fault_code(), Some(FaultCode::Driver));
        assert!(d.state().is_faulted());
    }

    #[test]
    fn test_reset_after_disable_energizes_outputs() {
        let mut d = dispatcher();
        d.init().unwrap();
        assert_eq!(d.handle(&frame(b'X', &[])), Reply::ack());
        assert!(!d.driver().enabled);
        latch_driver_fault(&mut d);

        assert_eq!(d.handle(&frame(b'R', &[])), Reply::ack());
        assert_eq!(d.state(), ControllerState::Idle);
        assert!(d.driver().enabled);
        assert_eq!(d.handle(&goto(50)), Reply::ack());
    }

    #[test]
    fn test_reset_that_cannot_enable_stays_faulted() {
        let mut d = dispatcher();
        latch_driver_fault(&mut d);
        d.driver_mut().enable_fails = true;

        let reply = d.handle(&frame(b'R', &[]));
        assert_eq!(reply, Reply::fault(FaultCode::DriverSync));
        assert!(d.state().is_faulted());
        assert_eq!(d.handle(&goto(50)), Reply::fault(FaultCode::Nack));
    }

    #[test]
    fn test_reset_when_not_faulted() {
        let mut d = dispatcher();
        assert_eq!(d.handle(&frame(b'R', &[])), Reply::ack());
        assert_eq!(d.state(), ControllerState::Idle);
    }

    #[test]
    fn test_query_faults() {
        let mut d = dispatcher();
        assert_eq!(d.handle(&frame(b'Q', b"F")), Reply::ack());

        latch_driver_fault(&mut d);
        let reply = d.handle(&frame(b'Q', b"F"));
        assert_eq!(reply.code(), ReplyCode::Fault);
        assert_eq!(reply.payload(), &[b'D', 0x88, 0x01, 0x00]);
    }

    #[test]
    fn test_query_fault_registers_are_fresh() {
        let mut d = dispatcher();
        d.driver_mut().regs.diag2 = 0x40;
        assert_eq!(d.handle(&frame(b'Q', b"R")).payload(), &[0, 0, 0x40]);

        d.driver_mut().regs.diag2 = 0x00;
        assert_eq!(d.handle(&frame(b'Q', b"R")).payload(), &[0, 0, 0]);
    }

    #[test]
    fn test_query_identity_and_state() {
        let mut d = dispatcher();
        assert_eq!(d.handle(&frame(b'Q', b"M")).payload(), b"VMSTEP");
        assert_eq!(d.handle(&frame(b'Q', b"S")).payload(), b"2024_01.02");
        assert_eq!(d.handle(&frame(b'Q', b"W")).payload(), b"00.02");
        assert_eq!(
            d.handle(&frame(b'Q', b"P")).payload(),
            &Settings::default().to_bytes()
        );

        d.motion_mut().set_current_position(-42);
        assert_eq!(
            d.handle(&frame(b'Q', b"X")).payload(),
            &(-42i32).to_le_bytes()
        );

        d.handle(&goto(10));
        assert_eq!(
            d.handle(&frame(b'Q', b"T")).payload(),
            &[DeviceMode::Moving.to_byte()]
        );
    }

    #[test]
    fn test_query_unknown_sub_code() {
        let mut d = dispatcher();
        assert_eq!(
            d.handle(&frame(b'Q', b"?")),
            Reply::fault(FaultCode::InvalidParameters)
        );
    }

    #[test]
    fn test_echo() {
        let mut d = dispatcher();
        let reply = d.handle(&frame(b'E', b"ping"));
        assert_eq!(reply.code(), ReplyCode::Echo);
        assert_eq!(reply.payload(), b"ping");
    }

    #[test]
    fn test_update_parameters_applies_and_verifies() {
        let mut d = dispatcher();
        let mut settings = Settings::default();
        settings.set_run_current(9).unwrap();
        settings.set_microstep(0b1000).unwrap();
        settings.set_top_speed(5000).unwrap();

        assert_eq!(d.handle(&settings_frame(&settings)), Reply::ack());
        assert_eq!(d.settings(), &settings);
        assert_eq!(d.driver().current, Some(9));
        assert_eq!(d.driver().microstep, Some(0b1000));
        assert_eq!(d.motion().limits, Some((5000, 4000)));
        assert_eq!(d.driver().verify_calls, 1);
    }

    #[test]
    fn test_update_parameters_rejects_whole_record() {
        let mut d = dispatcher();
        let mut raw = Settings::default().to_bytes();
        raw[0] = 0x55;
        raw[1] = 0x0C;

        let reply = d.handle(&frame(b'P', &raw));
        assert_eq!(reply, Reply::fault(FaultCode::InvalidParameters));
        assert_eq!(d.settings(), &Settings::default());
        assert_eq!(d.driver().current, None);
    }

    #[test]
    fn test_update_parameters_not_while_moving() {
        let mut d = dispatcher();
        d.handle(&goto(1000));
        let reply = d.handle(&settings_frame(&Settings::default()));
        assert_eq!(reply, Reply::fault(FaultCode::Nack));
    }

    #[test]
    fn test_verification_timeout_latches_driver_sync() {
        let mut d = dispatcher();
        d.driver_mut().commit_after = None;
        let mut settings = Settings::default();
        settings.set_run_current(7).unwrap();

        let reply = d.handle(&settings_frame(&settings));
        assert_eq!(reply, Reply::fault(FaultCode::DriverSync));
        assert_eq!(
            d.state(),
            ControllerState::Faulted(HardwareFault::DriverSync)
        );
        assert_eq!(d.driver().verify_calls, 10);
        // Already reported in the reply
        assert_eq!(d.service(0), None);
        // The unconfirmed record is not reported back
        assert_eq!(d.settings(), &Settings::default());
    }

    #[test]
    fn test_slow_commit_within_bound() {
        let mut d = dispatcher();
        d.driver_mut().commit_after = Some(5);
        assert_eq!(d.handle(&settings_frame(&Settings::default())), Reply::ack());
        assert_eq!(d.driver().verify_calls, 6);
    }

    #[test]
    fn test_stop_returns_to_idle_while_braking() {
        let mut d = dispatcher();
        d.handle(&goto(1000));
        d.motion_mut().position = 400;

        assert_eq!(d.handle(&frame(b'S', &[])), Reply::ack());
        assert_eq!(d.motion().stops, 1);
        assert_eq!(d.state(), ControllerState::Idle);
        assert_eq!(
            d.handle(&frame(b'Q', b"T")).payload(),
            &[DeviceMode::Idle.to_byte()]
        );

        // Planner still has braking distance left; no DONE follows STOP
        assert_eq!(d.service(0), None);
        assert_eq!(d.handle(&frame(b'Z', &[])), Reply::ack());
        assert_eq!(d.motion().position, 0);
        assert_eq!(d.service(1), None);
    }

    #[test]
    fn test_stop_during_homing() {
        let mut d = homing_dispatcher();
        d.handle(&frame(b'H', &[1]));
        assert_eq!(d.handle(&frame(b'S', &[])), Reply::ack());
        assert_eq!(d.state(), ControllerState::Idle);

        // Reaching the end of travel after STOP is not a homing failure
        d.motion_mut().arrive();
        assert_eq!(d.service(0), None);
        assert_eq!(d.state(), ControllerState::Idle);
    }

    #[test]
    fn test_idle_timer_waits_for_braking() {
        let mut d = dispatcher();
        let mut settings = Settings::default();
        settings.set_sleep_current(2).unwrap();
        settings.set_sleep_timeout(5);
        d.handle(&settings_frame(&settings));

        d.handle(&goto(1000));
        d.handle(&frame(b'S', &[]));
        d.service(0);
        d.service(100);
        assert!(!d.is_asleep());

        d.motion_mut().arrive();
        d.service(200);
        d.service(249);
        assert!(!d.is_asleep());
        d.service(250);
        assert!(d.is_asleep());
    }

    #[test]
    fn test_stop_when_idle_sends_no_done() {
        let mut d = dispatcher();
        assert_eq!(d.handle(&frame(b'S', &[])), Reply::ack());
        assert_eq!(d.motion().stops, 0);
        assert_eq!(d.service(0), None);
    }

    #[test]
    fn test_disable_and_enable() {
        let mut d = dispatcher();
        d.handle(&goto(1000));

        assert_eq!(d.handle(&frame(b'X', &[])), Reply::ack());
        assert_eq!(d.state(), ControllerState::Disabled);
        assert_eq!(d.motion().hard_stops, 1);
        assert!(!d.driver().enabled);

        assert_eq!(d.handle(&goto(5)), Reply::fault(FaultCode::Nack));
        assert_eq!(d.handle(&frame(b'S', &[])), Reply::ack());
        assert_eq!(d.state(), ControllerState::Disabled);

        assert_eq!(d.handle(&frame(b'Y', &[])), Reply::ack());
        assert_eq!(d.state(), ControllerState::Idle);
        assert!(d.driver().enabled);
    }

    #[test]
    fn test_reset_position() {
        let mut d = dispatcher();
        d.motion_mut().set_current_position(321);
        assert_eq!(d.handle(&frame(b'Z', &[])), Reply::ack());
        assert_eq!(d.motion().position, 0);

        d.handle(&goto(50));
        assert_eq!(d.handle(&frame(b'Z', &[])), Reply::fault(FaultCode::Nack));
    }

    #[test]
    fn test_home_requires_enabled_switch() {
        let mut d = dispatcher();
        let reply = d.handle(&frame(b'H', &[1]));
        assert_eq!(reply, Reply::fault(FaultCode::Home));
        assert_eq!(d.state(), ControllerState::Idle);
        assert_eq!(d.motion().moves, 0);
    }

    fn homing_dispatcher() -> TestDispatcher {
        let mut d = dispatcher().with_homing_travel(500);
        let mut settings = Settings::default();
        let mut flags = settings.flags();
        flags.enable_home = true;
        flags.home_polarity = true;
        settings.set_flags(flags);
        assert_eq!(d.handle(&settings_frame(&settings)), Reply::ack());
        d
    }

    #[test]
    fn test_homing_finds_switch() {
        let mut d = homing_dispatcher();
        d.motion_mut().set_current_position(200);

        assert_eq!(d.handle(&frame(b'H', &[0])), Reply::ack());
        assert_eq!(d.state(), ControllerState::Homing);
        assert_eq!(d.motion().target, -300);

        d.motion_mut().position = 17;
        d.switches_mut().levels.home_high = true;
        assert_eq!(d.service(0), Some(Reply::done(0)));
        assert_eq!(d.state(), ControllerState::Idle);
        assert_eq!(d.motion().position, 0);
    }

    #[test]
    fn test_homing_out_of_travel_latches_home() {
        let mut d = homing_dispatcher();
        d.handle(&frame(b'H', &[1]));
        d.motion_mut().arrive();

        assert_eq!(d.service(0), Some(Reply::fault(FaultCode::Home)));
        assert_eq!(d.state(), ControllerState::Faulted(HardwareFault::Home));
    }

    #[test]
    fn test_limit_switch_latches() {
        let mut d = dispatcher();
        let mut settings = Settings::default();
        let mut flags = settings.flags();
        flags.enable_limit2 = true;
        settings.set_flags(flags);
        d.handle(&settings_frame(&settings));

        // Active low by default; pin high means released
        d.switches_mut().levels.limit2_high = true;
        d.handle(&goto(1000));
        assert_eq!(d.service(0), None);

        d.switches_mut().levels.limit2_high = false;
        assert_eq!(d.service(0), Some(Reply::fault(FaultCode::Limit2)));
        assert_eq!(d.state(), ControllerState::Faulted(HardwareFault::Limit2));
        assert!(d.motion().hard_stops >= 1);
        assert_eq!(d.service(0), None);
    }

    #[test]
    fn test_disabled_limit_is_ignored() {
        let mut d = dispatcher();
        d.switches_mut().levels.limit1_high = false;
        d.handle(&goto(10));
        assert_eq!(d.service(0), None);
        assert_eq!(d.state(), ControllerState::Moving);
    }

    #[test]
    fn test_idle_current_reduction() {
        let mut d = dispatcher();
        let mut settings = Settings::default();
        settings.set_run_current(12).unwrap();
        settings.set_sleep_current(3).unwrap();
        settings.set_sleep_timeout(5);
        d.handle(&settings_frame(&settings));

        d.service(1000);
        d.service(1049);
        assert!(!d.is_asleep());
        d.service(1050);
        assert!(d.is_asleep());
        assert_eq!(d.driver().current, Some(3));

        d.handle(&goto(10));
        assert!(!d.is_asleep());
        assert_eq!(d.driver().current, Some(12));
    }

    #[test]
    fn test_idle_current_disabled_by_zero_timeout() {
        let mut d = dispatcher();
        let mut settings = Settings::default();
        settings.set_sleep_timeout(0);
        d.handle(&settings_frame(&settings));

        d.service(0);
        d.service(u32::MAX / 2);
        assert!(!d.is_asleep());
    }

    #[test]
    fn test_proactive_fault_reported_once() {
        let mut d = dispatcher();
        d.handle(&goto(1000));
        latch_driver_fault(&mut d);
        assert_eq!(d.motion().hard_stops, 1);
        assert_eq!(d.service(0), None);
        assert_eq!(d.handle(&frame(b'Q', b"T")).payload(), &[DeviceMode::Fault.to_byte()]);
    }

    #[test]
    fn test_init_pushes_settings() {
        let mut d = dispatcher();
        assert_eq!(d.init(), Ok(()));
        assert_eq!(d.driver().microstep, Some(crate::settings::MICROSTEP_16));
        assert_eq!(d.driver().clear_calls, 1);
        assert!(d.driver().enabled);
        assert_eq!(d.motion().limits, Some((2000, 4000)));

        let mut d = dispatcher();
        d.driver_mut().bus_down = true;
        assert_eq!(d.init(), Err(HardwareFault::DriverSync));
        assert!(d.state().is_faulted());
    }
}
