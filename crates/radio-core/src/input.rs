//! Button sampling and press classification.
//!
//! Each registered pin runs a two-state machine fed by one raw sample per
//! [`InputClassifier::poll`] call:
//!
//! ```text
//!  Idle ──(level changed and now pressed)──▶ Held
//!  Held ──(level no longer pressed)────────▶ Idle   (short press if < 1 s)
//!  Held ──(every completed second)─────────▶ Held   (long press, repeats)
//! ```
//!
//! There is no debounce beyond the polling cadence.  A bounce shorter than
//! one poll period is never seen; one spanning several polls can register as
//! an extra short press.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::protocol::Intent;

/// Hold duration of one long-press step.
pub const LONG_PRESS_MS: u64 = 1000;

/// Sampled pin level.  Inputs are pulled up, so a pressed button reads `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

pub const PRESSED: Level = Level::Low;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("pin {pin}: {source}")]
    Io {
        pin: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Raw digital input hardware.
pub trait DigitalInput {
    /// Configure `pin` as a pulled-up input (idle `High`, pressed `Low`).
    fn configure_pull_up(&mut self, pin: u32) -> Result<(), InputError>;

    fn read(&mut self, pin: u32) -> Level;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Held,
}

#[derive(Debug, Clone)]
struct ButtonState {
    pin: u32,
    on_short: Intent,
    on_long: Intent,
    phase: Phase,
    press_start_ms: u64,
    repeat_count: u64,
    last_level: Level,
}

impl ButtonState {
    fn new(pin: u32, on_short: Intent, on_long: Intent) -> Self {
        Self {
            pin,
            on_short,
            on_long,
            phase: Phase::Idle,
            press_start_ms: 0,
            repeat_count: 1,
            last_level: Level::High,
        }
    }

    fn sample(&mut self, level: Level, now_ms: u64, dispatch: &mut dyn FnMut(Intent)) {
        match self.phase {
            Phase::Idle => {
                if level != self.last_level && level == PRESSED {
                    debug!(pin = self.pin, "button pressed");
                    self.phase = Phase::Held;
                    self.press_start_ms = now_ms;
                    self.repeat_count = 1;
                }
            }
            Phase::Held => {
                let elapsed = now_ms.saturating_sub(self.press_start_ms);

                if elapsed / LONG_PRESS_MS == self.repeat_count {
                    debug!(pin = self.pin, step = self.repeat_count, "long press");
                    dispatch(self.on_long.clone());
                    self.repeat_count += 1;
                }

                if level != PRESSED {
                    debug!(pin = self.pin, elapsed, "button released");
                    self.phase = Phase::Idle;
                    if elapsed < LONG_PRESS_MS {
                        dispatch(self.on_short.clone());
                    }
                }
            }
        }
        self.last_level = level;
    }
}

/// Turns polled pin levels into short-press and repeating long-press intents.
pub struct InputClassifier {
    input: Box<dyn DigitalInput>,
    clock: Arc<dyn Clock>,
    buttons: Vec<ButtonState>,
}

impl InputClassifier {
    pub fn new(input: Box<dyn DigitalInput>, clock: Arc<dyn Clock>) -> Self {
        Self {
            input,
            clock,
            buttons: Vec::new(),
        }
    }

    /// Bind a pin to the intents fired on a short press and on each
    /// completed second of a long press.
    pub fn register(&mut self, pin: u32, on_short: Intent, on_long: Intent) {
        if let Err(e) = self.input.configure_pull_up(pin) {
            warn!("could not configure button input: {}", e);
        }
        debug!(pin, ?on_short, ?on_long, "button registered");
        self.buttons.push(ButtonState::new(pin, on_short, on_long));
    }

    /// Sample every registered pin once, in registration order.
    ///
    /// `dispatch` runs synchronously; a slow handler delays the evaluation of
    /// the pins after it in the same call.
    pub fn poll(&mut self, dispatch: &mut dyn FnMut(Intent)) {
        for button in &mut self.buttons {
            let level = self.input.read(button.pin);
            let now = self.clock.now_ms();
            button.sample(level, now, dispatch);
        }
    }

    pub fn phase(&self, pin: u32) -> Option<Phase> {
        self.buttons.iter().find(|b| b.pin == pin).map(|b| b.phase)
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct FakePins {
        levels: Rc<RefCell<HashMap<u32, Level>>>,
        configured: Rc<RefCell<Vec<u32>>>,
    }

    impl FakePins {
        fn set(&self, pin: u32, level: Level) {
            self.levels.borrow_mut().insert(pin, level);
        }
    }

    impl DigitalInput for FakePins {
        fn configure_pull_up(&mut self, pin: u32) -> Result<(), InputError> {
            self.configured.borrow_mut().push(pin);
            Ok(())
        }

        fn read(&mut self, pin: u32) -> Level {
            *self.levels.borrow().get(&pin).unwrap_or(&Level::High)
        }
    }

    struct Rig {
        pins: FakePins,
        clock: ManualClock,
        classifier: InputClassifier,
        fired: Vec<Intent>,
    }

    impl Rig {
        fn new() -> Self {
            let pins = FakePins::default();
            let clock = ManualClock::new(0);
            let mut classifier =
                InputClassifier::new(Box::new(pins.clone()), Arc::new(clock.clone()));
            classifier.register(4, Intent::Next, Intent::VolumeUp);
            Self {
                pins,
                clock,
                classifier,
                fired: Vec::new(),
            }
        }

        fn poll_at(&mut self, ms: u64) {
            self.clock.set(ms);
            let fired = &mut self.fired;
            self.classifier.poll(&mut |i| fired.push(i));
        }

        /// Press at t=0, poll every millisecond up to and including `until`.
        fn hold(&mut self, until: u64) {
            self.pins.set(4, Level::Low);
            for t in 0..=until {
                self.poll_at(t);
            }
        }

        fn release_at(&mut self, ms: u64) {
            self.pins.set(4, Level::High);
            self.poll_at(ms);
        }
    }

    #[test]
    fn test_register_configures_pull_up() {
        let rig = Rig::new();
        assert_eq!(*rig.pins.configured.borrow(), vec![4]);
        assert_eq!(rig.classifier.phase(4), Some(Phase::Idle));
    }

    #[test]
    fn test_short_press_at_999ms() {
        let mut rig = Rig::new();
        rig.hold(998);
        assert_eq!(rig.classifier.phase(4), Some(Phase::Held));
        rig.release_at(999);
        assert_eq!(rig.fired, vec![Intent::Next]);
        assert_eq!(rig.classifier.phase(4), Some(Phase::Idle));
    }

    #[test]
    fn test_long_press_at_1000ms_suppresses_short() {
        let mut rig = Rig::new();
        rig.hold(1000);
        assert_eq!(rig.fired, vec![Intent::VolumeUp]);
        rig.release_at(1001);
        assert_eq!(rig.fired, vec![Intent::VolumeUp]);
    }

    #[test]
    fn test_long_press_repeats_every_second() {
        let mut rig = Rig::new();
        rig.hold(2500);
        assert_eq!(rig.fired, vec![Intent::VolumeUp, Intent::VolumeUp]);
        rig.release_at(2501);
        assert_eq!(rig.fired.len(), 2);
    }

    #[test]
    fn test_release_on_boundary_tick_fires_long_only() {
        let mut rig = Rig::new();
        rig.hold(999);
        rig.release_at(1000);
        assert_eq!(rig.fired, vec![Intent::VolumeUp]);
    }

    #[test]
    fn test_new_press_resets_repeat_count() {
        let mut rig = Rig::new();
        rig.hold(1500);
        rig.release_at(1501);

        rig.pins.set(4, Level::Low);
        rig.poll_at(3000);
        rig.poll_at(4000);
        rig.release_at(4001);
        assert_eq!(rig.fired, vec![Intent::VolumeUp, Intent::VolumeUp]);
    }

    #[test]
    fn test_idle_high_never_fires() {
        let mut rig = Rig::new();
        for t in 0..3000 {
            rig.poll_at(t);
        }
        assert!(rig.fired.is_empty());
    }

    #[test]
    fn test_pressed_at_boot_counts_as_press() {
        let mut rig = Rig::new();
        rig.pins.set(4, Level::Low);
        rig.poll_at(0);
        assert_eq!(rig.classifier.phase(4), Some(Phase::Held));
    }

    #[test]
    fn test_pins_evaluated_in_registration_order() {
        let pins = FakePins::default();
        let clock = ManualClock::new(0);
        let mut classifier =
            InputClassifier::new(Box::new(pins.clone()), Arc::new(clock.clone()));
        classifier.register(1, Intent::Previous, Intent::VolumeDown);
        classifier.register(2, Intent::Next, Intent::VolumeUp);

        pins.set(1, Level::Low);
        pins.set(2, Level::Low);
        classifier.poll(&mut |_| {});
        clock.set(100);
        pins.set(1, Level::High);
        pins.set(2, Level::High);

        let mut fired = Vec::new();
        classifier.poll(&mut |i| fired.push(i));
        assert_eq!(fired, vec![Intent::Previous, Intent::Next]);
    }

    #[test]
    fn test_slow_handler_delays_later_pins() {
        let pins = FakePins::default();
        let clock = ManualClock::new(0);
        let mut classifier =
            InputClassifier::new(Box::new(pins.clone()), Arc::new(clock.clone()));
        classifier.register(1, Intent::Stop, Intent::Stop);
        classifier.register(2, Intent::Next, Intent::VolumeUp);

        pins.set(1, Level::Low);
        pins.set(2, Level::Low);
        classifier.poll(&mut |_| {});

        // Pin 1 releases at 500 ms and its handler takes 600 ms, so pin 2 is
        // sampled at 1100 ms within the same poll and reaches its first step.
        pins.set(1, Level::High);
        clock.set(500);
        let mut fired = Vec::new();
        let slow = clock.clone();
        classifier.poll(&mut |i| {
            if i == Intent::Stop {
                slow.advance(600);
            }
            fired.push(i);
        });
        assert_eq!(fired, vec![Intent::Stop, Intent::VolumeUp]);
        assert_eq!(clock.now_ms(), 1100);
    }
}
