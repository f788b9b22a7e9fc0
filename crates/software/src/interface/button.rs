//! A debounced push button, momentary or latching, with an optional indicator LED.

use super::{ButtonParameters, Interface, InterfaceKind, Parameters, Sampler};
use crate::{
    error::ParameterError,
    event::{ButtonEvent, Event},
};
use embassy_time::{Duration, Instant};

/// How long a reading must hold before it counts as a press or release.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(5);

/// How a button is wired and what it sends.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonConfig {
    /// Digital input the switch is read on.
    pub pin: u8,
    /// Controller number.
    pub control: u8,
    /// Latch on/off on each press instead of reporting press and release.
    pub toggle: bool,
    /// Digital output driving an indicator that follows the latched state.
    pub led: Option<u8>,
    /// The switch pulls its input low when closed.
    pub active_low: bool,
    /// See [`DEFAULT_DEBOUNCE`].
    pub debounce: Duration,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            pin: 0,
            control: 0,
            toggle: false,
            led: None,
            active_low: true,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// A button reporting debounced edges.
#[derive(Clone, Debug)]
pub struct Button {
    config: ButtonConfig,
    /// Last raw reading and when it was first seen.
    reading: bool,
    changed_at: Instant,
    pressed: bool,
    on: bool,
    /// The indicator no longer shows `on` and is rewritten on the next sample.
    led_stale: bool,
}

impl Button {
    /// Constructs a released, unlatched [`Button`].
    pub fn new(config: ButtonConfig) -> Self {
        Self {
            config,
            reading: false,
            changed_at: Instant::from_ticks(0),
            pressed: false,
            on: false,
            led_stale: false,
        }
    }

    /// Getter.
    pub fn config(&self) -> &ButtonConfig {
        &self.config
    }

    /// The latched state of a toggle button. Always `false` for momentary buttons.
    pub fn is_on(&self) -> bool {
        self.on
    }

    fn show(&mut self, sampler: &mut Sampler<'_>) {
        self.led_stale = false;
        if let Some(led) = self.config.led {
            sampler.board.digital_write(led, self.on);
        }
    }

    fn send(&self, sampler: &mut Sampler<'_>, pressed: bool) {
        sampler.emit(Event::Button(ButtonEvent {
            address: sampler.address(),
            control: self.config.control,
            pressed,
        }));
    }
}

impl Interface for Button {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Button
    }

    fn parameters(&self) -> Parameters {
        Parameters::Button(ButtonParameters {
            control: self.config.control,
            toggle: self.config.toggle,
        })
    }

    fn set_parameters(&mut self, blob: &[u8]) -> Result<(), ParameterError> {
        if let Parameters::Button(p) = Parameters::parse(self.kind(), blob)? {
            self.config.control = p.control;
            self.config.toggle = p.toggle;
            if !p.toggle && self.on {
                self.on = false;
                self.led_stale = true;
            }
        }
        Ok(())
    }

    fn sample(&mut self, sampler: &mut Sampler<'_>) {
        if self.led_stale {
            self.show(sampler);
        }

        let reading = sampler.board.digital_read(self.config.pin) != self.config.active_low;
        if reading != self.reading {
            self.reading = reading;
            self.changed_at = sampler.now;
        }
        if self.reading == self.pressed
            || sampler.now.saturating_duration_since(self.changed_at) < self.config.debounce
        {
            return;
        }
        self.pressed = self.reading;

        if !self.config.toggle {
            self.send(sampler, self.pressed);
            return;
        }
        if self.pressed {
            self.on = !self.on;
            self.show(sampler);
            debug!("button {} toggled {}", self.config.control, self.on);
            self.send(sampler, self.on);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commander::EventQueue, test_support::FakeBoard};

    struct Bench {
        button: Button,
        board: FakeBoard,
        queue: EventQueue,
    }

    impl Bench {
        fn new(config: ButtonConfig) -> Self {
            Self {
                button: Button::new(config),
                board: FakeBoard::default(),
                queue: EventQueue::new(),
            }
        }

        fn at(&mut self, millis: u64, level: bool) {
            self.board.digital = level;
            let mut sampler = Sampler::new(&mut self.board, Instant::from_millis(millis), 2, &mut self.queue);
            self.button.sample(&mut sampler);
        }

        fn presses(&self) -> [Option<bool>; 4] {
            let mut presses = [None; 4];
            for (slot, raw) in presses.iter_mut().zip(self.queue.iter()) {
                if let Some(Event::Button(e)) = raw.decode() {
                    *slot = Some(e.pressed);
                }
            }
            presses
        }
    }

    fn momentary() -> ButtonConfig {
        ButtonConfig {
            control: 64,
            active_low: false,
            ..ButtonConfig::default()
        }
    }

    #[test]
    fn momentary_reports_press_and_release() {
        let mut bench = Bench::new(momentary());
        bench.at(0, true);
        bench.at(10, true);
        bench.at(20, false);
        bench.at(30, false);
        assert_eq!([Some(true), Some(false), None, None], bench.presses(), "Expected left but got right");
    }

    #[test]
    fn bounces_are_filtered() {
        let mut bench = Bench::new(momentary());
        bench.at(0, true);
        bench.at(1, false);
        bench.at(2, true);
        bench.at(3, false);
        bench.at(4, false);
        assert!(bench.queue.is_empty(), "Expected no events");
        bench.at(8, false);
        assert!(bench.queue.is_empty(), "Expected no events");
    }

    #[test]
    fn active_low_input_is_inverted() {
        let mut bench = Bench::new(ButtonConfig {
            control: 1,
            ..ButtonConfig::default()
        });
        bench.at(0, true);
        bench.at(10, true);
        assert!(bench.queue.is_empty(), "Idle-high input should read as released");
        bench.at(20, false);
        bench.at(30, false);
        assert_eq!([Some(true), None, None, None], bench.presses(), "Expected left but got right");
    }

    #[test]
    fn toggle_latches_and_drives_led() {
        let mut bench = Bench::new(ButtonConfig {
            toggle: true,
            led: Some(13),
            ..momentary()
        });
        bench.at(0, true);
        bench.at(10, true);
        assert!(bench.button.is_on());
        assert_eq!(Some((13, true)), bench.board.written, "Expected left but got right");

        bench.at(20, false);
        bench.at(30, false);
        bench.at(40, true);
        bench.at(50, true);
        assert!(!bench.button.is_on());
        assert_eq!(Some((13, false)), bench.board.written, "Expected left but got right");
        assert_eq!([Some(true), Some(false), None, None], bench.presses(), "Expected left but got right");
    }

    #[test]
    fn parameters_switch_mode() {
        let mut bench = Bench::new(momentary());
        let blob = Parameters::Button(ButtonParameters {
            control: 9,
            toggle: true,
        })
        .to_blob();
        assert_eq!(Ok(()), bench.button.set_parameters(&blob));
        assert_eq!(9, bench.button.config().control, "Expected left but got right");
        assert!(bench.button.config().toggle);
        assert!(bench.button.set_parameters(&blob[..3]).is_err());
    }

    #[test]
    fn leaving_toggle_mode_turns_the_led_off() {
        let mut bench = Bench::new(ButtonConfig {
            toggle: true,
            led: Some(13),
            ..momentary()
        });
        bench.at(0, true);
        bench.at(10, true);
        assert_eq!(Some((13, true)), bench.board.written, "Expected left but got right");

        let momentary = Parameters::Button(ButtonParameters {
            control: 64,
            toggle: false,
        })
        .to_blob();
        assert_eq!(Ok(()), bench.button.set_parameters(&momentary));
        assert!(!bench.button.is_on());

        bench.at(20, true);
        assert_eq!(Some((13, false)), bench.board.written, "LED should follow the cleared latch");

        bench.at(30, false);
        bench.at(40, false);
        bench.at(50, true);
        bench.at(60, true);
        assert_eq!(Some((13, false)), bench.board.written, "Momentary presses should leave the LED off");
    }
}
