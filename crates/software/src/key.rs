//! Turns the two switches under each key into timed, velocity-sensitive strikes.
//!
//! Each key closes a "pressed" contact as soon as it is touched and a "down" contact once fully actuated. The time
//! between the two is the strike speed: a fast travel produces a high velocity, a slow one a low velocity. Touching a
//! key without reaching the down contact produces nothing.

use crate::error::ContactError;
use embassy_time::{Duration, Instant};

/// Travel time at or beyond which a strike registers the minimum velocity.
pub const MAX_PRESS_TIME: Duration = Duration::from_millis(800);

/// Velocity of the fastest possible strike.
pub const MAX_VELOCITY: u8 = 127;

/// Velocity of the slowest strike.
pub const MIN_VELOCITY: u8 = 1;

/// Maps a key's travel time onto a MIDI velocity: 0 maps to 127, [`MAX_PRESS_TIME`] and beyond map to 1.
pub fn velocity(travel: Duration) -> u8 {
    let max = MAX_PRESS_TIME.as_micros();
    let travel = travel.as_micros().min(max);
    let span = u64::from(MAX_VELOCITY - MIN_VELOCITY);
    MAX_VELOCITY - (travel * span / max) as u8
}

/// What a key did in response to a new snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyTransition {
    /// The key reached its down contact.
    On {
        /// Velocity derived from the travel time.
        velocity: u8,
    },
    /// The key left its down contact.
    Off,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    Idle,
    /// Touched, travelling towards the down contact.
    Pressing { since: Instant },
    Down,
    /// Lifted off the down contact but still touched; a new strike is timed from `since`.
    SoftReleased { since: Instant },
}

/// State machine for a single key.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyTracker {
    key: u8,
    pressed_mask: u32,
    down_mask: u32,
    phase: Phase,
}

impl KeyTracker {
    /// Constructs a tracker for note `key` whose contacts appear at bits `pressed_bit` and `down_bit` of a snapshot.
    ///
    /// Fails if either bit lies outside the 32-bit snapshot.
    pub fn new(key: u8, pressed_bit: u8, down_bit: u8) -> Result<Self, ContactError> {
        let mask = |bit: u8| 1_u32.checked_shl(u32::from(bit)).ok_or(ContactError { bit });
        Ok(Self {
            key,
            pressed_mask: mask(pressed_bit)?,
            down_mask: mask(down_bit)?,
            phase: Phase::Idle,
        })
    }

    /// The MIDI note this key plays, before octave transposition.
    pub fn key(&self) -> u8 {
        self.key
    }

    /// Returns `true` while the key is held on its down contact.
    pub fn is_down(&self) -> bool {
        self.phase == Phase::Down
    }

    /// Feeds a new snapshot (bits set where contacts are closed) taken at `now`.
    pub fn process(&mut self, snapshot: u32, now: Instant) -> Option<KeyTransition> {
        let pressed = snapshot & self.pressed_mask != 0;
        let down = snapshot & self.down_mask != 0;

        match self.phase {
            Phase::Idle => {
                if !pressed {
                    return None;
                }
                self.phase = Phase::Pressing { since: now };
                // both contacts closed between two snapshots: fastest possible strike
                self.strike(down, now)
            }
            Phase::Pressing { .. } | Phase::SoftReleased { .. } => {
                if down {
                    self.strike(down, now)
                } else {
                    if !pressed {
                        self.phase = Phase::Idle;
                    }
                    None
                }
            }
            Phase::Down => {
                if down && pressed {
                    return None;
                }
                self.phase = if pressed {
                    Phase::SoftReleased { since: now }
                } else {
                    Phase::Idle
                };
                Some(KeyTransition::Off)
            }
        }
    }

    fn strike(&mut self, down: bool, now: Instant) -> Option<KeyTransition> {
        let since = match self.phase {
            Phase::Pressing { since } | Phase::SoftReleased { since } => since,
            _ => return None,
        };
        if !down {
            return None;
        }
        self.phase = Phase::Down;
        Some(KeyTransition::On {
            velocity: velocity(now.saturating_duration_since(since)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESSED: u32 = 0b01;
    const DOWN: u32 = 0b10;

    fn at(micros: u64) -> Instant {
        Instant::from_micros(micros)
    }

    #[test]
    fn velocity_curve() {
        assert_eq!(127, velocity(Duration::from_micros(0)), "Expected left but got right");
        assert_eq!(127, velocity(Duration::from_micros(100)), "Expected left but got right");
        assert_eq!(64, velocity(Duration::from_millis(400)), "Expected left but got right");
        assert_eq!(1, velocity(Duration::from_millis(800)), "Expected left but got right");
        assert_eq!(1, velocity(Duration::from_secs(3)), "Should clamp slow strikes");
    }

    #[test]
    fn fast_strike_then_release() {
        let mut key = KeyTracker::new(60, 0, 1).unwrap();
        assert_eq!(None, key.process(PRESSED, at(1_000)));
        assert_eq!(
            Some(KeyTransition::On { velocity: 127 }),
            key.process(PRESSED | DOWN, at(1_100)),
            "Expected left but got right"
        );
        assert!(key.is_down());
        assert_eq!(Some(KeyTransition::Off), key.process(0, at(50_000)), "Expected left but got right");
        assert_eq!(None, key.process(0, at(60_000)), "Should not release twice");
    }

    #[test]
    fn slow_strike_has_low_velocity() {
        let mut key = KeyTracker::new(60, 0, 1).unwrap();
        key.process(PRESSED, at(0));
        assert_eq!(
            Some(KeyTransition::On { velocity: 64 }),
            key.process(PRESSED | DOWN, at(400_000)),
            "Expected left but got right"
        );
    }

    #[test]
    fn touch_without_actuation_is_silent() {
        let mut key = KeyTracker::new(60, 0, 1).unwrap();
        assert_eq!(None, key.process(PRESSED, at(0)));
        assert_eq!(None, key.process(0, at(10_000)));
        assert_eq!(None, key.process(0, at(20_000)));
        assert!(!key.is_down());
    }

    #[test]
    fn soft_release_emits_one_off() {
        let mut key = KeyTracker::new(60, 0, 1).unwrap();
        key.process(PRESSED, at(0));
        key.process(PRESSED | DOWN, at(10));
        assert_eq!(Some(KeyTransition::Off), key.process(PRESSED, at(20)), "Expected left but got right");
        assert_eq!(None, key.process(0, at(30)), "Full release after soft release should be silent");
    }

    #[test]
    fn restrike_from_soft_release() {
        let mut key = KeyTracker::new(60, 0, 1).unwrap();
        key.process(PRESSED, at(0));
        key.process(PRESSED | DOWN, at(10));
        key.process(PRESSED, at(1_000));
        assert_eq!(
            Some(KeyTransition::On { velocity: 64 }),
            key.process(PRESSED | DOWN, at(401_000)),
            "Expected left but got right"
        );
    }

    #[test]
    fn both_contacts_in_one_snapshot() {
        let mut key = KeyTracker::new(60, 0, 1).unwrap();
        assert_eq!(
            Some(KeyTransition::On { velocity: 127 }),
            key.process(PRESSED | DOWN, at(5)),
            "Expected left but got right"
        );
    }

    #[test]
    fn rejects_contacts_outside_the_snapshot() {
        assert!(KeyTracker::new(60, 30, 31).is_ok());
        assert_eq!(Err(ContactError { bit: 32 }), KeyTracker::new(60, 32, 0), "Expected left but got right");
        assert_eq!(Err(ContactError { bit: 200 }), KeyTracker::new(60, 0, 200), "Expected left but got right");
    }

    #[test]
    fn ignores_other_keys_bits() {
        let mut key = KeyTracker::new(62, 2, 3).unwrap();
        assert_eq!(None, key.process(PRESSED | DOWN, at(0)));
        assert!(!key.is_down());
    }
}
