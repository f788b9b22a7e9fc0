//! Translation of relayed events into MIDI messages, and the sink those messages go to.

use crate::{
    event::{ButtonEvent, Event, KeyEvent, PotEvent},
    interface::CONTROL_CHANGE,
};
use wmidi::{Channel, ControlFunction, MidiMessage, Note, U7};

/// Semitones in an octave.
pub const OCTAVE: i16 = 12;

/// Controller value a button sends when pressed or latched on.
pub const BUTTON_ON: u8 = 127;

/// Where translated MIDI messages are delivered, e.g. a USB MIDI endpoint.
pub trait MidiSink {
    /// Delivers one message. Must return promptly; a sink that cannot keep up drops messages.
    fn send(&mut self, message: MidiMessage<'static>);
}

/// Translates an event into the MIDI message it stands for, shifting key events by `transpose` semitones.
///
/// Returns `None` for notes shifted out of the MIDI range and for pot commands other than Control Change.
pub fn translate(event: &Event, transpose: i16, channel: Channel) -> Option<MidiMessage<'static>> {
    match *event {
        Event::Key(KeyEvent {
            key,
            velocity,
            pressed,
            ..
        }) => {
            let note = u8::try_from(i16::from(key) + transpose)
                .ok()
                .and_then(|n| Note::try_from(n).ok());
            let Some(note) = note else {
                warn!("key {} transposed by {} leaves the MIDI range", key, transpose);
                return None;
            };
            let velocity = U7::from_u8_lossy(velocity);
            Some(if pressed {
                MidiMessage::NoteOn(channel, note, velocity)
            } else {
                MidiMessage::NoteOff(channel, note, velocity)
            })
        }
        Event::Pot(PotEvent {
            command,
            control,
            value,
            ..
        }) => {
            if command != CONTROL_CHANGE {
                debug!("unsupported pot command {=u8:#x}", command);
                return None;
            }
            Some(control_change(channel, control, value))
        }
        Event::Button(ButtonEvent { control, pressed, .. }) => Some(control_change(
            channel,
            control,
            if pressed { BUTTON_ON } else { 0 },
        )),
    }
}

fn control_change(channel: Channel, control: u8, value: u8) -> MidiMessage<'static> {
    MidiMessage::ControlChange(
        channel,
        ControlFunction(U7::from_u8_lossy(control)),
        U7::from_u8_lossy(value),
    )
}

/// Semitone offset for a key event from the octave registered `index`th out of `count`, centering the registry
/// around the keys' own pitch.
pub fn octave_offset(index: usize, count: usize) -> i16 {
    let centered = index as i16 - (count / 2) as i16;
    centered * OCTAVE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: u8, pressed: bool) -> Event {
        Event::Key(KeyEvent {
            address: 1,
            key,
            velocity: if pressed { 90 } else { 0 },
            pressed,
        })
    }

    #[test]
    fn keys_become_notes() {
        assert_eq!(
            Some(MidiMessage::NoteOn(Channel::Ch1, Note::C4, U7::from_u8_lossy(90))),
            translate(&key(60, true), 0, Channel::Ch1),
            "Expected left but got right"
        );
        assert_eq!(
            Some(MidiMessage::NoteOff(Channel::Ch2, Note::C5, U7::from_u8_lossy(0))),
            translate(&key(60, false), 12, Channel::Ch2),
            "Expected left but got right"
        );
    }

    #[test]
    fn out_of_range_notes_are_dropped() {
        assert_eq!(None, translate(&key(5, true), -12, Channel::Ch1), "Expected left but got right");
        assert_eq!(None, translate(&key(120, true), 12, Channel::Ch1), "Expected left but got right");
    }

    #[test]
    fn pots_only_send_control_change() {
        let pot = |command| {
            Event::Pot(PotEvent {
                address: 1,
                command,
                control: 7,
                value: 100,
            })
        };
        assert_eq!(
            Some(control_change(Channel::Ch1, 7, 100)),
            translate(&pot(0xB0), 0, Channel::Ch1),
            "Expected left but got right"
        );
        assert_eq!(None, translate(&pot(0xE0), 0, Channel::Ch1), "Expected left but got right");
    }

    #[test]
    fn buttons_send_full_or_zero() {
        let button = |pressed| {
            Event::Button(ButtonEvent {
                address: 1,
                control: 64,
                pressed,
            })
        };
        assert_eq!(
            Some(control_change(Channel::Ch1, 64, 127)),
            translate(&button(true), 0, Channel::Ch1),
            "Expected left but got right"
        );
        assert_eq!(
            Some(control_change(Channel::Ch1, 64, 0)),
            translate(&button(false), 0, Channel::Ch1),
            "Expected left but got right"
        );
    }

    #[test]
    fn octaves_center_on_the_middle_of_the_registry() {
        assert_eq!(0, octave_offset(0, 1), "Expected left but got right");
        assert_eq!(-12, octave_offset(0, 2), "Expected left but got right");
        assert_eq!(0, octave_offset(1, 2), "Expected left but got right");
        assert_eq!(-12, octave_offset(0, 3), "Expected left but got right");
        assert_eq!(12, octave_offset(2, 3), "Expected left but got right");
    }
}
