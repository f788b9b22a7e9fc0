//! USB MIDI output.

use crate::UsbDriver;
use defmt::*;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_usb::class::midi::MidiClass;
use midikiti_lib::midi::MidiSink;
use wmidi::MidiMessage;

const QUEUE_SIZE: usize = 32;

/// Messages translated by the controller, waiting for the USB endpoint.
static MIDI_OUT: Channel<CriticalSectionRawMutex, MidiMessage<'static>, QUEUE_SIZE> = Channel::new();

/// The controller's handle on the MIDI endpoint.
pub struct UsbMidiSink;

impl MidiSink for UsbMidiSink {
    fn send(&mut self, message: MidiMessage<'static>) {
        if MIDI_OUT.try_send(message).is_err() {
            warn!("MIDI output full, dropping message");
        }
    }
}

/// Wraps a channel voice message in a USB-MIDI event packet on cable 0.
fn event_packet(message: &MidiMessage<'_>) -> Option<[u8; 4]> {
    if message.bytes_size() > 3 {
        return None;
    }
    let mut packet = [0; 4];
    message.copy_to_slice(&mut packet[1..]).ok()?;
    // for channel voice messages the code index number is the status nibble
    packet[0] = packet[1] >> 4;
    Some(packet)
}

#[embassy_executor::task]
pub async fn midi_task(mut class: MidiClass<'static, UsbDriver>) -> ! {
    loop {
        class.wait_connection().await;
        info!("USB MIDI connected");
        loop {
            let message = MIDI_OUT.receive().await;
            let Some(packet) = event_packet(&message) else {
                continue;
            };
            if class.write_packet(&packet).await.is_err() {
                break;
            }
        }
        info!("USB MIDI disconnected");
    }
}
