//! Bridges the host command protocol onto a USB CDC-ACM serial port.
//!
//! The controller polls its [`HostBridge`] from a synchronous tick, so bytes cross between it and the USB tasks through
//! channels that are only ever accessed with `try_` operations on the controller's side.

use crate::UsbDriver;
use defmt::*;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_usb::class::cdc_acm::{Receiver, Sender};
use midikiti_lib::command::HostLink;

/// Maximum packet size of the serial endpoints.
pub const PACKET_SIZE: usize = 64;

const QUEUE_SIZE: usize = 256;

type ByteChannel = Channel<CriticalSectionRawMutex, u8, QUEUE_SIZE>;

/// Bytes received from the host, waiting for the controller.
static FROM_HOST: ByteChannel = Channel::new();

/// Bytes written by the controller, waiting for the USB endpoint.
static TO_HOST: ByteChannel = Channel::new();

/// The controller's handle on the serial port.
pub struct HostBridge;

impl HostLink for HostBridge {
    fn read(&mut self) -> Option<u8> {
        FROM_HOST.try_receive().ok()
    }

    fn write(&mut self, byte: u8) {
        if TO_HOST.try_send(byte).is_err() {
            warn!("host output full, dropping byte");
        }
    }
}

/// Task forwarding bytes from the host to the controller.
#[embassy_executor::task]
pub async fn host_rx_task(mut rx: Receiver<'static, UsbDriver>) -> ! {
    let mut buf = [0; PACKET_SIZE];
    loop {
        rx.wait_connection().await;
        info!("Host serial connected");
        while let Ok(n) = rx.read_packet(&mut buf).await {
            for &byte in &buf[..n] {
                FROM_HOST.send(byte).await;
            }
        }
        info!("Host serial disconnected");
    }
}

/// Task flushing the controller's output to the host, packing as many bytes per packet as are waiting.
#[embassy_executor::task]
pub async fn host_tx_task(mut tx: Sender<'static, UsbDriver>) -> ! {
    // a full-size packet would have to be followed by a zero-length one
    let mut packet = [0; PACKET_SIZE - 1];
    loop {
        tx.wait_connection().await;
        loop {
            packet[0] = TO_HOST.receive().await;
            let mut len = 1;
            while len < packet.len() {
                match TO_HOST.try_receive() {
                    Ok(byte) => {
                        packet[len] = byte;
                        len += 1;
                    }
                    Err(_) => break,
                }
            }
            if tx.write_packet(&packet[..len]).await.is_err() {
                break;
            }
        }
    }
}
