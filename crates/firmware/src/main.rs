//! MidiKiti is [Embassy](https://embassy.dev)-based firmware for the bus master of a MidiKiti chain: a self-organizing
//! string of controller nodes (key octaves, potentiometers, buttons) that announce themselves over I2C, relay their
//! input events to the master, and are played as a single USB MIDI instrument. The firmware runs on the
//! [Nucleo-F767ZI development board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html).
//!
//! The board enumerates as a composite USB device: a MIDI class carrying the translated events, and a CDC-ACM serial
//! port speaking the host command protocol used to inspect the chain's layout and tune its peripherals.
//!
//! All protocol logic lives in `midikiti_lib`; this crate only supplies the hardware behind its capability traits.

#![no_std]
#![no_main]

mod board;
mod bus;
mod host;
mod midi;

use crate::{
    board::{NucleoBoard, ShiftRegister},
    bus::I2cMaster,
    host::{HostBridge, PACKET_SIZE},
    midi::UsbMidiSink,
};
use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::{
    Config,
    adc::{Adc, AdcChannel},
    bind_interrupts,
    gpio::{Input, Level, Output, Pull, Speed},
    i2c::I2c,
    mode::Blocking,
    peripherals,
    time::Hertz,
    usb,
};
use embassy_time::{Duration, Instant, Ticker};
use embassy_usb::{
    Builder, UsbDevice,
    class::{
        cdc_acm::{CdcAcmClass, State},
        midi::MidiClass,
    },
};
use midikiti_lib::{
    commander::Commander,
    configuration::ControllerConfig,
    controller::Controller,
    interface::{Button, ButtonConfig, Octave, OctaveConfig, Pot, PotConfig},
};
use static_cell::StaticCell;

#[cfg(feature = "defmt-rtt")]
use defmt_rtt as _;
#[cfg(not(feature = "panic-probe"))]
use panic_halt as _;
#[cfg(feature = "panic-probe")]
use panic_probe as _;

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
    }
);

type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;

type MasterController =
    Controller<I2cMaster<I2c<'static, Blocking>>, HostBridge, UsbMidiSink, NucleoBoard, Output<'static>>;

/// How often the controller ticks.
const TICK: Duration = Duration::from_millis(1);

/// Inputs across the local octave's shift registers: two contacts for each of twelve keys.
const OCTAVE_INPUTS: u8 = 24;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing MidiKiti");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // USB OTG FS runs off the 48MHz PLLQ clock rather than its bus clock (RM0410, section 5.2)
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // The Nucleo's USB port cannot power the board (UM1974, section 6.10), so the device is self-powered and must
    // detect VBUS to comply with the USB spec.
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, FOSS projects can apply to be listed under the vendor ID owned by InterBiometrics
    let vendor_id = 0x1209;
    let product_id = 0x4B17;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("MidiKiti");
    config.product = Some("MidiKiti Controller");
    config.self_powered = true;
    config.max_power = 0;

    // composite device: interface association descriptors group the CDC-ACM interfaces
    config.device_class = 0xEF;
    config.device_sub_class = 0x02;
    config.device_protocol = 0x01;
    config.composite_with_iads = true;

    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();
    static CDC_STATE: StaticCell<State> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    let midi_class = MidiClass::new(&mut builder, 0, 1, 64);
    let serial_class = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), PACKET_SIZE as u16);
    let (serial_tx, serial_rx) = serial_class.split();
    let usb = builder.build();

    spawner.spawn(unwrap!(usb_task(usb)));
    spawner.spawn(unwrap!(midi::midi_task(midi_class)));
    spawner.spawn(unwrap!(host::host_rx_task(serial_rx)));
    spawner.spawn(unwrap!(host::host_tx_task(serial_tx)));

    // standard mode, 100kHz
    let i2c = I2c::new_blocking(p.I2C1, p.PB8, p.PB9, Default::default());

    let board = NucleoBoard {
        // user button B1
        inputs: [Input::new(p.PC13, Pull::Down)],
        // blue user LED
        outputs: [Output::new(p.PB7, Level::Low, Speed::Low)],
        adc: Adc::new(p.ADC1),
        analog: [p.PA3.degrade_adc()],
        keys: ShiftRegister {
            load: Output::new(p.PD0, Level::High, Speed::Medium),
            clock_enable: Output::new(p.PD1, Level::High, Speed::Medium),
            clock: Output::new(p.PD2, Level::Low, Speed::Medium),
            data: Input::new(p.PD3, Pull::None),
            width: OCTAVE_INPUTS,
        },
    };

    // releases the first node of the chain
    let ready_out = Output::new(p.PG0, Level::Low, Speed::Low);

    let mut controller = unwrap!(Controller::new(
        I2cMaster::new(i2c),
        HostBridge,
        UsbMidiSink,
        board,
        ready_out,
        ControllerConfig::default(),
    ));

    let mut local = Commander::local();
    unwrap!(local.add(Octave::chromatic(
        OctaveConfig {
            register: 0,
            active_low: true,
        },
        60,
    )));
    // modulation wheel
    unwrap!(local.add(Pot::new(PotConfig {
        pin: 0,
        control: 1,
        ..PotConfig::default()
    })));
    // sustain, latched and shown on the blue LED
    unwrap!(local.add(Button::new(ButtonConfig {
        pin: 0,
        control: 64,
        toggle: true,
        led: Some(0),
        active_low: false,
        ..ButtonConfig::default()
    })));
    unwrap!(controller.add_local(local));

    spawner.spawn(unwrap!(controller_task(controller)));
}

#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

/// Task driving negotiation and relaying, one controller tick per [`TICK`].
#[embassy_executor::task]
async fn controller_task(mut controller: MasterController) -> ! {
    let mut ticker = Ticker::every(TICK);
    loop {
        controller.tick(Instant::now());
        ticker.next().await;
    }
}
