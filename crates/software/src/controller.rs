//! The bus master: discovers the chain of nodes, relays their events to MIDI, and serves the host.
//!
//! ```text
//! Off ──> Boot ──> Connect ──(quiet period)──> Engage ──> Runtime
//! ```
//!
//! In `Connect` the controller keeps asking the bootstrap address for an announcement, handing each announcing node
//! the next free address. Once no node has announced itself for the configured quiet period it broadcasts the engage
//! token and moves on to polling. Commanders wired to the master itself are registered up front with
//! [`Controller::add_local`] and drained directly instead of over the bus.
//!
//! Host commands are serviced on every tick, whatever the state.

use crate::{
    board::Board,
    bus::{
        BOOTSTRAP_ADDRESS, ENGAGE_TOKEN, IDENTIFIER_SIZE, IDLE_BYTE, MASTER_ADDRESS, MasterBus, NO_ANNOUNCEMENT,
    },
    command::{Command, CommandAssembler, CommandId, HostLink, MAX_PAYLOAD, Notice, notify, write_frame},
    commander::{Commander, MAX_INTERFACES, QUEUE_CAPACITY},
    configuration::ControllerConfig,
    error::CapacityError,
    event::{Event, MAX_WIRE_SIZE, RawEvent},
    interface::{Interface, InterfaceKind},
    midi::{MidiSink, octave_offset, translate},
    node::MAX_BATCH_SIZE,
    state_machine::StateMachine,
};
use embassy_time::Instant;
use embedded_hal::digital::OutputPin;
use heapless::Vec;
use tinyvec::ArrayVec;

/// Number of remote nodes the controller keeps track of.
pub const MAX_CONNECTIONS: usize = 16;

/// Number of commanders wired to the master.
pub const MAX_LOCALS: usize = 4;

/// Number of octaves the registry holds.
pub const MAX_OCTAVES: usize = MAX_CONNECTIONS + MAX_LOCALS;

// the layout reply must fit one frame
const _: () = assert!(1 + MAX_CONNECTIONS + MAX_LOCALS * (1 + MAX_INTERFACES) <= MAX_PAYLOAD);

/// Negotiation phases of the bus master.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    /// Not started.
    Off,
    /// Releasing the first node of the chain.
    Boot,
    /// Assigning addresses to announcing nodes.
    Connect,
    /// Broadcasting the engage token.
    Engage,
    /// Polling nodes and relaying their events.
    Runtime,
}

/// A remote node discovered on the bus.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MidiConnection {
    /// The capability identifier the node announced.
    pub identifier: u16,
    /// The address the node was assigned.
    pub address: u8,
}

impl MidiConnection {
    /// Whether the node announced itself as hosting an octave.
    pub fn is_octave(&self) -> bool {
        self.identifier.to_be_bytes()[0] == InterfaceKind::Octave as u8
    }

    /// Number of interfaces the node announced.
    pub fn interface_count(&self) -> u8 {
        self.identifier.to_be_bytes()[1]
    }
}

/// Everything the controller's state machine operates on.
struct Master<B, H, M, D, R> {
    bus: B,
    host: H,
    sink: M,
    board: D,
    ready_out: R,
    config: ControllerConfig,
    now: Instant,
    quiet_since: Instant,
    last_address: u8,
    connections: ArrayVec<[MidiConnection; MAX_CONNECTIONS]>,
    octaves: ArrayVec<[u8; MAX_OCTAVES]>,
    locals: Vec<Commander, MAX_LOCALS>,
    assembler: CommandAssembler,
}

impl<B, H, M, D, R> Master<B, H, M, D, R>
where
    B: MasterBus,
    H: HostLink,
    M: MidiSink,
    D: Board,
    R: OutputPin,
{
    fn always(&mut self) -> bool {
        true
    }

    fn release_chain(&mut self) {
        if self.ready_out.set_high().is_err() {
            warn!("failed to release the chain");
        }
        self.quiet_since = self.now;
    }

    fn discover(&mut self) {
        let mut identifier = [0; IDENTIFIER_SIZE];
        match self.bus.request(BOOTSTRAP_ADDRESS, &mut identifier) {
            Ok(IDENTIFIER_SIZE) => {}
            // nobody is announcing
            _ => return,
        }
        let identifier = u16::from_be_bytes(identifier);
        if identifier == NO_ANNOUNCEMENT {
            return;
        }

        if self.connections.len() == self.connections.capacity() {
            warn!("no room for node {=u16:#x}, leaving it unassigned", identifier);
            return;
        }
        let address = self.last_address + 1;
        if self.bus.write(BOOTSTRAP_ADDRESS, &[address]).is_err() {
            warn!("failed to assign address {}", address);
            return;
        }
        self.last_address = address;
        let connection = MidiConnection { identifier, address };
        self.connections.push(connection);
        if connection.is_octave() {
            self.register_octave(address);
        }
        self.quiet_since = self.now;
        info!("node {=u16:#x} connected at {}", identifier, address);
    }

    fn quiet(&mut self) -> bool {
        self.now.saturating_duration_since(self.quiet_since) >= self.config.quiet_period
    }

    fn engage(&mut self) {
        for connection in self.connections.iter() {
            if self.bus.write(connection.address, &ENGAGE_TOKEN).is_err() {
                warn!("failed to engage node {}", connection.address);
            }
        }
    }

    fn relay(&mut self) {
        for local in self.locals.iter_mut() {
            local.sample(&mut self.board, self.now);
        }

        for i in 0..self.connections.len() {
            let address = self.connections[i].address;
            self.poll(address);
        }

        for i in 0..self.locals.len() {
            let events = self.locals[i].drain();
            for event in events.iter() {
                self.process(*event);
            }
        }
    }

    fn poll(&mut self, address: u8) {
        let mut count = [0];
        match self.bus.request(address, &mut count) {
            Ok(1) => {}
            Ok(_) => return,
            Err(_) => {
                warn!("node {} did not answer the poll", address);
                return;
            }
        }
        // a node not yet engaged answers idle
        if count[0] == IDLE_BYTE {
            return;
        }
        let count = usize::from(count[0]).min(QUEUE_CAPACITY);
        if count == 0 {
            return;
        }

        let mut batch = [0; MAX_BATCH_SIZE];
        let len = match self.bus.request(address, &mut batch[..count * MAX_WIRE_SIZE]) {
            Ok(len) => len,
            Err(_) => {
                warn!("node {} dropped a batch of {} events", address, count);
                return;
            }
        };

        let mut bytes = &batch[..len];
        for _ in 0..count {
            let Some((event, used)) = RawEvent::from_wire(bytes) else {
                warn!("undecodable bytes in batch from node {}", address);
                break;
            };
            bytes = &bytes[used..];
            self.process(event);
        }
    }

    fn process(&mut self, raw: RawEvent) {
        let Some(event) = raw.decode() else {
            debug!("dropping event tagged {}", raw.tag());
            return;
        };
        let transpose = match event {
            Event::Key(key) => {
                let index = self.octaves.iter().position(|&a| a == key.address).unwrap_or(0);
                octave_offset(index, self.octaves.len())
            }
            _ => 0,
        };
        if let Some(message) = translate(&event, transpose, self.config.channel) {
            self.sink.send(message);
        }
    }

    fn register_octave(&mut self, address: u8) {
        if self.octaves.try_push(address).is_some() {
            warn!("octave registry full, {} plays untransposed", address);
        }
    }

    fn service_host(&mut self) {
        while let Some(byte) = self.host.read() {
            if let Some(command) = self.assembler.feed(byte) {
                self.execute(&command);
            }
        }
    }

    fn execute(&mut self, command: &Command) {
        let result = match command.kind() {
            Some(CommandId::GetLayout) => {
                self.send_layout();
                Ok(())
            }
            Some(CommandId::GetPreferences) => self.send_preferences(&command.payload),
            Some(CommandId::SetPreferences) => self.set_preferences(&command.payload),
            Some(CommandId::Message) => {
                debug!("host sent a {} byte message", command.payload.len());
                Ok(())
            }
            None => Err(Notice::UnknownCommand),
        };
        if let Err(notice) = result {
            warn!("host command {} failed: {}", command.id, notice);
            notify(&mut self.host, notice);
        }
    }

    fn send_layout(&mut self) {
        let mut layout: Vec<u8, MAX_PAYLOAD> = Vec::new();
        // bounded by the table capacities, see the assertion above
        let _ = layout.push((self.connections.len() + self.locals.len()) as u8);
        for _ in self.connections.iter() {
            let _ = layout.push(0);
        }
        for local in self.locals.iter() {
            let _ = layout.push(local.interfaces().len() as u8);
            for interface in local.interfaces() {
                let _ = layout.push(interface.kind() as u8);
            }
        }
        write_frame(&mut self.host, CommandId::GetLayout, &[&layout]);
    }

    /// Maps a host-facing commander index onto the local commander table. Remote commanders come first.
    fn resolve(&self, index: u8) -> Result<usize, Notice> {
        let index = usize::from(index);
        let remotes = self.connections.len();
        if index < remotes {
            return Err(Notice::RemotePreferencesUnsupported);
        }
        let local = index - remotes;
        if local < self.locals.len() {
            Ok(local)
        } else {
            Err(Notice::InvalidCommanderIndex)
        }
    }

    fn send_preferences(&mut self, payload: &[u8]) -> Result<(), Notice> {
        let &[commander, interface, ..] = payload else {
            return Err(Notice::MalformedCommand);
        };
        let commander = &self.locals[self.resolve(commander)?];
        let blob = commander
            .interfaces()
            .get(usize::from(interface))
            .ok_or(Notice::InvalidInterfaceIndex)?
            .parameters()
            .to_blob();
        write_frame(
            &mut self.host,
            CommandId::GetPreferences,
            &[&[commander.address(), interface], &blob],
        );
        Ok(())
    }

    fn set_preferences(&mut self, payload: &[u8]) -> Result<(), Notice> {
        let Some((&[commander, interface, size], blob)) = payload.split_first_chunk::<3>() else {
            return Err(Notice::MalformedCommand);
        };
        let blob = &blob[..usize::from(size).min(blob.len())];
        let local = self.resolve(commander)?;
        self.locals[local]
            .interface_mut(usize::from(interface))
            .ok_or(Notice::InvalidInterfaceIndex)?
            .set_parameters(blob)?;

        info!("commander {} interface {} updated", commander, interface);
        notify(&mut self.host, Notice::ParamsSet);
        Ok(())
    }
}

/// The bus master and the host-facing side of the system.
pub struct Controller<B, H, M, D, R> {
    machine: StateMachine<ControllerState, Master<B, H, M, D, R>>,
    master: Master<B, H, M, D, R>,
}

impl<B, H, M, D, R> Controller<B, H, M, D, R>
where
    B: MasterBus,
    H: HostLink,
    M: MidiSink,
    D: Board,
    R: OutputPin,
{
    /// Constructs a controller in [`ControllerState::Off`].
    ///
    /// `ready_out` releases the first node of the chain; `board` is what local commanders sample from.
    pub fn new(
        bus: B,
        host: H,
        sink: M,
        board: D,
        ready_out: R,
        config: ControllerConfig,
    ) -> Result<Self, CapacityError> {
        let mut machine = StateMachine::new(ControllerState::Off);
        machine.add_transition(ControllerState::Off, ControllerState::Boot, Master::always)?;
        machine.add_transition(ControllerState::Boot, ControllerState::Connect, Master::always)?;
        machine.add_transition(ControllerState::Connect, ControllerState::Engage, Master::quiet)?;
        machine.add_transition(ControllerState::Engage, ControllerState::Runtime, Master::always)?;
        machine.add_runtime_action(ControllerState::Boot, Master::release_chain)?;
        machine.add_runtime_action(ControllerState::Connect, Master::discover)?;
        machine.add_runtime_action(ControllerState::Engage, Master::engage)?;
        machine.add_runtime_action(ControllerState::Runtime, Master::relay)?;

        Ok(Self {
            machine,
            master: Master {
                bus,
                host,
                sink,
                board,
                ready_out,
                config,
                now: Instant::from_ticks(0),
                quiet_since: Instant::from_ticks(0),
                last_address: MASTER_ADDRESS,
                connections: ArrayVec::new(),
                octaves: ArrayVec::new(),
                locals: Vec::new(),
                assembler: CommandAssembler::new(),
            },
        })
    }

    /// Registers a commander wired to the master, assigning it the next free address. Returns that address.
    pub fn add_local(&mut self, mut commander: Commander) -> Result<u8, CapacityError> {
        let master = &mut self.master;
        if master.locals.is_full() {
            return Err(CapacityError);
        }
        let address = master.last_address + 1;
        commander.set_address(address);
        if commander.has_octave() {
            master.register_octave(address);
        }
        master.locals.push(commander).map_err(|_| CapacityError)?;
        master.last_address = address;
        info!("local commander at {}", address);
        Ok(address)
    }

    /// Advances negotiation (or relaying, once in runtime) by one step, then services whatever the host sent.
    /// Returns the new state on a transition.
    pub fn tick(&mut self, now: Instant) -> Option<ControllerState> {
        self.master.now = now;
        let next = self.machine.tick(&mut self.master);
        if let Some(state) = next {
            info!("controller entered {}", state);
        }
        self.master.service_host();
        next
    }

    /// Getter.
    pub fn state(&self) -> ControllerState {
        self.machine.state()
    }

    /// Remote nodes, in discovery order.
    pub fn connections(&self) -> &[MidiConnection] {
        &self.master.connections
    }

    /// Addresses of commanders hosting an octave, lowest pitch first.
    pub fn octaves(&self) -> &[u8] {
        &self.master.octaves
    }

    /// Commanders wired to the master, in registration order.
    pub fn locals(&self) -> &[Commander] {
        &self.master.locals
    }

    /// Getter.
    pub fn config(&self) -> &ControllerConfig {
        &self.master.config
    }

    /// Mutable access to the board local commanders sample from.
    pub fn board_mut(&mut self) -> &mut D {
        &mut self.master.board
    }

    /// Mutable access to the host link.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.master.host
    }

    /// Getter.
    pub fn sink(&self) -> &M {
        &self.master.sink
    }

    /// Mutable access to the bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.master.bus
    }
}
