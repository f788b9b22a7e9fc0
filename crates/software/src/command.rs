//! The serial command protocol between the bus master and a host computer.
//!
//! Every frame, in either direction, is `[0xFF][command id][payload size][payload]`. Frames are assembled one byte at
//! a time as the host link delivers them, so the controller never waits for a frame to complete.

use crate::error::ParameterError;
use core::{fmt, mem};
use heapless::Vec;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Marks the start of a frame.
pub const START_FLAG: u8 = 0xFF;

/// Largest payload a frame can announce.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Commands understood by the controller.
#[derive(Clone, Copy, Debug, FromPrimitive, ToPrimitive, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandId {
    /// Host asks for the commanders and their interface kinds.
    GetLayout = 1,
    /// Host asks for the parameters of one interface; `[commander index][interface index]`.
    GetPreferences = 2,
    /// Host replaces the parameters of one interface; `[commander index][interface index][blob size][blob]`.
    SetPreferences = 3,
    /// ASCII notification. Sent by the controller to acknowledge the other commands.
    Message = 4,
}

/// The byte stream to the host.
pub trait HostLink {
    /// Returns the next byte from the host, if one has arrived.
    fn read(&mut self) -> Option<u8>;

    /// Queues a byte for the host.
    fn write(&mut self, byte: u8);
}

/// Outcomes reported to the host in [`CommandId::Message`] frames.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notice {
    /// A parameter blob was applied.
    ParamsSet,
    /// The commander index names no commander.
    InvalidCommanderIndex,
    /// The interface index names no interface of the commander.
    InvalidInterfaceIndex,
    /// The commander is a remote node, whose parameters the master cannot reach.
    RemotePreferencesUnsupported,
    /// The blob is smaller than the interface's parameters.
    InvalidParamSize,
    /// The blob is tagged for another kind of interface.
    InvalidParamKind,
    /// The payload is too short for the command.
    MalformedCommand,
    /// The command id is not known.
    UnknownCommand,
}

impl Notice {
    /// The text sent to the host.
    pub fn text(self) -> &'static str {
        match self {
            Notice::ParamsSet => "Params Set",
            Notice::InvalidCommanderIndex => "Invalid Commander Index",
            Notice::InvalidInterfaceIndex => "Invalid Interface Index",
            Notice::RemotePreferencesUnsupported => "Remote Preferences Unsupported",
            Notice::InvalidParamSize => "Invalid Param Size",
            Notice::InvalidParamKind => "Invalid Param Kind",
            Notice::MalformedCommand => "Malformed Command",
            Notice::UnknownCommand => "Unknown Command",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl From<ParameterError> for Notice {
    fn from(error: ParameterError) -> Self {
        match error {
            ParameterError::Undersized { .. } => Notice::InvalidParamSize,
            ParameterError::WrongKind { .. } => Notice::InvalidParamKind,
        }
    }
}

/// One complete frame received from the host.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    /// Raw command id; see [`Command::kind`].
    pub id: u8,
    /// Exactly as many bytes as the frame announced.
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl Command {
    /// Returns the command, if the id is known.
    pub fn kind(&self) -> Option<CommandId> {
        CommandId::from_u8(self.id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Stage {
    Idle,
    Id,
    Size { id: u8 },
    Payload { id: u8, size: usize },
}

/// Reassembles frames from a byte stream.
///
/// Outside a frame, every byte but the start flag is discarded. A start flag in place of a command id restarts the
/// frame, which lets a host resynchronize by repeating the flag. Payload bytes are counted, not inspected, so the
/// flag is a legal payload byte.
#[derive(Debug)]
pub struct CommandAssembler {
    stage: Stage,
    payload: Vec<u8, MAX_PAYLOAD>,
}

impl Default for CommandAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandAssembler {
    /// Constructs an assembler waiting for a start flag.
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            payload: Vec::new(),
        }
    }

    /// Consumes one byte, returning a command when it completes a frame.
    pub fn feed(&mut self, byte: u8) -> Option<Command> {
        match self.stage {
            Stage::Idle => {
                if byte == START_FLAG {
                    self.stage = Stage::Id;
                } else {
                    warn!("discarding {=u8:#x} outside a frame", byte);
                }
                None
            }
            Stage::Id if byte == START_FLAG => {
                warn!("start flag in place of a command id, restarting frame");
                None
            }
            Stage::Id => {
                self.stage = Stage::Size { id: byte };
                None
            }
            Stage::Size { id } => {
                self.payload.clear();
                if byte == 0 {
                    return self.complete(id);
                }
                self.stage = Stage::Payload {
                    id,
                    size: usize::from(byte),
                };
                None
            }
            Stage::Payload { id, size } => {
                // size never exceeds the capacity
                let _ = self.payload.push(byte);
                if self.payload.len() < size {
                    return None;
                }
                self.complete(id)
            }
        }
    }

    fn complete(&mut self, id: u8) -> Option<Command> {
        self.stage = Stage::Idle;
        Some(Command {
            id,
            payload: mem::take(&mut self.payload),
        })
    }
}

/// Writes a frame whose payload is the concatenation of `parts`, one byte at a time.
///
/// Payloads beyond [`MAX_PAYLOAD`] bytes are cut short.
pub fn write_frame<H: HostLink + ?Sized>(link: &mut H, id: CommandId, parts: &[&[u8]]) {
    let size = parts.iter().map(|part| part.len()).sum::<usize>().min(MAX_PAYLOAD);
    link.write(START_FLAG);
    link.write(id as u8);
    link.write(size as u8);
    parts
        .iter()
        .flat_map(|part| part.iter())
        .take(size)
        .for_each(|&byte| link.write(byte));
}

/// Writes a [`CommandId::Message`] frame carrying `text`.
pub fn write_message<H: HostLink + ?Sized>(link: &mut H, text: &str) {
    write_frame(link, CommandId::Message, &[text.as_bytes()]);
}

/// Writes a [`CommandId::Message`] frame carrying the notice's text.
pub fn notify<H: HostLink + ?Sized>(link: &mut H, notice: Notice) {
    write_message(link, notice.text());
}
