//! Settings of the bus master that are fixed at start-up.

use embassy_time::Duration;
use wmidi::Channel;

/// How long discovery waits for another node to announce itself before engaging the chain.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Settings of a [`Controller`](crate::controller::Controller).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Channel every MIDI message is sent on.
    pub channel: Channel,
    /// See [`DEFAULT_QUIET_PERIOD`].
    pub quiet_period: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            channel: Channel::Ch1,
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}
