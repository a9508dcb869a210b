use std::time::Duration;

use z21link_frame::BroadcastFlags;
use z21link_transport::{DEFAULT_PORT, MAX_DATAGRAM_SIZE};

/// Station session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationConfig {
    /// Station UDP port.
    pub port: u16,
    /// Default reply timeout.
    pub timeout: Duration,
    /// How often the broadcast flags are re-sent to keep the session alive.
    pub keep_alive_interval: Duration,
    /// Broadcast flags announced on connect.
    pub broadcast_flags: BroadcastFlags,
    /// Replies buffered per message kind before new ones are dropped.
    pub waiter_capacity: usize,
    /// Receive buffer size; longer datagrams are truncated by the kernel.
    pub recv_buffer_size: usize,
    /// Activation pulse for turnouts switched in immediate mode.
    pub turnout_pulse: Duration,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(2),
            keep_alive_interval: Duration::from_secs(20),
            broadcast_flags: BroadcastFlags::LOCO_INFO,
            waiter_capacity: 100,
            recv_buffer_size: MAX_DATAGRAM_SIZE,
            turnout_pulse: Duration::from_millis(150),
        }
    }
}

impl StationConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
