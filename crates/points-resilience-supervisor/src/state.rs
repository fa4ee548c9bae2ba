//! Connection state tracking.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Lifecycle state of the supervised connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Connected and passing liveness pings.
    Connected,

    /// No usable connection and no reconnection in progress.
    Disconnected,

    /// Initial connection in progress.
    Connecting,

    /// Connection lost; reconnection with backoff in progress.
    Reconnecting,
}

impl ConnectionState {
    /// Lower-case name used in logs, metrics labels and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }

    fn encode(self) -> u8 {
        match self {
            ConnectionState::Connected => 0,
            ConnectionState::Disconnected => 1,
            ConnectionState::Connecting => 2,
            ConnectionState::Reconnecting => 3,
        }
    }

    fn decode(encoded: u8) -> Self {
        match encoded {
            0 => ConnectionState::Connected,
            2 => ConnectionState::Connecting,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic state shared between the supervisor handle and its background tasks.
pub(crate) struct SupervisorState {
    state: AtomicU8,

    /// Failed reconnection attempts since the last successful ping.
    attempts: AtomicU32,

    /// Set while a reconnection task owns the connection.
    reconnect_in_flight: AtomicBool,

    shut_down: AtomicBool,
}

impl SupervisorState {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected.encode()),
            attempts: AtomicU32::new(0),
            reconnect_in_flight: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::decode(self.state.load(Ordering::Acquire))
    }

    /// Stores `next` and returns the previous state.
    pub(crate) fn swap(&self, next: ConnectionState) -> ConnectionState {
        ConnectionState::decode(self.state.swap(next.encode(), Ordering::AcqRel))
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Increments and returns the failed-attempt count.
    pub(crate) fn increment_attempts(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset_attempts(&self) {
        self.attempts.store(0, Ordering::Release);
    }

    /// Claims the reconnection guard. Returns false if another task holds it.
    pub(crate) fn try_begin_reconnect(&self) -> bool {
        self.reconnect_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_reconnect(&self) {
        self.reconnect_in_flight.store(false, Ordering::Release);
    }

    pub(crate) fn reconnect_in_flight(&self) -> bool {
        self.reconnect_in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn mark_shut_down(&self) {
        self.shut_down.store(true, Ordering::Release);
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorState")
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .field("reconnect_in_flight", &self.reconnect_in_flight())
            .finish()
    }
}
