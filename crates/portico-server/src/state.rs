//! The server state machine.
//!
//! ```text
//! Created ──start──▶ Preparing ──bound──▶ Ready ──stop/fatal──▶ Stopped
//!    │                   │
//!    └──────stop─────────┴──stop/bind failure──────────────────▶ Stopped
//! ```
//!
//! `Stopped` is terminal. The state lives in a single atomic; every
//! transition is a compare-and-swap or an unconditional swap to `Stopped`,
//! so concurrent callers observe one total order of transitions.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::ServerError;

/// Lifecycle state of a [`Server`](crate::Server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerState {
    /// Built, `start` not yet called.
    Created = 0,
    /// `start` called, listener not yet bound.
    Preparing = 1,
    /// Listener bound and accepting connections.
    Ready = 2,
    /// Stopped for good.
    Stopped = 3,
}

impl ServerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Preparing,
            2 => Self::Ready,
            _ => Self::Stopped,
        }
    }

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(ServerState::Created as u8))
    }

    pub(crate) fn load(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Created -> Preparing`, or the error matching the current state.
    pub(crate) fn begin_start(&self) -> Result<(), ServerError> {
        match self.0.compare_exchange(
            ServerState::Created as u8,
            ServerState::Preparing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) => match ServerState::from_u8(current) {
                ServerState::Stopped => Err(ServerError::AlreadyStopped),
                _ => Err(ServerError::AlreadyRunning),
            },
        }
    }

    /// `Preparing -> Ready`. Fails if `stop` got there first.
    pub(crate) fn mark_ready(&self) -> bool {
        self.0
            .compare_exchange(
                ServerState::Preparing as u8,
                ServerState::Ready as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves to `Stopped`, returning the state it replaced.
    pub(crate) fn stop(&self) -> ServerState {
        ServerState::from_u8(self.0.swap(ServerState::Stopped as u8, Ordering::AcqRel))
    }
}
