//! Serialization guard for store operations
//!
//! One lock per store. Readers (fetch, list, count) share it, writers
//! (upload commit, delete, delete-all) hold it alone, so filesystem steps of
//! mutating operations never interleave. In [`GuardMode::Exclusive`] every
//! operation takes the lock alone, which runs at most one store operation at
//! a time process-wide.

use std::fmt;
use std::str::FromStr;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardMode {
    /// Shared reads, exclusive writes
    #[default]
    ReadWrite,
    /// Everything exclusive
    Exclusive,
}

impl FromStr for GuardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read-write" | "rw" => Ok(GuardMode::ReadWrite),
            "exclusive" => Ok(GuardMode::Exclusive),
            other => Err(format!(
                "unknown guard mode '{}', expected 'read-write' or 'exclusive'",
                other
            )),
        }
    }
}

impl fmt::Display for GuardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardMode::ReadWrite => f.write_str("read-write"),
            GuardMode::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// Held for the duration of a store operation
pub enum GuardTicket<'a> {
    Shared { _guard: RwLockReadGuard<'a, ()> },
    Exclusive { _guard: RwLockWriteGuard<'a, ()> },
}

impl GuardTicket<'_> {
    pub fn is_exclusive(&self) -> bool {
        matches!(self, GuardTicket::Exclusive { .. })
    }
}

pub struct SerializationGuard {
    lock: RwLock<()>,
    mode: GuardMode,
}

impl SerializationGuard {
    pub fn new(mode: GuardMode) -> Self {
        Self {
            lock: RwLock::new(()),
            mode,
        }
    }

    /// Enter for a read-only operation
    pub async fn shared(&self) -> GuardTicket<'_> {
        match self.mode {
            GuardMode::ReadWrite => GuardTicket::Shared {
                _guard: self.lock.read().await,
            },
            GuardMode::Exclusive => self.exclusive().await,
        }
    }

    /// Enter for a mutating operation
    pub async fn exclusive(&self) -> GuardTicket<'_> {
        GuardTicket::Exclusive {
            _guard: self.lock.write().await,
        }
    }
}
