//! Controller status machine and the persistence seam for the RUN/STOP flag.
//!
//! Only RUN and STOP survive a reboot. ERROR and RESET are transient: a
//! restart falls back to the last persisted RUN/STOP.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Controller execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Not scanning; memory idle.
    #[default]
    Stop,
    /// Scanning on every tick.
    Run,
    /// Faulted; not scanning until the next command.
    Error,
    /// Just cleared; not scanning until the next command.
    Reset,
}

impl Status {
    /// Wire label of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::Run => "RUN",
            Self::Error => "ERROR",
            Self::Reset => "RESET",
        }
    }

    /// Stable integer stored by status stores; `None` for transient states.
    #[must_use]
    pub const fn persist_code(self) -> Option<i64> {
        match self {
            Self::Stop => Some(0),
            Self::Run => Some(1),
            Self::Error | Self::Reset => None,
        }
    }

    /// Decodes a persisted integer back into a status.
    #[must_use]
    pub const fn from_persist_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Stop),
            1 => Some(Self::Run),
            _ => None,
        }
    }
}

/// Failures surfaced by a [`StatusStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend storage could not be read or written.
    #[error("status store i/o failure")]
    Io(#[from] std::io::Error),
    /// The persisted value does not decode to a known status.
    #[error("persisted status value {0} is not a known status")]
    UnknownValue(i64),
    /// The persisted payload is not even a status value.
    #[error("persisted status payload {0:?} is corrupt")]
    Corrupt(String),
}

/// Persistence backend for the RUN/STOP flag.
///
/// Implementations must be infallible no-ops for transient statuses; the
/// controller only hands them persistable values.
pub trait StatusStore {
    /// Loads the persisted status, `None` when nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails or holds garbage.
    fn load(&mut self) -> Result<Option<Status>, StoreError>;

    /// Persists a RUN/STOP status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn save(&mut self, status: Status) -> Result<(), StoreError>;
}

/// Volatile in-process status store, for tests and storage-less embeddings.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    saved: Option<Status>,
    fail_next: bool,
}

impl MemoryStatusStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with a persisted status.
    #[must_use]
    pub const fn with_status(status: Status) -> Self {
        Self {
            saved: Some(status),
            fail_next: false,
        }
    }

    /// Makes the next operation fail, to exercise fault paths.
    pub fn fail_next_operation(&mut self) {
        self.fail_next = true;
    }

    /// Last value saved, if any.
    #[must_use]
    pub const fn saved(&self) -> Option<Status> {
        self.saved
    }

    fn check_fault(&mut self) -> Result<(), StoreError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(StoreError::Io(std::io::Error::other("injected store fault")));
        }
        Ok(())
    }
}

impl StatusStore for MemoryStatusStore {
    fn load(&mut self) -> Result<Option<Status>, StoreError> {
        self.check_fault()?;
        Ok(self.saved)
    }

    fn save(&mut self, status: Status) -> Result<(), StoreError> {
        self.check_fault()?;
        self.saved = Some(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStatusStore, Status, StatusStore};

    #[test]
    fn default_status_is_stop() {
        assert_eq!(Status::default(), Status::Stop);
    }

    #[test]
    fn only_run_and_stop_are_persistable() {
        assert_eq!(Status::Stop.persist_code(), Some(0));
        assert_eq!(Status::Run.persist_code(), Some(1));
        assert_eq!(Status::Error.persist_code(), None);
        assert_eq!(Status::Reset.persist_code(), None);
    }

    #[test]
    fn persist_codes_round_trip() {
        for status in [Status::Stop, Status::Run] {
            let code = status.persist_code().expect("persistable");
            assert_eq!(Status::from_persist_code(code), Some(status));
        }
        assert_eq!(Status::from_persist_code(7), None);
    }

    #[test]
    fn wire_labels_are_uppercase() {
        assert_eq!(Status::Run.as_str(), "RUN");
        assert_eq!(Status::Error.as_str(), "ERROR");
    }

    #[test]
    fn memory_store_round_trips_and_injects_faults() {
        let mut store = MemoryStatusStore::new();
        assert!(store.load().expect("no fault").is_none());

        store.save(Status::Run).expect("no fault");
        assert_eq!(store.load().expect("no fault"), Some(Status::Run));

        store.fail_next_operation();
        assert!(store.save(Status::Stop).is_err());
        assert_eq!(store.saved(), Some(Status::Run), "failed save left the value alone");
    }
}
