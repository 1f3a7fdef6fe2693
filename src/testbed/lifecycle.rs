//! Lifecycle bookkeeping shared by both testbed variants.

use std::fmt;

use tracing::info;

use super::{BackendKind, TestbedError};

/// Lifecycle position of a testbed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TestbedState {
    /// Constructed; `setup` has not succeeded yet.
    #[default]
    Uninitialized,
    /// Nodes are available.
    Ready,
    /// Torn down; no further operations are accepted.
    Destroyed,
}

impl fmt::Display for TestbedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Destroyed => "destroyed",
        };
        f.write_str(label)
    }
}

/// Tracks the state of one testbed and guards operations against it.
#[derive(Clone, Copy, Debug)]
pub(super) struct Lifecycle {
    backend: BackendKind,
    state: TestbedState,
}

impl Lifecycle {
    pub(super) const fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            state: TestbedState::Uninitialized,
        }
    }

    pub(super) const fn state(self) -> TestbedState {
        self.state
    }

    pub(super) const fn backend(self) -> BackendKind {
        self.backend
    }

    /// Fails with [`TestbedError::InvalidState`] unless the testbed is in
    /// `expected`.
    pub(super) fn require(
        self,
        expected: TestbedState,
        operation: &'static str,
    ) -> Result<(), TestbedError> {
        if self.state == expected {
            return Ok(());
        }
        Err(TestbedError::InvalidState {
            operation,
            state: self.state,
        })
    }

    pub(super) fn advance(&mut self, next: TestbedState) {
        info!(backend = %self.backend, from = %self.state, to = %next, "testbed state change");
        self.state = next;
    }
}
