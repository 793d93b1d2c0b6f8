//! Phase tracking and user-facing status updates.
//!
//! A protocol run reports each completed phase to a [`StatusSink`]. The
//! default sink, [`TracingStatus`], forwards updates to `tracing`. Front ends
//! that render progress implement the trait themselves.

use std::fmt;
use std::sync::Mutex;

use tracing::info;

/// A phase of the session protocol.
///
/// Each variant names the milestone reached when the phase completes. The
/// [`fmt::Display`] form describes the work done during the phase, which is
/// how [`crate::RunError`] reports where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Operator key generated.
    KeyGenerated,
    /// Approval record built and handed to the wallet.
    SignatureRequested,
    /// Local and chain digests agree and the signer is the owner.
    DigestVerified,
    /// The factory derived a non-zero session address.
    AddressDerived,
    /// The signature recovers to the session address as an EIP-7702
    /// authorization.
    DelegationAuthorized,
    /// The factory may spend the approved amount.
    AllowanceSettled,
    /// The activation transaction is confirmed.
    ActivationComplete,
    /// The session account reports the new operator.
    OperatorRotated,
}

impl Phase {
    /// Returns the description used in error and status messages.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::KeyGenerated => "key generation",
            Self::SignatureRequested => "signature request",
            Self::DigestVerified => "digest verification",
            Self::AddressDerived => "address derivation",
            Self::DelegationAuthorized => "delegation authorization",
            Self::AllowanceSettled => "allowance settlement",
            Self::ActivationComplete => "activation",
            Self::OperatorRotated => "operator rotation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives a notification after each completed phase.
pub trait StatusSink: Send + Sync {
    /// Called when `phase` completes. `detail` is a short human-readable note
    /// such as the derived address or a transaction hash.
    fn phase_complete(&self, phase: Phase, detail: &str);
}

/// A [`StatusSink`] that emits `tracing` events at `INFO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn phase_complete(&self, phase: Phase, detail: &str) {
        info!(phase = %phase, %detail, "phase complete");
    }
}

/// A [`StatusSink`] that stores every update in order.
#[derive(Debug, Default)]
pub struct RecordingStatus {
    events: Mutex<Vec<(Phase, String)>>,
}

impl RecordingStatus {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded phases in the order they completed.
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        self.events().into_iter().map(|(phase, _)| phase).collect()
    }

    /// Returns every recorded `(phase, detail)` pair.
    #[must_use]
    pub fn events(&self) -> Vec<(Phase, String)> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StatusSink for RecordingStatus {
    fn phase_complete(&self, phase: Phase, detail: &str) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push((phase, detail.to_string()));
    }
}
