//! Error surface for sink construction and control-thread operations.
//!
//! Grounded in the teacher's `ClientError`/`ProtocolError` (both plain
//! `thiserror` enums over the operations that can fail). Precondition
//! violations (`spec.md` §7's "asserted invariants") stay `panic!`/
//! `debug_assert!`, never a `SinkError` variant.

use thiserror::Error;

/// Errors returned by sink construction and control-thread operations.
#[derive(Debug, Error)]
pub enum SinkError {
    /// `new`'s sample spec or channel map failed validation.
    #[error("invalid sample spec: {0}")]
    InvalidSampleSpec(#[from] crate::sample::SampleSpecError),

    /// `new_data.name` was empty, or collided and the registry's policy
    /// was `Fail`.
    #[error("sink name {0:?} is already registered")]
    NameTaken(String),

    /// `SINK_NEW` or `SINK_FIXATE` was vetoed by a hook observer.
    #[error("construction vetoed by a hook observer")]
    HookVetoed,

    /// The paired monitor source failed to construct.
    #[error("failed to construct monitor source")]
    MonitorCreationFailed,

    /// `put` was called outside the `Init` state.
    #[error("put called outside Init state")]
    NotInit,

    /// An operation was attempted on a sink that has already been
    /// unlinked.
    #[error("sink is unlinked")]
    Unlinked,

    /// The installed `set_state` driver hook rejected the transition.
    #[error("driver rejected state transition")]
    DriverRejected,

    /// A mailbox send failed because the render thread has gone away.
    #[error("mailbox I/O error: {0}")]
    Mailbox(#[from] std::io::Error),
}
