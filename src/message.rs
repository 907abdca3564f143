//! The sink's message catalogue: the payload shapes and sync/async
//! convention of `spec.md` §4.8, as a tagged variant instead of PulseAudio's
//! `(code, userdata, offset, chunk)` quadruple (per `spec.md` §9's
//! "message dispatch → tagged variant" design note).

use crate::memblock::MemChunk;
use crate::state::SinkState;
use crate::volume::ChannelVolume;

/// A caller-supplied record describing an input move, carried by
/// [`SinkMessage::RemoveInputAndBuffer`] (`spec.md` §4.9).
pub struct MoveInfo {
    /// Index of the input being moved.
    pub input_index: u32,
    /// Maximum bytes of audio to capture into the ghost buffer.
    pub buffer_bytes: usize,
}

/// Outcome of [`MoveInfo`] processing: the captured buffer and the
/// volume it should be replayed at.
pub struct MoveResult {
    pub input_index: u32,
    pub buffer: Vec<MemChunk>,
    pub volume: ChannelVolume,
}

/// Messages the render thread accepts, per `spec.md` §4.8's catalogue.
///
/// Each variant's sync/async-ness is a compile-time property: sync
/// variants are sent through [`crate::mailbox::Mailbox::send_sync`] and
/// block the caller until a reply value of type `R` comes back; async
/// variants go through [`crate::mailbox::Mailbox::send_async`] and return
/// immediately.
pub enum SinkMessage {
    /// sync — insert an input into the render-thread map.
    AddInput(u32),
    /// sync — detach and remove an input.
    RemoveInput(u32),
    /// sync — detach, drain into a ghost buffer, and replace with a ghost.
    RemoveInputAndBuffer(MoveInfo),
    /// async — update the render-thread soft volume.
    SetVolume(ChannelVolume),
    /// async — update the render-thread soft mute.
    SetMute(bool),
    /// sync — snapshot the render-thread soft volume.
    GetVolume,
    /// sync — snapshot the render-thread soft mute.
    GetMute,
    /// sync — mirror a state transition into thread_info.
    SetState(SinkState),
    /// sync — detach every input (and the monitor).
    Detach,
    /// sync — attach every input (and the monitor).
    Attach,
    /// sync — §4.6's latency computation.
    GetRequestedLatency,
}
