//! The sink's sole view of a stream: the `Input` trait, a ghost input used
//! by the move protocol, and a buffered test double.
//!
//! Grounded in the teacher's `client::playback_source::PlaybackSource`
//! pull-callback shape (`poll_read`-style "give me up to N bytes"), adapted
//! here to the render loop's peek/drop contract instead of a
//! `futures::AsyncRead` one, since this crate has no async runtime.

use std::collections::VecDeque;

use crate::memblock::MemChunk;
use crate::volume::ChannelVolume;

/// Outcome of [`Input::peek`].
pub enum PeekResult {
    /// The input produced a chunk, together with its current per-input
    /// volume snapshot.
    Chunk(MemChunk, ChannelVolume),
    /// The input has nothing to offer this pass; skip it.
    Skip,
}

/// The sink's view of one attached stream.
///
/// Implemented by real per-stream sources (out of scope here — see
/// `spec.md` §1) and by [`GhostInput`], which replays a frozen buffer
/// during an input move.
pub trait Input: Send {
    /// Stable index used to key the render-thread map.
    fn index(&self) -> u32;

    /// Produces up to `length` bytes of audio and the input's current
    /// volume snapshot. Returns [`PeekResult::Skip`] on transient failure
    /// (the render pass simply omits this input, per `spec.md` §4.4).
    fn peek(&mut self, length: usize) -> PeekResult;

    /// Commits a previous `peek`: advances the input's read cursor by
    /// `length` bytes.
    fn drop_samples(&mut self, length: usize);

    /// This input's preferred sink latency, in microseconds, or `None` for
    /// no preference. Used by the render thread's latency negotiator
    /// (`spec.md` §4.6) to compute the sink's requested latency as the
    /// minimum across every attached input's preference.
    fn requested_latency(&self) -> Option<u64> {
        None
    }

    /// Rewinds `nbytes` of already-delivered audio.
    fn process_rewind(&mut self, nbytes: usize);

    /// Called once when the input is added to the render-thread map.
    fn attach(&mut self) {}

    /// Called once when the input is removed from the render-thread map.
    fn detach(&mut self) {}

    /// Called on every sink suspend/resume transition.
    fn suspend(&mut self, _suspended: bool) {}

    /// Propagates a new sink-wide max rewind bound.
    fn update_max_rewind(&mut self, _n: usize) {}

    /// Called during `unlink`, once per still-attached input.
    fn kill(&mut self) {}
}

/// A placeholder input that replays a frozen buffer, installed in place of
/// a real input during a [`crate::message::SinkMessage::RemoveInputAndBuffer`]
/// move (`spec.md` §4.9).
pub struct GhostInput {
    index: u32,
    volume: ChannelVolume,
    queue: VecDeque<MemChunk>,
}

impl GhostInput {
    /// Builds a ghost carrying `buffer`, replayed at `volume` (the real
    /// input's volume snapshot at the moment it was detached).
    pub fn new(index: u32, volume: ChannelVolume, buffer: Vec<MemChunk>) -> Self {
        Self {
            index,
            volume,
            queue: buffer.into(),
        }
    }

    /// True once the ghost has drained its buffer and has nothing left to
    /// replay; the sink may drop it once this holds.
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Input for GhostInput {
    fn index(&self) -> u32 {
        self.index
    }

    fn peek(&mut self, length: usize) -> PeekResult {
        match self.queue.front() {
            Some(chunk) => {
                let take = chunk.len().min(length);
                let mut view = chunk.clone();
                view.truncate(take);
                PeekResult::Chunk(view, self.volume.clone())
            }
            None => PeekResult::Skip,
        }
    }

    fn drop_samples(&mut self, mut length: usize) {
        while length > 0 {
            let Some(front) = self.queue.front_mut() else {
                break;
            };
            if front.len() <= length {
                length -= front.len();
                self.queue.pop_front();
            } else {
                front.split_to(length);
                length = 0;
            }
        }
    }

    fn process_rewind(&mut self, _nbytes: usize) {
        // A ghost replays already-captured audio; it has nothing ahead of
        // its cursor to speculatively undo.
    }
}

/// A buffered test double generating a fixed sequence of chunks, used by
/// the end-to-end scenario tests.
#[cfg(test)]
pub struct TestInput {
    index: u32,
    volume: ChannelVolume,
    queue: VecDeque<MemChunk>,
    dropped: usize,
    suspended: bool,
    suspended_flag: Option<std::sync::Arc<std::sync::atomic::AtomicBool>>,
    attached: bool,
    latency: Option<u64>,
}

#[cfg(test)]
impl TestInput {
    /// Builds a test input at unit volume with the given chunks queued up.
    pub fn new(index: u32, chunks: Vec<MemChunk>) -> Self {
        Self {
            index,
            volume: ChannelVolume::norm(2),
            queue: chunks.into(),
            dropped: 0,
            suspended: false,
            suspended_flag: None,
            attached: false,
            latency: None,
        }
    }

    /// Sets this input's volume snapshot.
    pub fn with_volume(mut self, volume: ChannelVolume) -> Self {
        self.volume = volume;
        self
    }

    /// Sets this input's requested sink latency preference.
    pub fn with_requested_latency(mut self, latency_us: u64) -> Self {
        self.latency = Some(latency_us);
        self
    }

    /// Mirrors every `suspend` call into `flag`, so a test can observe this
    /// input's suspended state after it has been moved into a roster.
    pub fn with_suspend_flag(mut self, flag: std::sync::Arc<std::sync::atomic::AtomicBool>) -> Self {
        self.suspended_flag = Some(flag);
        self
    }

    /// Total bytes dropped (advanced) so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Whether `suspend(true)` is the most recent suspend call received.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Whether `attach` has been called more recently than `detach`.
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

#[cfg(test)]
impl Input for TestInput {
    fn index(&self) -> u32 {
        self.index
    }

    fn peek(&mut self, length: usize) -> PeekResult {
        match self.queue.front() {
            Some(chunk) => {
                let take = chunk.len().min(length);
                let mut view = chunk.clone();
                view.truncate(take);
                PeekResult::Chunk(view, self.volume.clone())
            }
            None => PeekResult::Skip,
        }
    }

    fn drop_samples(&mut self, mut length: usize) {
        self.dropped += length;
        while length > 0 {
            let Some(front) = self.queue.front_mut() else {
                break;
            };
            if front.len() <= length {
                length -= front.len();
                self.queue.pop_front();
            } else {
                front.split_to(length);
                length = 0;
            }
        }
    }

    fn process_rewind(&mut self, nbytes: usize) {
        self.dropped = self.dropped.saturating_sub(nbytes);
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
    }

    fn suspend(&mut self, suspended: bool) {
        self.suspended = suspended;
        if let Some(flag) = &self.suspended_flag {
            flag.store(suspended, std::sync::atomic::Ordering::SeqCst);
        }
    }

    fn requested_latency(&self) -> Option<u64> {
        self.latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memblock::MemBlock;

    fn chunk(bytes: &[u8]) -> MemChunk {
        MemChunk::new(MemBlock::new(bytes.to_vec()), 0, bytes.len())
    }

    #[test]
    fn test_input_peek_drop_advances_cursor() {
        let mut input = TestInput::new(0, vec![chunk(&[1, 2, 3, 4])]);
        match input.peek(4) {
            PeekResult::Chunk(c, _) => assert_eq!(c.as_slice(), &[1, 2, 3, 4]),
            PeekResult::Skip => panic!("expected chunk"),
        }
        input.drop_samples(4);
        assert_eq!(input.dropped(), 4);
        assert!(matches!(input.peek(4), PeekResult::Skip));
    }

    #[test]
    fn ghost_input_drains() {
        let mut ghost = GhostInput::new(0, ChannelVolume::norm(2), vec![chunk(&[9, 9])]);
        assert!(!ghost.is_drained());
        ghost.drop_samples(2);
        assert!(ghost.is_drained());
        assert!(matches!(ghost.peek(4), PeekResult::Skip));
    }
}
