//! The pull mixer: `spec.md` §4.4's render pipeline.
//!
//! All render-thread state lives in [`RenderThread`] — the `thread_info`
//! block of `spec.md` §3 — since only the render thread ever touches it.

use crate::input::{Input, PeekResult};
use crate::memblock::{MemBlock, MemChunk};
use crate::monitor::MonitorSource;
use crate::roster::RenderRoster;
use crate::sample::SampleFormat;
use crate::state::SinkState;
use crate::volume::{ChannelVolume, Volume};

/// Per-pass contributor cap (`spec.md` §4.4 and §6).
pub const MAX_MIX_CHANNELS: usize = 32;

/// Default render window, one page.
pub const MIX_BUFFER_LENGTH: usize = 4096;

/// Default minimum requested latency, in microseconds.
pub const DEFAULT_MIN_LATENCY_US: u64 = 4_000;

/// One contributor's hold for the duration of a render pass.
pub struct MixInfo {
    pub input_index: u32,
    pub chunk: MemChunk,
    pub volume: ChannelVolume,
}

/// The render-thread-owned half of a sink: everything `spec.md` §3 calls
/// `thread_info`.
pub struct RenderThread {
    roster: RenderRoster,
    pub soft_volume: ChannelVolume,
    pub soft_muted: bool,
    pub state: SinkState,
    pending_rewind: usize,
    max_rewind: usize,
    requested_latency: Option<u64>,
    requested_latency_valid: bool,
    min_latency_us: u64,
    max_latency_us: u64,
    silence: MemChunk,
    monitor: Option<MonitorSource>,
    block_size_max: usize,
    frame_size: usize,
    channels: u8,
    format: SampleFormat,
}

impl RenderThread {
    /// Builds a fresh thread_info block for a newly constructed sink.
    pub fn new(
        channels: u8,
        format: SampleFormat,
        frame_size: usize,
        block_size_max: usize,
        min_latency_us: u64,
        max_latency_us: u64,
    ) -> Self {
        Self {
            roster: RenderRoster::new(),
            soft_volume: ChannelVolume::norm(channels),
            soft_muted: false,
            state: SinkState::Init,
            pending_rewind: 0,
            max_rewind: 0,
            requested_latency: None,
            requested_latency_valid: false,
            min_latency_us,
            max_latency_us,
            silence: MemChunk::silence(block_size_max),
            monitor: None,
            block_size_max,
            frame_size,
            channels,
            format,
        }
    }

    /// Installs the monitor source paired with this sink.
    pub fn set_monitor(&mut self, monitor: MonitorSource) {
        self.monitor = Some(monitor);
    }

    pub fn monitor_mut(&mut self) -> Option<&mut MonitorSource> {
        self.monitor.as_mut()
    }

    pub fn roster_mut(&mut self) -> &mut RenderRoster {
        &mut self.roster
    }

    pub fn roster(&self) -> &RenderRoster {
        &self.roster
    }

    fn align(&self, length: usize) -> usize {
        if self.frame_size == 0 {
            length
        } else {
            length - (length % self.frame_size)
        }
    }

    /// `spec.md` §4.4 `fill_mix_info`.
    ///
    /// Iterates render-view inputs, producing up to `max` [`MixInfo`]
    /// entries; shrinks `length` to the smallest non-empty contributor
    /// chunk, and drops pure-silence chunks since adding silence to a mix
    /// changes nothing.
    pub fn fill_mix_info(&mut self, length: usize, max: usize) -> (Vec<MixInfo>, usize) {
        let mut candidates = Vec::new();
        let mut window = length;

        for input in self.roster.iter_mut() {
            if candidates.len() >= max {
                break;
            }
            match input.peek(length) {
                PeekResult::Chunk(chunk, volume) => {
                    if !chunk.is_empty() {
                        window = window.min(chunk.len());
                    }
                    candidates.push((input.index(), chunk, volume));
                }
                PeekResult::Skip => {}
            }
        }

        let infos = candidates
            .into_iter()
            .filter_map(|(input_index, mut chunk, volume)| {
                chunk.truncate(window);
                if chunk.is_silence() {
                    None
                } else {
                    Some(MixInfo {
                        input_index,
                        chunk,
                        volume,
                    })
                }
            })
            .collect();

        (infos, window)
    }

    /// `spec.md` §4.4 `inputs_drop`: advances every currently attached
    /// input that contributed to this pass by `length`, and releases the
    /// per-pass chunk held in `infos`.
    pub fn inputs_drop(&mut self, infos: Vec<MixInfo>, length: usize) {
        for info in infos {
            if let Some(input) = self.roster.get_mut(info.input_index) {
                input.drop_samples(length);
            }
        }
    }

    /// `spec.md` §4.4 `render`: allocates and returns a fresh result.
    pub fn render(&mut self, length: Option<usize>) -> MemChunk {
        self.pending_rewind = 0;

        let length = self.align(length.unwrap_or(MIX_BUFFER_LENGTH).min(self.block_size_max));

        let (infos, window) = if self.state == SinkState::Running {
            self.fill_mix_info(length, MAX_MIX_CHANNELS)
        } else {
            (Vec::new(), length)
        };

        let result = self.render_from_infos(infos, window);

        if let Some(monitor) = &mut self.monitor {
            if monitor.is_opened() {
                monitor.post(&result);
            }
        }

        result
    }

    /// `spec.md` §4.4 `render_into`: writes into a caller-provided target,
    /// returning the number of bytes actually produced.
    pub fn render_into(&mut self, target: &mut MemChunk) -> usize {
        self.pending_rewind = 0;

        let length = self.align(target.len().min(self.block_size_max));

        let (infos, window) = if self.state == SinkState::Running {
            self.fill_mix_info(length, MAX_MIX_CHANNELS)
        } else {
            (Vec::new(), length)
        };

        let result = self.render_from_infos(infos, window);
        let n = result.len();
        target.make_writable()[..n].copy_from_slice(result.as_slice());

        if let Some(monitor) = &mut self.monitor {
            if monitor.is_opened() {
                monitor.post(&result);
            }
        }

        n
    }

    /// `spec.md` §4.4 `render_into_full`: fills the entire target by
    /// repeatedly calling [`Self::render_into`] on the unfilled suffix.
    pub fn render_into_full(&mut self, target: &mut MemChunk) {
        let total = target.len();
        let mut offset = 0;
        while offset < total {
            let remaining = total - offset;
            let mut scratch = MemChunk::silence(remaining);
            let n = self.render_into(&mut scratch);
            target.make_writable()[offset..offset + n].copy_from_slice(&scratch.as_slice()[..n]);
            offset += n;
            if n == 0 {
                break;
            }
        }
    }

    /// `spec.md` §4.4 `render_full`: allocates and fills a result of
    /// exactly `length` bytes.
    pub fn render_full(&mut self, length: usize) -> MemChunk {
        let length = self.align(length);
        let mut result = MemChunk::silence(length);
        self.render_into_full(&mut result);
        result
    }

    /// `spec.md` §4.4 `skip`: advances every input by `length` without
    /// mixing, unless the monitor has consumers, in which case it falls
    /// back to `render` in a loop so monitor listeners never observe a
    /// gap (and must not be posted to twice — `render` already posts).
    pub fn skip(&mut self, length: usize) {
        let monitor_active = self
            .monitor
            .as_ref()
            .map(|m| m.consumer_count() > 0)
            .unwrap_or(false);

        if monitor_active {
            let mut remaining = length;
            while remaining > 0 {
                let chunk = self.render(Some(remaining.min(self.block_size_max)));
                if chunk.is_empty() {
                    break;
                }
                remaining = remaining.saturating_sub(chunk.len());
            }
            return;
        }

        for input in self.roster.iter_mut() {
            input.drop_samples(length);
        }
    }

    fn render_from_infos(&mut self, infos: Vec<MixInfo>, window: usize) -> MemChunk {
        let result = match infos.len() {
            0 => {
                let mut silence = self.silence.clone();
                silence.truncate(window);
                silence
            }
            1 => {
                let effective = self.soft_volume.multiply(&infos[0].volume);
                let mut chunk = infos[0].chunk.clone();
                if self.soft_muted || effective.is_muted() {
                    chunk.make_writable().fill(0);
                } else if !effective.is_norm() {
                    log::trace!("adjusting volume for single contributor");
                    apply_volume(chunk.make_writable(), self.channels, self.format, &effective);
                }
                chunk
            }
            _ => {
                let mut mixed = MemChunk::silence(window);
                mix(
                    mixed.make_writable(),
                    &infos,
                    self.channels,
                    self.format,
                    &self.soft_volume,
                    self.soft_muted,
                );
                mixed
            }
        };

        if self.state == SinkState::Running {
            self.inputs_drop(infos, result.len());
        } else {
            drop(infos);
        }

        result
    }

    /// `spec.md` §4.5 `process_rewind`.
    pub fn process_rewind(&mut self, nbytes: usize) {
        for input in self.roster.iter_mut() {
            input.process_rewind(nbytes);
        }
        if let Some(monitor) = &mut self.monitor {
            monitor.process_rewind(nbytes);
        }
    }

    /// `spec.md` §4.5 `request_rewind`.
    pub fn request_rewind(&mut self, nbytes: usize) {
        let nbytes = if nbytes == 0 { self.max_rewind } else { nbytes };
        let nbytes = nbytes.min(self.max_rewind);
        if nbytes > self.pending_rewind {
            self.pending_rewind = nbytes;
        }
    }

    /// Pending rewind bytes accumulated via [`Self::request_rewind`].
    pub fn pending_rewind(&self) -> usize {
        self.pending_rewind
    }

    /// `spec.md` §4.5 `set_max_rewind`.
    pub fn set_max_rewind(&mut self, n: usize) {
        self.max_rewind = n;
        for input in self.roster.iter_mut() {
            input.update_max_rewind(n);
        }
    }

    /// `spec.md` §4.6 `get_requested_latency_within_thread`: the minimum
    /// requested latency across every attached input, clamped to
    /// `[min_latency_us, max_latency_us]`.
    pub fn get_requested_latency_within_thread(&mut self) -> Option<u64> {
        if self.requested_latency_valid {
            return self.requested_latency;
        }

        let mut result = None;
        for input in self.roster.iter_mut() {
            if let Some(requested) = input.requested_latency() {
                result = Some(match result {
                    Some(current) => current.min(requested),
                    None => requested,
                });
            }
        }

        if let Some(mut latency) = result {
            if self.max_latency_us > 0 && latency > self.max_latency_us {
                latency = self.max_latency_us;
            }
            if self.min_latency_us > 0 && latency < self.min_latency_us {
                latency = self.min_latency_us;
            }
            result = Some(latency);
        }

        self.requested_latency = result;
        self.requested_latency_valid = true;
        result
    }

    /// `spec.md` §4.6 `invalidate_requested_latency`.
    pub fn invalidate_requested_latency(&mut self) {
        self.requested_latency_valid = false;
        self.requested_latency = None;
    }

    /// The sink's configured minimum acceptable latency, in microseconds.
    pub fn min_latency_us(&self) -> u64 {
        self.min_latency_us
    }

    /// The sink's configured maximum acceptable latency, in microseconds.
    pub fn max_latency_us(&self) -> u64 {
        self.max_latency_us
    }

    /// This sink's channel count and sample format, for callers (the
    /// REMOVE_INPUT_AND_BUFFER handler) that need to apply a volume to a
    /// chunk without holding a borrow of the whole `RenderThread`.
    pub(crate) fn format(&self) -> (u8, SampleFormat) {
        (self.channels, self.format)
    }
}

/// Applies `volume` to `chunk` in place, making it writable first. Used by
/// the REMOVE_INPUT_AND_BUFFER handler (`spec.md` §4.9) to bake a
/// departing input's volume into the audio it hands off in its ghost
/// buffer.
pub(crate) fn apply_volume_to_chunk(
    chunk: &mut MemChunk,
    channels: u8,
    format: SampleFormat,
    volume: &ChannelVolume,
) {
    apply_volume(chunk.make_writable(), channels, format, volume);
}

/// Decodes one sample at `offset` in `format` to a normalized `-1.0..=1.0`
/// float.
fn decode_sample(bytes: &[u8], offset: usize, format: SampleFormat) -> f32 {
    match format {
        SampleFormat::U8 => (bytes[offset] as f32 - 128.0) / 128.0,
        SampleFormat::S16Le => {
            let v = i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
            v as f32 / i16::MAX as f32
        }
        SampleFormat::S32Le => {
            let v = i32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]);
            v as f32 / i32::MAX as f32
        }
        SampleFormat::Float32Le => f32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]),
    }
}

/// Encodes a normalized float sample into `bytes` at `offset`, clamping to
/// the format's representable range.
fn encode_sample(bytes: &mut [u8], offset: usize, format: SampleFormat, value: f32) {
    let clamped = value.clamp(-1.0, 1.0);
    match format {
        SampleFormat::U8 => {
            bytes[offset] = ((clamped * 128.0) + 128.0).round() as u8;
        }
        SampleFormat::S16Le => {
            let v = (clamped * i16::MAX as f32).round() as i16;
            bytes[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
        }
        SampleFormat::S32Le => {
            let v = (clamped * i32::MAX as f32).round() as i32;
            bytes[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
        }
        SampleFormat::Float32Le => {
            bytes[offset..offset + 4].copy_from_slice(&clamped.to_le_bytes());
        }
    }
}

/// Applies a per-channel volume to `bytes` in place.
fn apply_volume(bytes: &mut [u8], channels: u8, format: SampleFormat, volume: &ChannelVolume) {
    let bps = format.bytes_per_sample();
    let frame = bps * channels as usize;
    if frame == 0 {
        return;
    }
    let gains: Vec<f32> = (0..channels as usize)
        .map(|c| {
            volume
                .channels()
                .get(c)
                .copied()
                .unwrap_or(Volume::NORM)
                .to_linear()
        })
        .collect();

    for frame_start in (0..bytes.len()).step_by(frame) {
        for (c, gain) in gains.iter().enumerate() {
            let offset = frame_start + c * bps;
            if offset + bps > bytes.len() {
                break;
            }
            let sample = decode_sample(bytes, offset, format);
            encode_sample(bytes, offset, format, sample * gain);
        }
    }
}

/// The channel-aware N-contributor mixer: sums every contributor's samples
/// (each scaled by `soft_volume ⊗ input_volume`) into `out`, which must
/// already be zeroed.
fn mix(
    out: &mut [u8],
    infos: &[MixInfo],
    channels: u8,
    format: SampleFormat,
    soft_volume: &ChannelVolume,
    soft_muted: bool,
) {
    if soft_muted {
        return;
    }

    let bps = format.bytes_per_sample();
    let frame = bps * channels as usize;
    if frame == 0 {
        return;
    }

    for info in infos {
        let effective = soft_volume.multiply(&info.volume);
        if effective.is_muted() {
            continue;
        }
        let gains: Vec<f32> = (0..channels as usize)
            .map(|c| {
                effective
                    .channels()
                    .get(c)
                    .copied()
                    .unwrap_or(Volume::NORM)
                    .to_linear()
            })
            .collect();

        let input_bytes = info.chunk.as_slice();
        let n = input_bytes.len().min(out.len());

        for frame_start in (0..n).step_by(frame) {
            for (c, gain) in gains.iter().enumerate() {
                let offset = frame_start + c * bps;
                if offset + bps > n {
                    break;
                }
                let existing = decode_sample(out, offset, format);
                let contributed = decode_sample(input_bytes, offset, format) * gain;
                encode_sample(out, offset, format, existing + contributed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TestInput;
    use pretty_assertions::assert_eq;

    fn thread(channels: u8) -> RenderThread {
        let mut rt = RenderThread::new(
            channels,
            SampleFormat::S16Le,
            2 * channels as usize,
            MIX_BUFFER_LENGTH,
            DEFAULT_MIN_LATENCY_US,
            0,
        );
        rt.state = SinkState::Running;
        rt
    }

    fn s16_chunk(samples: &[i16]) -> MemChunk {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        MemChunk::new(MemBlock::new(bytes), 0, samples.len() * 2)
    }

    #[test]
    fn empty_render_returns_silence() {
        let mut rt = thread(2);
        let result = rt.render(Some(16));
        assert_eq!(result.len(), 16);
        assert!(result.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn single_contributor_passes_through_unit_volume() {
        let mut rt = thread(1);
        rt.roster_mut()
            .insert(Box::new(TestInput::new(0, vec![s16_chunk(&[100, 200, 300, 400])])));

        let result = rt.render(Some(8));
        assert_eq!(result.as_slice(), s16_chunk(&[100, 200, 300, 400]).as_slice());
    }

    #[test]
    fn mute_short_circuits_to_silence() {
        let mut rt = thread(1);
        rt.soft_muted = true;
        rt.roster_mut()
            .insert(Box::new(TestInput::new(0, vec![s16_chunk(&[1000, 2000])])));

        let result = rt.render(Some(4));
        assert!(result.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn two_contributors_mix_and_shrink_window() {
        let a = [1000i16, -2000];
        let b = [4000i16, 4000, 4000, 4000];

        let mut half = ChannelVolume::empty();
        half.push(Volume::from_linear(0.5));

        let mut rt = thread(1);
        rt.roster_mut().insert(Box::new(
            TestInput::new(0, vec![s16_chunk(&a)]).with_volume(ChannelVolume::norm(1)),
        ));
        rt.roster_mut()
            .insert(Box::new(TestInput::new(1, vec![s16_chunk(&b)]).with_volume(half.clone())));

        let result = rt.render(Some(8));
        // Window shrinks to A's shorter (4-byte / 2-sample) chunk.
        assert_eq!(result.len(), 4);

        let a_bytes = s16_chunk(&a).as_slice().to_vec();
        let b_bytes = s16_chunk(&b).as_slice().to_vec();
        let gain = half.channels()[0].to_linear();
        let mut expected = vec![0u8; 4];
        for sample in 0..2 {
            let offset = sample * 2;
            let mixed = decode_sample(&a_bytes, offset, SampleFormat::S16Le)
                + gain * decode_sample(&b_bytes, offset, SampleFormat::S16Le);
            encode_sample(&mut expected, offset, SampleFormat::S16Le, mixed);
        }
        assert_eq!(result.as_slice(), expected.as_slice());
    }

    #[test]
    fn drop_after_peek_advances_only_non_silent_contributors() {
        let mut rt = thread(1);
        rt.roster_mut()
            .insert(Box::new(TestInput::new(0, vec![s16_chunk(&[10, 20])])));
        rt.roster_mut()
            .insert(Box::new(TestInput::new(1, vec![MemChunk::silence(4)])));

        let result = rt.render(Some(4));
        assert_eq!(result.len(), 4);

        // The real contributor was drained by exactly `result.len()` bytes.
        assert!(matches!(
            rt.roster_mut().get_mut(0).unwrap().peek(4),
            PeekResult::Skip
        ));
        // The all-silence input never made it into `infos`, so it was never
        // passed to `inputs_drop` and its queued chunk is still there.
        assert!(matches!(
            rt.roster_mut().get_mut(1).unwrap().peek(4),
            PeekResult::Chunk(_, _)
        ));
    }

    #[test]
    fn request_rewind_clamps_to_max_and_never_shrinks() {
        let mut rt = thread(1);
        rt.set_max_rewind(100);

        rt.request_rewind(40);
        assert_eq!(rt.pending_rewind(), 40);

        // A smaller request doesn't shrink the pending amount.
        rt.request_rewind(10);
        assert_eq!(rt.pending_rewind(), 40);

        // A request above max_rewind clamps down.
        rt.request_rewind(200);
        assert_eq!(rt.pending_rewind(), 100);
    }

    #[test]
    fn request_rewind_zero_means_max() {
        let mut rt = thread(1);
        rt.set_max_rewind(64);
        rt.request_rewind(0);
        assert_eq!(rt.pending_rewind(), 64);
    }

    #[test]
    fn requested_latency_is_min_of_inputs() {
        let mut rt =
            RenderThread::new(1, SampleFormat::S16Le, 2, MIX_BUFFER_LENGTH, 5_000, 10_000);
        rt.roster_mut()
            .insert(Box::new(TestInput::new(0, vec![]).with_requested_latency(9_000)));
        rt.roster_mut()
            .insert(Box::new(TestInput::new(1, vec![]).with_requested_latency(7_000)));

        assert_eq!(rt.get_requested_latency_within_thread(), Some(7_000));
    }

    #[test]
    fn requested_latency_clamps_to_max_and_min() {
        let mut high =
            RenderThread::new(1, SampleFormat::S16Le, 2, MIX_BUFFER_LENGTH, 5_000, 10_000);
        high.roster_mut()
            .insert(Box::new(TestInput::new(0, vec![]).with_requested_latency(50_000)));
        assert_eq!(high.get_requested_latency_within_thread(), Some(10_000));

        let mut low =
            RenderThread::new(1, SampleFormat::S16Le, 2, MIX_BUFFER_LENGTH, 5_000, 10_000);
        low.roster_mut()
            .insert(Box::new(TestInput::new(1, vec![]).with_requested_latency(1_000)));
        assert_eq!(low.get_requested_latency_within_thread(), Some(5_000));
    }

    #[test]
    fn requested_latency_is_none_without_input_preference() {
        let mut rt = thread(1);
        rt.roster_mut().insert(Box::new(TestInput::new(0, vec![])));
        assert_eq!(rt.get_requested_latency_within_thread(), None);
    }

    #[test]
    fn render_into_full_fills_entire_target() {
        let mut rt = thread(1);
        rt.roster_mut().insert(Box::new(TestInput::new(
            0,
            vec![s16_chunk(&[1, 2, 3, 4, 5, 6, 7, 8])],
        )));

        let mut target = MemChunk::silence(16);
        rt.render_into_full(&mut target);
        assert_eq!(target.len(), 16);
    }
}
