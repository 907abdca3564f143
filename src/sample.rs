//! Sample format, sample spec and channel map types.
//!
//! Adapted from the wire-protocol sample spec / channel map types: the
//! validation rules are kept, the tagstruct read/write impls are dropped
//! since this crate never puts a `SampleSpec` on the wire.

use std::fmt;

/// Maximum number of channels a sink or input may have.
pub const CHANNELS_MAX: u8 = 32;

const RATE_MAX: u32 = 48_000 * 8;

/// Describes how individual samples are encoded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Unsigned 8 bit PCM.
    U8,
    /// Signed 16 bit PCM, little endian.
    #[default]
    S16Le,
    /// 32 bit IEEE floating point, little endian, range -1.0 to 1.0.
    Float32Le,
    /// Signed 32 bit PCM, little endian.
    S32Le,
}

impl SampleFormat {
    /// Size in bytes of a single sample in this format.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16Le => 2,
            SampleFormat::Float32Le => 4,
            SampleFormat::S32Le => 4,
        }
    }
}

/// A sample specification that fully describes the format of a sample
/// stream: encoding, channel count and sample rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleSpec {
    /// Format of individual samples.
    pub format: SampleFormat,
    /// Number of independent channels. Must be between 1 and [`CHANNELS_MAX`].
    pub channels: u8,
    /// Samples per second, per channel.
    pub sample_rate: u32,
}

/// Error constructing or validating a [`SampleSpec`] or [`ChannelMap`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleSpecError {
    /// The channel count is zero or exceeds [`CHANNELS_MAX`].
    #[error("invalid channel count {0} (must be between 1 and {CHANNELS_MAX})")]
    InvalidChannels(u8),
    /// The sample rate is zero or implausibly high.
    #[error("invalid sample rate {0} (must be between 1 and {RATE_MAX})")]
    InvalidRate(u32),
    /// A channel map's channel count doesn't match the sample spec's.
    #[error("channel map has {map_channels} channels, sample spec has {spec_channels}")]
    ChannelMismatch {
        /// Channels in the channel map.
        map_channels: u8,
        /// Channels in the sample spec.
        spec_channels: u8,
    },
}

impl SampleSpec {
    /// Creates a new sample spec, validating channel count and sample rate.
    pub fn new(
        format: SampleFormat,
        channels: u8,
        sample_rate: u32,
    ) -> Result<Self, SampleSpecError> {
        if channels == 0 || channels > CHANNELS_MAX {
            return Err(SampleSpecError::InvalidChannels(channels));
        }

        if sample_rate == 0 || sample_rate > RATE_MAX {
            return Err(SampleSpecError::InvalidRate(sample_rate));
        }

        Ok(Self {
            format,
            channels,
            sample_rate,
        })
    }

    /// Size in bytes of one frame (one sample per channel) in this spec.
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Rounds `length` down to the nearest multiple of [`Self::frame_size`].
    pub fn frame_align(&self, length: usize) -> usize {
        let fs = self.frame_size();
        if fs == 0 {
            0
        } else {
            length - (length % fs)
        }
    }

    /// Returns true if `length` is a multiple of [`Self::frame_size`].
    pub fn is_frame_aligned(&self, length: usize) -> bool {
        self.frame_size() != 0 && length % self.frame_size() == 0
    }
}

/// Channel position labels, used by [`ChannelMap`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelPosition {
    Mono,
    FrontLeft,
    FrontRight,
    FrontCenter,
    RearLeft,
    RearRight,
    RearCenter,
    Lfe,
    SideLeft,
    SideRight,
    /// Auxiliary channel, numbered from 0.
    Aux(u8),
}

/// A map from stream channels to speaker positions.
///
/// Used only for validating that a sink's channel count lines up with its
/// sample spec and cvolume; this crate does no channel remapping (that's a
/// resampler's job, out of scope per `spec.md` §1).
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelMap {
    positions: Vec<ChannelPosition>,
}

impl ChannelMap {
    /// Creates an empty channel map.
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
        }
    }

    /// Builds a standard stereo (front-left, front-right) map.
    pub fn stereo() -> Self {
        Self {
            positions: vec![ChannelPosition::FrontLeft, ChannelPosition::FrontRight],
        }
    }

    /// Builds a standard mono map.
    pub fn mono() -> Self {
        Self {
            positions: vec![ChannelPosition::Mono],
        }
    }

    /// Derives a default channel map for an arbitrary channel count,
    /// mirroring `pa_channel_map_init_auto`'s `PA_CHANNEL_MAP_DEFAULT`
    /// fallback: mono, stereo, or else aux channels.
    pub fn auto_default(channels: u8) -> Self {
        match channels {
            1 => Self::mono(),
            2 => Self::stereo(),
            n => Self {
                positions: (0..n).map(ChannelPosition::Aux).collect(),
            },
        }
    }

    /// Appends a channel position.
    pub fn push(&mut self, position: ChannelPosition) {
        self.positions.push(position);
    }

    /// Number of channels mapped.
    pub fn num_channels(&self) -> u8 {
        self.positions.len() as u8
    }

    /// Iterates over the mapped positions.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelPosition> {
        self.positions.iter()
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChannelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.positions.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_channels() {
        assert_matches::assert_matches!(
            SampleSpec::new(SampleFormat::S16Le, 0, 44100),
            Err(SampleSpecError::InvalidChannels(0))
        );
    }

    #[test]
    fn frame_align_rounds_down() {
        let spec = SampleSpec::new(SampleFormat::S16Le, 2, 44100).unwrap();
        assert_eq!(spec.frame_size(), 4);
        assert_eq!(spec.frame_align(10), 8);
        assert!(spec.is_frame_aligned(8));
        assert!(!spec.is_frame_aligned(10));
    }

    #[test]
    fn auto_default_matches_channel_count() {
        assert_eq!(ChannelMap::auto_default(1).num_channels(), 1);
        assert_eq!(ChannelMap::auto_default(2).num_channels(), 2);
        assert_eq!(ChannelMap::auto_default(6).num_channels(), 6);
    }
}
