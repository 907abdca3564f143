//! Per-channel volume and mute representation.
//!
//! Adapted from the wire-protocol volume type: the cubic linear/dB scale
//! and the per-channel vector are kept, the tagstruct read/write impls are
//! dropped (no wire encoding happens in this crate).

use std::fmt;

use crate::sample::CHANNELS_MAX;

const VOLUME_NORM: u32 = 0x10000;
const VOLUME_MUTED: u32 = 0;
const VOLUME_MAX: u32 = u32::MAX / 2;

/// Volume for a single channel.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Volume(u32);

impl Volume {
    /// The normal volume (100%, 0 dB, no attenuation, no amplification).
    pub const NORM: Self = Volume(VOLUME_NORM);

    /// The muted volume (0%, -Inf dB).
    pub const MUTED: Self = Volume(VOLUME_MUTED);

    /// Raw volume value as sent internally. Not useful for user presentation.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Builds a volume from a raw value, clamping it to the valid range.
    pub fn from_u32_clamped(raw: u32) -> Self {
        Volume(raw.min(VOLUME_MAX))
    }

    /// Amplification/attenuation in decibels for this volume.
    pub fn to_db(&self) -> f32 {
        self.to_linear().log10() * 20.0
    }

    /// Converts to a linear volume: 0.0 is mute, 1.0 is 0 dB / 100%, and
    /// values beyond 1.0 indicate amplification.
    pub fn to_linear(&self) -> f32 {
        // Cubic scale, matching how PulseAudio maps its internal volume
        // range to perceived loudness.
        let f = self.0 as f32 / VOLUME_NORM as f32;
        f * f * f
    }

    /// Builds a volume from a linear value, clamping to the valid range.
    pub fn from_linear(linear: f32) -> Self {
        let raw = (linear.cbrt() * VOLUME_NORM as f32) as u32;
        Volume(raw.min(VOLUME_MAX))
    }

    /// Multiplies two volumes (used to combine a soft volume with a
    /// per-input volume before mixing).
    pub fn multiply(self, other: Self) -> Self {
        let a = self.0 as u64;
        let b = other.0 as u64;
        Volume::from_u32_clamped(((a * b) / VOLUME_NORM as u64) as u32)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume::NORM
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} dB", self.to_db())
    }
}

impl fmt::Debug for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Volume")
            .field(&format!(
                "raw={:.2}, linear={:.2}, {:.1} dB",
                self.0 as f32 / VOLUME_NORM as f32,
                self.to_linear(),
                self.to_db()
            ))
            .finish()
    }
}

/// Per-channel volume setting (`cvolume`).
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelVolume {
    volumes: Vec<Volume>,
}

impl ChannelVolume {
    /// An empty `ChannelVolume` specifying no volumes for any channel.
    pub fn empty() -> Self {
        Self {
            volumes: Vec::new(),
        }
    }

    /// A `ChannelVolume` with `channels` channels, all muted.
    pub fn muted(channels: u8) -> Self {
        Self {
            volumes: vec![Volume::MUTED; channels as usize],
        }
    }

    /// A `ChannelVolume` with `channels` channels, all at full (unit) volume.
    pub fn norm(channels: u8) -> Self {
        Self {
            volumes: vec![Volume::NORM; channels as usize],
        }
    }

    /// Appends a per-channel volume, up to [`CHANNELS_MAX`] channels.
    pub fn push(&mut self, volume: Volume) {
        if self.volumes.len() < CHANNELS_MAX as usize {
            self.volumes.push(volume);
        }
    }

    /// The per-channel volumes.
    pub fn channels(&self) -> &[Volume] {
        &self.volumes
    }

    /// Number of channels this cvolume covers.
    pub fn num_channels(&self) -> u8 {
        self.volumes.len() as u8
    }

    /// True if every channel is at unit (normal) volume.
    pub fn is_norm(&self) -> bool {
        self.volumes.iter().all(|v| *v == Volume::NORM)
    }

    /// True if every channel is muted (zero volume).
    pub fn is_muted(&self) -> bool {
        self.volumes.iter().all(|v| *v == Volume::MUTED)
    }

    /// Multiplies each channel of `self` by the corresponding channel of
    /// `other`. If the two have different channel counts, the shorter one's
    /// last value is reused for the remaining channels (matching
    /// `pa_sw_cvolume_multiply`'s behavior of tolerating width mismatches
    /// between two already-validated cvolumes).
    pub fn multiply(&self, other: &ChannelVolume) -> ChannelVolume {
        let n = self.num_channels().max(other.num_channels());
        let mut out = Vec::with_capacity(n as usize);
        for i in 0..n as usize {
            let a = self.volumes.get(i).or(self.volumes.last()).copied();
            let b = other.volumes.get(i).or(other.volumes.last()).copied();
            out.push(match (a, b) {
                (Some(a), Some(b)) => a.multiply(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => Volume::NORM,
            });
        }
        ChannelVolume { volumes: out }
    }
}

impl Default for ChannelVolume {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ChannelVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.volumes.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Volume::NORM.to_linear(), 1.0);
        assert_eq!(Volume::MUTED.to_linear(), 0.0);
        assert_eq!(Volume::NORM.to_db(), 0.0);
        assert_eq!(Volume::MUTED.to_db(), f32::NEG_INFINITY);
    }

    #[test]
    fn multiply_unit_is_identity() {
        let v = Volume::from_linear(0.5);
        assert_eq!(v.multiply(Volume::NORM), v);
    }

    #[test]
    fn multiply_mute_is_mute() {
        let v = Volume::from_linear(0.5);
        assert_eq!(v.multiply(Volume::MUTED), Volume::MUTED);
    }

    #[test]
    fn cvolume_is_norm_and_is_muted() {
        assert!(ChannelVolume::norm(2).is_norm());
        assert!(!ChannelVolume::norm(2).is_muted());
        assert!(ChannelVolume::muted(2).is_muted());
        assert!(!ChannelVolume::muted(2).is_norm());
    }

    #[test]
    fn cvolume_multiply_elementwise() {
        let mut a = ChannelVolume::empty();
        a.push(Volume::NORM);
        a.push(Volume::from_linear(0.5));

        let b = ChannelVolume::norm(2);
        let c = a.multiply(&b);
        assert_eq!(c.channels(), a.channels());
    }
}
