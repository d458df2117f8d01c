//! Multi-channel audio frame
//!
//! A [`Frame`] is one time-aligned block of f32 samples across all
//! channels, stored channel-major in a single flat allocation. Frames are
//! value-like: produced once, handed off once, never shared between
//! concurrent owners.

/// A block of multi-channel audio samples, channel-major.
///
/// Every channel holds the same number of samples. A frame with zero
/// channels has zero samples per channel by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Vec<f32>,
    num_channels: usize,
    samples_per_channel: usize,
}

impl Frame {
    /// Create a frame with all samples zeroed.
    pub fn new(num_channels: usize, samples_per_channel: usize) -> Self {
        let samples_per_channel = if num_channels == 0 {
            0
        } else {
            samples_per_channel
        };
        Self {
            samples: vec![0.0; num_channels * samples_per_channel],
            num_channels,
            samples_per_channel,
        }
    }

    /// Build a frame from channel-major sample data.
    ///
    /// # Panics
    ///
    /// Panics if `samples.len()` is not a multiple of `num_channels`.
    pub fn from_samples(num_channels: usize, samples: Vec<f32>) -> Self {
        if num_channels == 0 {
            return Self {
                samples: Vec::new(),
                num_channels: 0,
                samples_per_channel: 0,
            };
        }
        assert!(
            samples.len() % num_channels == 0,
            "sample data not rectangular: {} samples across {} channels",
            samples.len(),
            num_channels
        );
        let samples_per_channel = samples.len() / num_channels;
        Self {
            samples,
            num_channels,
            samples_per_channel,
        }
    }

    /// Number of channels in this frame
    pub fn channel_count(&self) -> usize {
        self.num_channels
    }

    /// Number of samples in each channel (0 for a channel-less frame)
    pub fn sample_count(&self) -> usize {
        self.samples_per_channel
    }

    /// Borrow one channel's samples.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= self.channel_count()`.
    pub fn channel(&self, channel: usize) -> &[f32] {
        assert!(
            channel < self.num_channels,
            "channel {} out of range ({} channels)",
            channel,
            self.num_channels
        );
        let start = channel * self.samples_per_channel;
        &self.samples[start..start + self.samples_per_channel]
    }

    /// Mutably borrow one channel's samples.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= self.channel_count()`.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        assert!(
            channel < self.num_channels,
            "channel {} out of range ({} channels)",
            channel,
            self.num_channels
        );
        let start = channel * self.samples_per_channel;
        &mut self.samples[start..start + self.samples_per_channel]
    }

    /// Iterate over channels in order
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.num_channels).map(move |c| self.channel(c))
    }

    /// All samples, channel-major
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_frame_shape() {
        for channels in 0..4 {
            for samples in [0usize, 1, 256] {
                let frame = Frame::new(channels, samples);
                assert_eq!(frame.channel_count(), channels);
                for c in 0..channels {
                    assert_eq!(frame.channel(c).len(), frame.sample_count());
                    assert!(frame.channel(c).iter().all(|&s| s == 0.0));
                }
            }
        }
    }

    #[test]
    fn test_zero_channel_frame_has_no_samples() {
        let frame = Frame::new(0, 256);
        assert_eq!(frame.channel_count(), 0);
        assert_eq!(frame.sample_count(), 0);
        assert!(frame.samples().is_empty());
    }

    #[test]
    fn test_channel_access() {
        let mut frame = Frame::new(2, 4);
        frame.channel_mut(1).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frame.channel(0), &[0.0; 4]);
        assert_eq!(frame.channel(1), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frame.samples()[4..], [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_channel_out_of_range_panics() {
        let frame = Frame::new(2, 4);
        let _ = frame.channel(2);
    }

    #[test]
    fn test_from_samples_round_trip() {
        let data = vec![0.5, -0.5, 1.0, -1.0, 0.25, 0.75];
        let frame = Frame::from_samples(2, data.clone());
        assert_eq!(frame.sample_count(), 3);
        assert_eq!(frame.channel(0), &data[..3]);
        assert_eq!(frame.channel(1), &data[3..]);
    }

    #[test]
    #[should_panic(expected = "not rectangular")]
    fn test_from_samples_rejects_ragged_data() {
        let _ = Frame::from_samples(2, vec![0.0; 5]);
    }
}
