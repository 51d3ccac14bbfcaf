//! Format negotiation between decoder output and encoder input
//!
//! The encoder dictates the sample format it wants; sample rate and
//! channel layout are passed through from the source. A resampler is only
//! built when the decoded samples differ from that target in at least one
//! of format, rate or layout.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

use crate::error::Result;

use super::stages::FrameResampler;

/// Codec identity and sample shape of one side of the pipeline.
///
/// Captured once when the corresponding codec is opened and never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamDescriptor {
    pub codec: ffmpeg::codec::Id,
    pub format: Sample,
    pub rate: u32,
    pub layout: ChannelLayout,
    pub channels: u16,
}

impl StreamDescriptor {
    /// True when both sides carry samples of the same format, rate and layout.
    pub fn same_samples(&self, other: &StreamDescriptor) -> bool {
        self.format == other.format && self.rate == other.rate && self.layout == other.layout
    }
}

impl std::fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}Hz {}ch",
            self.codec.name(),
            self.format.name(),
            self.rate,
            self.channels
        )
    }
}

/// Outcome of comparing decoded samples against the encoder's requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// Decoded frames go straight into the sample buffer.
    Passthrough,
    /// Decoded frames must be converted first.
    Resample,
}

/// Compare the decoder's output against the encoder's input requirements.
pub fn decide(decoded: &StreamDescriptor, target: &StreamDescriptor) -> Negotiation {
    if decoded.same_samples(target) {
        Negotiation::Passthrough
    } else {
        Negotiation::Resample
    }
}

/// Builds resamplers on demand.
///
/// Injected into [`negotiate`] so the passthrough path can be observed
/// without a real `SwrContext`.
pub trait ResamplerFactory {
    fn create(
        &self,
        from: &StreamDescriptor,
        to: &StreamDescriptor,
    ) -> Result<Box<dyn FrameResampler>>;
}

/// Decide whether a resampler is needed and build it if so.
///
/// Returns `None` on the passthrough path; the factory is not called.
pub fn negotiate(
    decoded: &StreamDescriptor,
    target: &StreamDescriptor,
    factory: &dyn ResamplerFactory,
) -> Result<Option<Box<dyn FrameResampler>>> {
    match decide(decoded, target) {
        Negotiation::Passthrough => {
            tracing::debug!(format = %decoded, "decoder output matches encoder input, no resampler");
            Ok(None)
        }
        Negotiation::Resample => {
            tracing::debug!(from = %decoded, to = %target, "creating resampler");
            factory.create(decoded, target).map(Some)
        }
    }
}
