//! Audio resampler for the transcoding pipeline
//!
//! Converts decoded PCM frames to the sample format, rate and channel layout
//! the AAC encoder was opened with. Only built when negotiation finds a
//! difference.

use crate::error::{Result, TranscodeError};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;

use super::negotiate::{ResamplerFactory, StreamDescriptor};
use super::stages::FrameResampler;

/// Audio resampler wrapping FFmpeg's `SwrContext`
pub struct AudioResampler {
    context: resampling::Context,
    /// Layout the context was configured with; frames are tagged with it
    input_layout: ChannelLayout,
    output_rate: u32,
}

impl AudioResampler {
    /// Create a resampler converting `from` samples into `to` samples.
    pub fn new(from: &StreamDescriptor, to: &StreamDescriptor) -> Result<Self> {
        let context = resampling::Context::get(
            from.format,
            from.layout,
            from.rate,
            to.format,
            to.layout,
            to.rate,
        )
        .map_err(|e| {
            TranscodeError::ResamplerInit(format!(
                "Failed to create resampling context {} -> {}: {}",
                from, to, e
            ))
        })?;

        Ok(Self {
            context,
            input_layout: from.layout,
            output_rate: to.rate,
        })
    }

    /// The output sample rate.
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }
}

impl FrameResampler for AudioResampler {
    /// Convert one input PCM frame.
    ///
    /// Returns an empty `Vec` when the resampler needs more input to produce
    /// output (can happen at stream start/end with certain sample rates).
    fn convert(
        &mut self,
        mut frame: ffmpeg::util::frame::Audio,
    ) -> Result<Vec<ffmpeg::util::frame::Audio>> {
        // swr_convert_frame rejects a frame whose layout differs from the
        // configured one, and WAV/PCM decoders leave the layout unspecified.
        if frame.channel_layout() != self.input_layout {
            frame.set_channel_layout(self.input_layout);
        }

        // Output frame must be empty: swr_convert_frame allocates the
        // correct buffer (format/rate/channels) from the SwrContext config.
        let mut out = ffmpeg::util::frame::Audio::empty();

        self.context
            .run(&frame, &mut out)
            .map_err(|e| TranscodeError::Decode(format!("Resampling error: {}", e)))?;

        if out.samples() == 0 {
            return Ok(vec![]);
        }

        Ok(vec![out])
    }

    /// Flush any remaining samples from the internal resampler buffer.
    ///
    /// When source and output rates match, the SwrContext has nothing
    /// buffered and `flush()` may return an error; that is treated as an
    /// empty flush.
    fn flush(&mut self) -> Result<Vec<ffmpeg::util::frame::Audio>> {
        let mut out = ffmpeg::util::frame::Audio::empty();
        if let Err(e) = self.context.flush(&mut out) {
            tracing::debug!("Resampler flush returned non-fatal error: {}", e);
            return Ok(vec![]);
        }

        if out.samples() == 0 {
            return Ok(vec![]);
        }

        Ok(vec![out])
    }
}

/// Builds `SwrContext`-backed resamplers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwrResamplerFactory;

impl ResamplerFactory for SwrResamplerFactory {
    fn create(
        &self,
        from: &StreamDescriptor,
        to: &StreamDescriptor,
    ) -> Result<Box<dyn FrameResampler>> {
        Ok(Box::new(AudioResampler::new(from, to)?))
    }
}
