//! Sample buffer between decoder and encoder
//!
//! Decoders emit frames of whatever size the codec produces (960 for Opus,
//! 1152 for MP3, 4096 for FLAC, ...), while the AAC encoder needs exactly
//! `frame_size` samples per call. The FIFO absorbs the difference.
//!
//! The buffer is bound to one sample format and channel layout (the
//! encoder's) and rejects frames of any other shape. Planar formats keep one
//! byte queue per channel; packed formats keep a single interleaved queue.

use std::collections::VecDeque;

use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;
use ffmpeg_next::util::frame::Audio as AudioFrame;

use crate::error::{Result, TranscodeError};
use crate::ffmpeg_utils::helpers::{audio_plane_data, audio_plane_data_mut, plane_bytes, plane_count};
use crate::ffmpeg_utils::utils::resolve_channel_layout;

use super::negotiate::StreamDescriptor;

/// Unbounded FIFO of raw samples in the encoder's format.
pub struct SampleFifo {
    format: Sample,
    layout: ChannelLayout,
    channels: usize,
    rate: u32,
    planes: Vec<VecDeque<u8>>,
    pushed: u64,
    popped: u64,
}

impl SampleFifo {
    /// Create an empty FIFO for samples shaped like `descriptor`, with room
    /// for `initial_samples` per channel before the first reallocation.
    pub fn new(descriptor: &StreamDescriptor, initial_samples: usize) -> Self {
        let channels = descriptor.channels as usize;
        let bytes = plane_bytes(descriptor.format, channels, initial_samples);
        Self {
            format: descriptor.format,
            layout: descriptor.layout,
            channels,
            rate: descriptor.rate,
            planes: (0..plane_count(descriptor.format, channels))
                .map(|_| VecDeque::with_capacity(bytes))
                .collect(),
            pushed: 0,
            popped: 0,
        }
    }

    /// Samples per channel currently queued.
    pub fn available_samples(&self) -> usize {
        (self.pushed - self.popped) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.available_samples() == 0
    }

    /// Total samples per channel ever pushed.
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    /// Total samples per channel ever popped.
    pub fn total_popped(&self) -> u64 {
        self.popped
    }

    /// Append every sample of `frame`.
    pub fn push(&mut self, frame: &AudioFrame) -> Result<()> {
        let samples = frame.samples();
        if samples == 0 {
            return Ok(());
        }
        self.check_shape(frame)?;

        let bytes = plane_bytes(self.format, self.channels, samples);
        for (index, plane) in self.planes.iter_mut().enumerate() {
            let src = audio_plane_data(frame, index);
            if src.len() < bytes {
                return Err(TranscodeError::BufferWrite(format!(
                    "plane {} holds {} bytes, expected {}",
                    index,
                    src.len(),
                    bytes
                )));
            }
            plane.try_reserve(bytes).map_err(|e| {
                TranscodeError::BufferWrite(format!("cannot grow sample buffer: {}", e))
            })?;
            plane.extend(&src[..bytes]);
        }

        self.pushed += samples as u64;
        tracing::trace!(samples, queued = self.available_samples(), "fifo push");
        Ok(())
    }

    /// Remove exactly `samples` samples per channel.
    ///
    /// Fails with `BufferRead` if fewer are queued.
    pub fn pop(&mut self, samples: usize) -> Result<AudioFrame> {
        if samples == 0 || samples > self.available_samples() {
            return Err(TranscodeError::BufferRead(format!(
                "requested {} samples, {} available",
                samples,
                self.available_samples()
            )));
        }
        self.take(samples)
    }

    /// Remove up to `max_samples` samples per channel, accepting a short
    /// final block. Returns `None` when the FIFO is empty.
    pub fn pop_remainder(&mut self, max_samples: usize) -> Result<Option<AudioFrame>> {
        let samples = self.available_samples().min(max_samples);
        if samples == 0 {
            return Ok(None);
        }
        self.take(samples).map(Some)
    }

    fn take(&mut self, samples: usize) -> Result<AudioFrame> {
        let bytes = plane_bytes(self.format, self.channels, samples);
        let mut out = AudioFrame::new(self.format, samples, self.layout);
        out.set_rate(self.rate);

        for index in 0..self.planes.len() {
            let dst = audio_plane_data_mut(&mut out, index);
            if dst.len() < bytes {
                return Err(TranscodeError::Allocation(format!(
                    "output frame plane {} holds {} bytes, expected {}",
                    index,
                    dst.len(),
                    bytes
                )));
            }
            drain_into(&mut self.planes[index], &mut dst[..bytes]);
        }

        self.popped += samples as u64;
        tracing::trace!(samples, queued = self.available_samples(), "fifo pop");
        Ok(out)
    }

    fn check_shape(&self, frame: &AudioFrame) -> Result<()> {
        let channels = frame.channels() as usize;
        let layout = resolve_channel_layout(frame.channel_layout(), channels as u16);
        if frame.format() != self.format || channels != self.channels || layout != self.layout {
            return Err(TranscodeError::BufferWrite(format!(
                "frame is {} with {} channels, buffer holds {} with {} channels",
                frame.format().name(),
                channels,
                self.format.name(),
                self.channels
            )));
        }
        if frame.rate() != 0 && frame.rate() != self.rate {
            return Err(TranscodeError::BufferWrite(format!(
                "frame rate {} Hz does not match buffer rate {} Hz",
                frame.rate(),
                self.rate
            )));
        }
        Ok(())
    }
}

/// Move the first `dst.len()` bytes of `queue` into `dst`.
fn drain_into(queue: &mut VecDeque<u8>, dst: &mut [u8]) {
    let n = dst.len();
    let (front, back) = queue.as_slices();
    let head = front.len().min(n);
    dst[..head].copy_from_slice(&front[..head]);
    if head < n {
        dst[head..].copy_from_slice(&back[..n - head]);
    }
    queue.drain(..n);
}
