//! Capabilities the pipeline needs from each stage
//!
//! The FFmpeg-backed implementations live next to this module
//! (`source`, `decoder`, `resampler`, `encoder`, `muxer`). Each drain
//! returns a finite `Vec`: "no output yet" is an empty vector, never an
//! error.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::frame::Audio as AudioFrame;

use crate::error::Result;

use super::negotiate::StreamDescriptor;

/// Demuxed compressed packets, in container order.
pub trait PacketSource {
    /// Index of the selected audio stream.
    fn audio_stream_index(&self) -> usize;

    /// Next packet from any stream, or `None` once the input is exhausted.
    fn read_packet(&mut self) -> Result<Option<ffmpeg::Packet>>;
}

/// Turns compressed packets into decoded sample blocks.
pub trait FrameDecoder {
    /// Resolved output format of the decoder.
    fn descriptor(&self) -> StreamDescriptor;

    /// Submit one packet and drain every frame it makes available.
    fn decode(&mut self, packet: &ffmpeg::Packet) -> Result<Vec<AudioFrame>>;

    /// Signal end of stream and drain the remaining buffered frames.
    fn flush(&mut self) -> Result<Vec<AudioFrame>>;
}

/// Converts sample blocks between formats, rates and layouts.
pub trait FrameResampler {
    /// Takes the decoded frame by value; the resampler may relabel it.
    fn convert(&mut self, frame: AudioFrame) -> Result<Vec<AudioFrame>>;

    /// Drain samples still held by the resampler's filter history.
    fn flush(&mut self) -> Result<Vec<AudioFrame>>;
}

/// Turns fixed-size sample blocks into compressed packets.
pub trait FrameEncoder {
    /// Format, rate and layout the encoder was opened with.
    fn descriptor(&self) -> StreamDescriptor;

    /// Samples per channel required in every frame except the last.
    fn frame_size(&self) -> usize;

    fn time_base(&self) -> ffmpeg::Rational;

    /// Submit one frame and drain every packet it makes available.
    fn encode(&mut self, frame: &AudioFrame) -> Result<Vec<ffmpeg::Packet>>;

    /// Signal end of input and drain all remaining packets. Called once.
    fn flush(&mut self) -> Result<Vec<ffmpeg::Packet>>;
}

/// Accepts compressed packets for the output container.
pub trait PacketSink {
    /// Write one packet whose timestamps are in `time_base`.
    fn write_packet(&mut self, packet: ffmpeg::Packet, time_base: ffmpeg::Rational)
        -> Result<()>;

    /// Finish the container. Must be the last write.
    fn write_trailer(&mut self) -> Result<()>;
}
