//! Audio conversion pipeline
//!
//! Drives `PacketSource` → `FrameDecoder` → (`FrameResampler`) →
//! `SampleFifo` → `FrameEncoder` → `PacketSink` as an explicit state
//! machine:
//!
//! ```text
//! Reading → DecoderFlushing → BufferDraining → EncoderFlushing → Finalizing → Done
//! ```
//!
//! Full encoder frames are pulled from the FIFO as soon as they are
//! available. Only `BufferDraining` accepts a short final frame.
//!
//! Output frame timestamps are assigned here and nowhere else: the first
//! frame gets pts 0 and every following frame gets the previous pts plus the
//! previous frame's sample count, in the encoder's 1/sample_rate time base.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::frame::Audio as AudioFrame;
use serde::Serialize;

use crate::error::Result;

use super::fifo::SampleFifo;
use super::negotiate::StreamDescriptor;
use super::stages::{FrameDecoder, FrameEncoder, FrameResampler, PacketSink, PacketSource};

/// Samples per channel the FIFO reserves up front
pub const FIFO_INITIAL_SAMPLES: usize = 10240;

/// Pipeline stage currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Demuxing and decoding source packets
    Reading,
    /// Source exhausted, draining the decoder and resampler
    DecoderFlushing,
    /// Emptying the FIFO, final frame may be short
    BufferDraining,
    /// Draining packets buffered inside the encoder
    EncoderFlushing,
    /// Writing the container trailer
    Finalizing,
    Done,
}

/// Counters and stream properties reported after a successful conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub input_codec: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub encoder_format: String,
    pub resampled: bool,
    pub frame_size: usize,
    /// Packets read from every input stream
    pub packets_read: u64,
    /// Packets that did not belong to the selected audio stream
    pub packets_discarded: u64,
    pub decoded_frames: u64,
    pub decoded_samples: u64,
    pub output_frames: u64,
    /// Samples per channel submitted to the encoder
    pub encoded_samples: u64,
    pub packets_written: u64,
}

impl ConversionSummary {
    fn new(
        decoded: &StreamDescriptor,
        target: &StreamDescriptor,
        resampled: bool,
        frame_size: usize,
    ) -> Self {
        Self {
            input_codec: decoded.codec.name().to_string(),
            sample_rate: target.rate,
            channels: target.channels,
            encoder_format: target.format.name().to_string(),
            resampled,
            frame_size,
            ..Default::default()
        }
    }
}

/// One conversion, owning every stage.
///
/// Fields drop in declaration order, so on any exit path the FIFO is freed
/// first, then the resampler, decoder, encoder, source and finally the sink.
pub struct Pipeline<S, D, E, W>
where
    S: PacketSource,
    D: FrameDecoder,
    E: FrameEncoder,
    W: PacketSink,
{
    fifo: SampleFifo,
    resampler: Option<Box<dyn FrameResampler>>,
    decoder: D,
    encoder: E,
    source: S,
    sink: W,
    phase: Phase,
    frame_size: usize,
    next_pts: i64,
    last_frame_pts: i64,
    summary: ConversionSummary,
}

impl<S, D, E, W> Pipeline<S, D, E, W>
where
    S: PacketSource,
    D: FrameDecoder,
    E: FrameEncoder,
    W: PacketSink,
{
    /// Assemble a pipeline from opened stages.
    ///
    /// The sink must already have its header written.
    pub fn new(
        source: S,
        decoder: D,
        resampler: Option<Box<dyn FrameResampler>>,
        encoder: E,
        sink: W,
    ) -> Self {
        let target = encoder.descriptor();
        let frame_size = encoder.frame_size();
        let summary =
            ConversionSummary::new(&decoder.descriptor(), &target, resampler.is_some(), frame_size);

        Self {
            fifo: SampleFifo::new(&target, FIFO_INITIAL_SAMPLES.max(frame_size)),
            resampler,
            decoder,
            encoder,
            source,
            sink,
            phase: Phase::Reading,
            frame_size,
            next_pts: 0,
            last_frame_pts: 0,
            summary,
        }
    }

    /// Run every phase to completion.
    ///
    /// The first error aborts the run; the pipeline is dropped on return
    /// either way, releasing all stages.
    pub fn run(mut self) -> Result<ConversionSummary> {
        while self.phase != Phase::Done {
            let next = self.step()?;
            if next != self.phase {
                tracing::info!(from = ?self.phase, to = ?next, "pipeline phase");
            }
            self.phase = next;
        }
        Ok(self.summary)
    }

    /// Execute one unit of work in the current phase and return the next phase.
    fn step(&mut self) -> Result<Phase> {
        match self.phase {
            Phase::Reading => self.read_next_packet(),
            Phase::DecoderFlushing => {
                let frames = self.decoder.flush()?;
                self.accept_decoded(frames)?;
                if let Some(resampler) = self.resampler.as_mut() {
                    let tail = resampler.flush()?;
                    for frame in &tail {
                        self.fifo.push(frame)?;
                    }
                }
                self.drain_full_frames()?;
                Ok(Phase::BufferDraining)
            }
            Phase::BufferDraining => {
                while let Some(frame) = self.fifo.pop_remainder(self.frame_size)? {
                    self.encode_frame(frame)?;
                }
                Ok(Phase::EncoderFlushing)
            }
            Phase::EncoderFlushing => {
                let packets = self.encoder.flush()?;
                self.write_packets(packets)?;
                Ok(Phase::Finalizing)
            }
            Phase::Finalizing => {
                self.sink.write_trailer()?;
                Ok(Phase::Done)
            }
            Phase::Done => Ok(Phase::Done),
        }
    }

    fn read_next_packet(&mut self) -> Result<Phase> {
        let packet = match self.source.read_packet()? {
            Some(packet) => packet,
            None => return Ok(Phase::DecoderFlushing),
        };
        self.summary.packets_read += 1;

        if packet.stream() != self.source.audio_stream_index() {
            self.summary.packets_discarded += 1;
            return Ok(Phase::Reading);
        }

        let frames = self.decoder.decode(&packet)?;
        self.accept_decoded(frames)?;
        self.drain_full_frames()?;
        Ok(Phase::Reading)
    }

    /// Route decoded frames through the resampler (if any) into the FIFO.
    fn accept_decoded(&mut self, frames: Vec<AudioFrame>) -> Result<()> {
        for frame in frames {
            self.summary.decoded_frames += 1;
            self.summary.decoded_samples += frame.samples() as u64;

            match self.resampler.as_mut() {
                Some(resampler) => {
                    for converted in resampler.convert(frame)? {
                        self.fifo.push(&converted)?;
                    }
                }
                None => self.fifo.push(&frame)?,
            }
        }
        Ok(())
    }

    fn drain_full_frames(&mut self) -> Result<()> {
        while self.fifo.available_samples() >= self.frame_size {
            let frame = self.fifo.pop(self.frame_size)?;
            self.encode_frame(frame)?;
        }
        Ok(())
    }

    fn encode_frame(&mut self, mut frame: AudioFrame) -> Result<()> {
        let samples = frame.samples();
        frame.set_pts(Some(self.next_pts));

        let packets = self.encoder.encode(&frame)?;

        tracing::trace!(pts = self.next_pts, samples, packets = packets.len(), "encoded frame");
        self.last_frame_pts = self.next_pts;
        self.next_pts += samples as i64;
        self.summary.output_frames += 1;
        self.summary.encoded_samples += samples as u64;

        self.write_packets(packets)
    }

    fn write_packets(&mut self, packets: Vec<ffmpeg::Packet>) -> Result<()> {
        let time_base = self.encoder.time_base();
        for mut packet in packets {
            if packet.pts().is_none() {
                packet.set_pts(Some(self.last_frame_pts));
                packet.set_dts(Some(self.last_frame_pts));
            }
            self.sink.write_packet(packet, time_base)?;
            self.summary.packets_written += 1;
        }
        Ok(())
    }
}
