//! In-memory stages for exercising the pipeline without media files
//!
//! Every mock shares a [`Recorder`] so a test can inspect the order in
//! which the pipeline touched the encoder and the sink after `run()` has
//! consumed them.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi::{AVChannelLayout, AVChannelLayout__bindgen_ty_1, AVChannelOrder};
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};
use ffmpeg_next::util::frame::Audio as AudioFrame;

use crate::error::{Result, TranscodeError};
use crate::ffmpeg_utils::helpers::{audio_plane_data, audio_plane_data_mut};
use crate::transcode::negotiate::{ResamplerFactory, StreamDescriptor};
use crate::transcode::stages::{
    FrameDecoder, FrameEncoder, FrameResampler, PacketSink, PacketSource,
};

// ── Frame builders ──────────────────────────────────────────────────────────

const FLTP: Sample = Sample::F32(Type::Planar);

fn layout_for(channels: u16) -> ChannelLayout {
    ChannelLayout::default(channels as i32)
}

/// Layout carrying only a channel count, as WAV and raw PCM demuxers report.
pub fn unspecified_layout(channels: u16) -> ChannelLayout {
    ChannelLayout(AVChannelLayout {
        order: AVChannelOrder::AV_CHANNEL_ORDER_UNSPEC,
        nb_channels: channels as i32,
        u: AVChannelLayout__bindgen_ty_1 { mask: 0 },
        opaque: std::ptr::null_mut(),
    })
}

/// Planar float descriptor as produced by most lossy decoders.
pub fn fltp_descriptor(rate: u32, channels: u16) -> StreamDescriptor {
    StreamDescriptor {
        codec: ffmpeg::codec::Id::PCM_F32LE,
        format: FLTP,
        rate,
        layout: layout_for(channels),
        channels,
    }
}

/// Planar float frame; every channel holds `first, first + 1, ...`.
pub fn fltp_frame(channels: u16, rate: u32, samples: usize, first: f32) -> AudioFrame {
    let mut frame = AudioFrame::new(FLTP, samples, layout_for(channels));
    frame.set_rate(rate);
    for ch in 0..channels as usize {
        let plane = audio_plane_data_mut(&mut frame, ch);
        for (i, chunk) in plane[..samples * 4].chunks_exact_mut(4).enumerate() {
            chunk.copy_from_slice(&(first + i as f32).to_ne_bytes());
        }
    }
    frame
}

/// Samples of channel `ch` of a planar float frame.
pub fn fltp_samples(frame: &AudioFrame, ch: usize) -> Vec<f32> {
    audio_plane_data(frame, ch)[..frame.samples() * 4]
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Packed signed 16-bit frame holding a ramp.
pub fn s16_frame(channels: u16, rate: u32, samples: usize) -> AudioFrame {
    let mut frame = AudioFrame::new(Sample::I16(Type::Packed), samples, layout_for(channels));
    frame.set_rate(rate);
    let total = samples * channels as usize;
    let plane = audio_plane_data_mut(&mut frame, 0);
    for (i, chunk) in plane[..total * 2].chunks_exact_mut(2).enumerate() {
        chunk.copy_from_slice(&((i % 2000) as i16 * 8).to_ne_bytes());
    }
    frame
}

// ── Event recorder ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Encoded { pts: i64, samples: usize },
    EncoderFlushed,
    Written { pts: i64 },
    Trailer,
}

#[derive(Debug, Default)]
struct RecorderState {
    events: Vec<Event>,
    sink_dropped: bool,
}

/// Shared log of what the pipeline did to the encoder and sink.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Rc<RefCell<RecorderState>>);

impl Recorder {
    fn push(&self, event: Event) {
        self.0.borrow_mut().events.push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().events.clone()
    }

    pub fn sink_dropped(&self) -> bool {
        self.0.borrow().sink_dropped
    }
}

// ── Stages ──────────────────────────────────────────────────────────────────

/// Source yielding empty packets; stream 0 is the audio stream.
pub struct MockSource {
    packets: VecDeque<ffmpeg::Packet>,
}

impl MockSource {
    fn packet(stream: usize) -> ffmpeg::Packet {
        let mut packet = ffmpeg::Packet::new(16);
        packet.set_stream(stream);
        packet
    }

    /// `count` audio packets and nothing else.
    pub fn audio(count: usize) -> Self {
        Self {
            packets: (0..count).map(|_| Self::packet(0)).collect(),
        }
    }

    /// `other` packets from stream 1 alternating with `audio` packets,
    /// starting with stream 1.
    pub fn interleaved(audio: usize, other: usize) -> Self {
        let mut packets = VecDeque::new();
        for i in 0..audio.max(other) {
            if i < other {
                packets.push_back(Self::packet(1));
            }
            if i < audio {
                packets.push_back(Self::packet(0));
            }
        }
        Self { packets }
    }
}

impl PacketSource for MockSource {
    fn audio_stream_index(&self) -> usize {
        0
    }

    fn read_packet(&mut self) -> Result<Option<ffmpeg::Packet>> {
        Ok(self.packets.pop_front())
    }
}

/// Decoder emitting one fixed-size planar float frame per packet.
pub struct MockDecoder {
    descriptor: StreamDescriptor,
    samples_per_packet: usize,
    flush_frames: Vec<usize>,
    fail_at: Option<usize>,
    calls: usize,
    emitted: usize,
}

impl MockDecoder {
    pub fn new(descriptor: StreamDescriptor, samples_per_packet: usize) -> Self {
        Self {
            descriptor,
            samples_per_packet,
            flush_frames: Vec::new(),
            fail_at: None,
            calls: 0,
            emitted: 0,
        }
    }

    /// Frame sizes returned when the decoder is flushed.
    pub fn with_flush(mut self, frames: Vec<usize>) -> Self {
        self.flush_frames = frames;
        self
    }

    /// Fail the decode call with this zero-based index.
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    fn frame(&mut self, samples: usize) -> AudioFrame {
        let frame = fltp_frame(
            self.descriptor.channels,
            self.descriptor.rate,
            samples,
            self.emitted as f32,
        );
        self.emitted += samples;
        frame
    }
}

impl FrameDecoder for MockDecoder {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn decode(&mut self, _packet: &ffmpeg::Packet) -> Result<Vec<AudioFrame>> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            return Err(TranscodeError::Decode(format!("mock failure at packet {}", call)));
        }
        let samples = self.samples_per_packet;
        Ok(vec![self.frame(samples)])
    }

    fn flush(&mut self) -> Result<Vec<AudioFrame>> {
        let sizes = std::mem::take(&mut self.flush_frames);
        Ok(sizes.into_iter().map(|n| self.frame(n)).collect())
    }
}

/// Resampler that passes frames through and releases `tail` extra samples
/// on flush, like a filter with history.
pub struct DelayResampler {
    channels: u16,
    rate: u32,
    tail: usize,
}

impl DelayResampler {
    pub fn new(channels: u16, rate: u32, tail: usize) -> Self {
        Self {
            channels,
            rate,
            tail,
        }
    }
}

impl FrameResampler for DelayResampler {
    fn convert(&mut self, frame: AudioFrame) -> Result<Vec<AudioFrame>> {
        Ok(vec![frame])
    }

    fn flush(&mut self) -> Result<Vec<AudioFrame>> {
        if self.tail == 0 {
            return Ok(vec![]);
        }
        let tail = std::mem::take(&mut self.tail);
        Ok(vec![fltp_frame(self.channels, self.rate, tail, 0.0)])
    }
}

/// Counts how many resamplers were requested.
#[derive(Debug, Default)]
pub struct CountingResamplerFactory {
    created: Cell<usize>,
}

impl CountingResamplerFactory {
    pub fn created(&self) -> usize {
        self.created.get()
    }
}

impl ResamplerFactory for CountingResamplerFactory {
    fn create(
        &self,
        _from: &StreamDescriptor,
        to: &StreamDescriptor,
    ) -> Result<Box<dyn FrameResampler>> {
        self.created.set(self.created.get() + 1);
        Ok(Box::new(DelayResampler::new(to.channels, to.rate, 0)))
    }
}

/// Factory whose resampler construction always fails.
pub struct FailingResamplerFactory;

impl ResamplerFactory for FailingResamplerFactory {
    fn create(
        &self,
        from: &StreamDescriptor,
        to: &StreamDescriptor,
    ) -> Result<Box<dyn FrameResampler>> {
        Err(TranscodeError::ResamplerInit(format!(
            "mock refuses {} -> {}",
            from, to
        )))
    }
}

/// Encoder that holds one frame back, emitting a packet for the previous
/// frame on each call and the last one on flush.
pub struct MockEncoder {
    descriptor: StreamDescriptor,
    frame_size: usize,
    held: Option<i64>,
    flushed: bool,
    recorder: Recorder,
}

impl MockEncoder {
    pub fn new(descriptor: StreamDescriptor, frame_size: usize, recorder: Recorder) -> Self {
        Self {
            descriptor,
            frame_size,
            held: None,
            flushed: false,
            recorder,
        }
    }

    fn packet(pts: i64) -> ffmpeg::Packet {
        let mut packet = ffmpeg::Packet::new(8);
        packet.set_pts(Some(pts));
        packet.set_dts(Some(pts));
        packet
    }
}

impl FrameEncoder for MockEncoder {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn time_base(&self) -> ffmpeg::Rational {
        ffmpeg::Rational::new(1, self.descriptor.rate as i32)
    }

    fn encode(&mut self, frame: &AudioFrame) -> Result<Vec<ffmpeg::Packet>> {
        let pts = frame.pts().unwrap_or(-1);
        self.recorder.push(Event::Encoded {
            pts,
            samples: frame.samples(),
        });
        Ok(self.held.replace(pts).map(Self::packet).into_iter().collect())
    }

    fn flush(&mut self) -> Result<Vec<ffmpeg::Packet>> {
        if self.flushed {
            return Err(TranscodeError::Encode("mock encoder flushed twice".into()));
        }
        self.flushed = true;
        self.recorder.push(Event::EncoderFlushed);
        Ok(self.held.take().map(Self::packet).into_iter().collect())
    }
}

/// Sink recording written packet timestamps and the trailer.
pub struct MockSink {
    recorder: Recorder,
    fail_after: Option<usize>,
    written: usize,
}

impl MockSink {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            fail_after: None,
            written: 0,
        }
    }

    /// Accept `count` packets, then fail every write with `Mux`.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

impl PacketSink for MockSink {
    fn write_packet(&mut self, packet: ffmpeg::Packet, _time_base: ffmpeg::Rational) -> Result<()> {
        if self.fail_after.is_some_and(|n| self.written >= n) {
            return Err(TranscodeError::Mux("mock sink full".into()));
        }
        self.written += 1;
        self.recorder.push(Event::Written {
            pts: packet.pts().unwrap_or(-1),
        });
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.recorder.push(Event::Trailer);
        Ok(())
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        self.recorder.0.borrow_mut().sink_dropped = true;
    }
}

#[test]
fn test_fltp_frame_ramp() {
    let frame = fltp_frame(2, 48000, 4, 10.0);
    assert_eq!(frame.samples(), 4);
    assert_eq!(frame.rate(), 48000);
    assert_eq!(fltp_samples(&frame, 1), vec![10.0, 11.0, 12.0, 13.0]);
}
