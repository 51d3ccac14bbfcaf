//! AAC encoder for the transcoding pipeline
//!
//! Wraps an FFmpeg `AVCodecContext` to encode PCM frames to AAC-LC packets.
//! The encoder picks its own sample format (the first one it declares);
//! sample rate and channel layout are taken from the source.

use crate::error::{Result, TranscodeError};
use crate::ffmpeg_utils::helpers::encoder_set_global_header;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::util::format::sample::Sample;

use super::negotiate::StreamDescriptor;
use super::stages::FrameEncoder;

/// Format used when the encoder does not advertise its supported formats
pub const FALLBACK_SAMPLE_FMT: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);
/// AAC encoder frame size (number of samples per channel per frame)
pub const AAC_FRAME_SIZE: usize = 1024;

/// AAC encoder backed by a real FFmpeg codec context
pub struct AacEncoder {
    encoder: ffmpeg::encoder::Audio,
    descriptor: StreamDescriptor,
    frame_size: usize,
    time_base: ffmpeg::Rational,
    flushed: bool,
}

impl AacEncoder {
    /// Open an AAC encoder for samples shaped like `source`.
    ///
    /// `global_header` must be set when the destination container stores
    /// codec configuration out of band (MP4 does).
    pub fn open(source: &StreamDescriptor, bit_rate: usize, global_header: bool) -> Result<Self> {
        let codec = codec::encoder::find(codec::Id::AAC).ok_or_else(|| {
            TranscodeError::EncoderInit("AAC encoder not found in this FFmpeg build".into())
        })?;

        let format = first_supported_format(codec);
        let time_base = ffmpeg::Rational::new(1, source.rate as i32);

        // Build context and configure the audio encoder BEFORE opening
        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(time_base);

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            TranscodeError::EncoderInit(format!("Cannot get audio encoder handle: {}", e))
        })?;

        audio_enc.set_rate(source.rate as i32);
        audio_enc.set_format(format);
        audio_enc.set_channel_layout(source.layout);
        audio_enc.set_bit_rate(bit_rate);
        if global_header {
            encoder_set_global_header(&mut audio_enc);
        }

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            TranscodeError::EncoderInit(format!(
                "Failed to open AAC encoder ({} Hz, {} channels, {}): {}",
                source.rate,
                source.channels,
                format.name(),
                e
            ))
        })?;

        let frame_size = match encoder.frame_size() as usize {
            0 => AAC_FRAME_SIZE,
            n => n,
        };

        let descriptor = StreamDescriptor {
            codec: codec::Id::AAC,
            format,
            rate: source.rate,
            layout: source.layout,
            channels: source.channels,
        };

        tracing::debug!(
            format = format.name(),
            sample_rate = source.rate,
            channels = source.channels,
            bit_rate,
            frame_size,
            global_header,
            "AAC encoder opened"
        );

        Ok(Self {
            encoder,
            descriptor,
            frame_size,
            time_base,
            flushed: false,
        })
    }

    /// Send one PCM frame to the encoder.
    pub fn send_frame(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        self.encoder
            .send_frame(frame)
            .map_err(|e| TranscodeError::Encode(format!("AAC encoder send_frame error: {}", e)))
    }

    /// Send EOF to flush the encoder's buffered output.
    pub fn send_eof(&mut self) -> Result<()> {
        self.encoder
            .send_eof()
            .map_err(|e| TranscodeError::Encode(format!("AAC encoder send_eof error: {}", e)))
    }

    /// Receive one encoded AAC packet, or `None` if the encoder needs more input.
    pub fn receive_packet(&mut self) -> Result<Option<ffmpeg::codec::packet::Packet>> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(TranscodeError::Encode(format!(
                "AAC encoder receive_packet error: {}",
                e
            ))),
        }
    }

    fn receive_packets(&mut self) -> Result<Vec<ffmpeg::codec::packet::Packet>> {
        let mut packets = Vec::new();
        while let Some(packet) = self.receive_packet()? {
            packets.push(packet);
        }
        Ok(packets)
    }

    /// The opened encoder, for copying its parameters to the muxer.
    pub fn inner(&self) -> &ffmpeg::encoder::Audio {
        &self.encoder
    }
}

impl FrameEncoder for AacEncoder {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    fn encode(
        &mut self,
        frame: &ffmpeg::util::frame::Audio,
    ) -> Result<Vec<ffmpeg::codec::packet::Packet>> {
        self.send_frame(frame)?;
        self.receive_packets()
    }

    fn flush(&mut self) -> Result<Vec<ffmpeg::codec::packet::Packet>> {
        if self.flushed {
            return Err(TranscodeError::Encode("encoder already flushed".into()));
        }
        self.flushed = true;
        self.send_eof()?;
        self.receive_packets()
    }
}

/// First sample format the encoder declares, or FLTP if it declares none.
pub fn first_supported_format(codec: ffmpeg::Codec) -> Sample {
    codec
        .audio()
        .ok()
        .and_then(|audio| audio.formats())
        .and_then(|mut formats| formats.next())
        .unwrap_or(FALLBACK_SAMPLE_FMT)
}

/// Check whether the FFmpeg build includes an AAC encoder.
pub fn is_aac_encoder_available() -> bool {
    codec::encoder::find(codec::Id::AAC).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::{fltp_descriptor, fltp_frame};

    #[test]
    fn test_aac_encoder_available() {
        crate::ffmpeg_utils::init().unwrap();
        assert!(is_aac_encoder_available());
    }

    #[test]
    fn test_native_aac_wants_fltp() {
        crate::ffmpeg_utils::init().unwrap();
        let codec = codec::encoder::find(codec::Id::AAC).unwrap();
        // The native encoder only accepts planar float; libfdk_aac would
        // report s16 here.
        if codec.name() == "aac" {
            assert_eq!(first_supported_format(codec), FALLBACK_SAMPLE_FMT);
        }
    }

    #[test]
    fn test_aac_encoder_open() {
        crate::ffmpeg_utils::init().unwrap();
        if !is_aac_encoder_available() {
            return;
        }
        let enc = AacEncoder::open(&fltp_descriptor(48000, 2), 128_000, true).unwrap();
        assert_eq!(enc.frame_size(), AAC_FRAME_SIZE);
        assert_eq!(enc.time_base(), ffmpeg::Rational::new(1, 48000));
        assert_eq!(enc.descriptor().codec, codec::Id::AAC);
        assert_eq!(enc.descriptor().rate, 48000);
    }

    #[test]
    fn test_encode_and_flush() {
        crate::ffmpeg_utils::init().unwrap();
        if !is_aac_encoder_available() {
            return;
        }
        let mut enc = AacEncoder::open(&fltp_descriptor(44100, 1), 128_000, false).unwrap();
        let format = enc.descriptor().format;
        if format != FALLBACK_SAMPLE_FMT {
            return;
        }

        let mut packets = 0;
        for i in 0..5 {
            let mut frame = fltp_frame(1, 44100, AAC_FRAME_SIZE, 0.0);
            frame.set_pts(Some(i * AAC_FRAME_SIZE as i64));
            packets += enc.encode(&frame).unwrap().len();
        }
        packets += enc.flush().unwrap().len();
        assert!(packets >= 5, "expected at least 5 packets, got {}", packets);

        assert!(matches!(enc.flush(), Err(TranscodeError::Encode(_))));
    }
}
