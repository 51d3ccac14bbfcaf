//! Audio decoder for the transcoding pipeline
//!
//! Wraps an FFmpeg `AVCodecContext` to decode compressed audio packets
//! (Opus, Vorbis, MP3, FLAC, PCM, …) into raw PCM `AVFrame`s.

use crate::error::{Result, TranscodeError};
use crate::ffmpeg_utils::helpers::decoder_exists;
use crate::ffmpeg_utils::utils::resolve_channel_layout;
use ffmpeg_next as ffmpeg;

use super::negotiate::StreamDescriptor;
use super::stages::FrameDecoder;

/// Real audio decoder backed by a FFmpeg codec context
pub struct AudioDecoder {
    /// The FFmpeg decoder context
    decoder: ffmpeg::decoder::Audio,
    /// Stream index in the source file
    stream_index: usize,
    codec_id: ffmpeg::codec::Id,
}

impl AudioDecoder {
    /// Open a decoder for the given stream.
    ///
    /// Uses the stream's own codec parameters to initialise the context so no
    /// external configuration is needed.
    pub fn open(stream: &ffmpeg::format::stream::Stream) -> Result<Self> {
        let stream_index = stream.index();
        let parameters = stream.parameters();
        let codec_id = parameters.id();

        if !decoder_exists(codec_id) {
            return Err(TranscodeError::UnsupportedCodec(format!(
                "no decoder for {} (stream {})",
                codec_id.name(),
                stream_index
            )));
        }

        let context = ffmpeg::codec::Context::from_parameters(parameters).map_err(|e| {
            TranscodeError::DecoderInit(format!(
                "Failed to copy codec parameters for stream {}: {}",
                stream_index, e
            ))
        })?;

        let decoder = context.decoder().audio().map_err(|e| {
            TranscodeError::DecoderInit(format!(
                "Failed to open {} decoder for stream {}: {}",
                codec_id.name(),
                stream_index,
                e
            ))
        })?;

        tracing::debug!(
            stream_index,
            codec = codec_id.name(),
            sample_rate = decoder.rate(),
            channels = decoder.channels(),
            format = decoder.format().name(),
            "decoder opened"
        );

        Ok(Self {
            decoder,
            stream_index,
            codec_id,
        })
    }

    /// Send a compressed packet to the decoder.
    ///
    /// `AVERROR_INVALIDDATA` is treated as non-fatal: the packet is skipped
    /// with a warning and decoding continues with the next one.
    pub fn send_packet(&mut self, packet: &ffmpeg::codec::packet::Packet) -> Result<()> {
        match self.decoder.send_packet(packet) {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::InvalidData) => {
                tracing::warn!(
                    stream_index = self.stream_index,
                    pts = ?packet.pts(),
                    "skipping undecodable packet"
                );
                Ok(())
            }
            Err(e) => Err(TranscodeError::Decode(format!(
                "send_packet error on stream {}: {}",
                self.stream_index, e
            ))),
        }
    }

    /// Send EOF to flush the decoder's internal buffers.
    ///
    /// EAGAIN and EOF responses are silently ignored; they mean the decoder
    /// has nothing buffered or is already finished, which is not an error.
    pub fn send_eof(&mut self) -> Result<()> {
        match self.decoder.send_eof() {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(()),
            Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(TranscodeError::Decode(format!(
                "send_eof error on stream {}: {}",
                self.stream_index, e
            ))),
        }
    }

    /// Receive one decoded PCM frame, or `None` if the decoder needs more
    /// input.
    pub fn receive_frame(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>> {
        let mut frame = ffmpeg::util::frame::Audio::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => Ok(Some(frame)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(TranscodeError::Decode(format!(
                "receive_frame error on stream {}: {}",
                self.stream_index, e
            ))),
        }
    }

    fn receive_frames(&mut self) -> Result<Vec<ffmpeg::util::frame::Audio>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.receive_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// The source stream index.
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }
}

impl FrameDecoder for AudioDecoder {
    fn descriptor(&self) -> StreamDescriptor {
        let channels = self.decoder.channels() as u16;
        StreamDescriptor {
            codec: self.codec_id,
            format: self.decoder.format(),
            rate: self.decoder.rate(),
            layout: resolve_channel_layout(self.decoder.channel_layout(), channels),
            channels,
        }
    }

    fn decode(&mut self, packet: &ffmpeg::Packet) -> Result<Vec<ffmpeg::util::frame::Audio>> {
        self.send_packet(packet)?;
        self.receive_frames()
    }

    fn flush(&mut self) -> Result<Vec<ffmpeg::util::frame::Audio>> {
        self.send_eof()?;
        self.receive_frames()
    }
}

impl std::fmt::Debug for AudioDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDecoder")
            .field("stream_index", &self.stream_index)
            .field("codec", &self.codec_id)
            .field("sample_rate", &self.decoder.rate())
            .finish_non_exhaustive()
    }
}
