//! Input container reader
//!
//! Opens the source file, probes its streams and selects the first audio
//! stream. Packets from every stream are returned in container order; the
//! pipeline discards the ones that do not belong to the selected stream.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::error::{Result, TranscodeError};
use crate::ffmpeg_utils::helpers::{codec_params_channels, codec_params_sample_rate};
use crate::ffmpeg_utils::utils::{codec_name, media_type_name};

use super::decoder::AudioDecoder;
use super::stages::PacketSource;

/// Demuxer over one input file with a selected audio stream
pub struct SourceReader {
    input: ffmpeg::format::context::Input,
    path: PathBuf,
    stream_index: usize,
    exhausted: bool,
}

impl SourceReader {
    /// Open `path` and select its first audio stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let input = ffmpeg::format::input(&path).map_err(|e| {
            TranscodeError::Open(format!("Failed to open {}: {}", path.display(), e))
        })?;

        for stream in input.streams() {
            let params = stream.parameters();
            tracing::debug!(
                index = stream.index(),
                medium = media_type_name(params.medium()),
                codec = codec_name(params.id()),
                "input stream"
            );
        }

        let stream = input
            .streams()
            .find(|s| s.parameters().medium() == ffmpeg::media::Type::Audio)
            .ok_or(TranscodeError::NoAudioStream)?;

        let stream_index = stream.index();
        let params = stream.parameters();

        tracing::info!(
            path = %path.display(),
            format = input.format().name(),
            stream_index,
            codec = codec_name(params.id()),
            sample_rate = codec_params_sample_rate(&params),
            channels = codec_params_channels(&params),
            "selected audio stream"
        );

        Ok(Self {
            input,
            path,
            stream_index,
            exhausted: false,
        })
    }

    /// Open a decoder for the selected stream.
    pub fn open_decoder(&self) -> Result<AudioDecoder> {
        let stream = self.input.stream(self.stream_index).ok_or_else(|| {
            TranscodeError::DecoderInit(format!("stream {} not found", self.stream_index))
        })?;
        AudioDecoder::open(&stream)
    }
}

impl PacketSource for SourceReader {
    fn audio_stream_index(&self) -> usize {
        self.stream_index
    }

    /// Any read failure other than end of file ends the input with a
    /// warning; what was decoded so far is still flushed and written.
    fn read_packet(&mut self) -> Result<Option<ffmpeg::Packet>> {
        if self.exhausted {
            return Ok(None);
        }
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg::Error::Eof) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "read error, treating as end of input"
                );
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        crate::ffmpeg_utils::init().unwrap();
        let result = SourceReader::open("/nonexistent/input.webm");
        assert!(matches!(result, Err(TranscodeError::Open(_))));
    }

    #[test]
    fn test_open_garbage_file() {
        crate::ffmpeg_utils::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, [0x5au8; 64]).unwrap();
        let result = SourceReader::open(&path);
        assert!(matches!(result, Err(TranscodeError::Open(_))));
    }
}
