//! MP4-family file muxer
//!
//! Owns the output container for one conversion: a single AAC stream,
//! header written once, packets interleaved by timestamp, trailer written
//! last. If the writer is dropped before the trailer, the partially written
//! file is removed.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::error::{Result, TranscodeError};
use crate::ffmpeg_utils::helpers::{encoder_codec_parameters, output_requires_global_header};

use super::encoder::AacEncoder;
use super::stages::{FrameEncoder, PacketSink};

/// Writer for one MP4/M4A output file
pub struct Mp4Writer {
    output: Option<ffmpeg::format::context::Output>,
    path: PathBuf,
    stream_index: Option<usize>,
    /// Output stream time base, known once the header is written
    time_base: Option<ffmpeg::Rational>,
    trailer_written: bool,
    discard_incomplete: bool,
}

impl Mp4Writer {
    /// Create the destination file using the muxer named `container`.
    pub fn create<P: AsRef<Path>>(
        path: P,
        container: &str,
        discard_incomplete: bool,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let output = ffmpeg::format::output_as(&path, container).map_err(|e| {
            TranscodeError::OutputCreate(format!(
                "Failed to create {} output {}: {}",
                container,
                path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %path.display(), container, "output container created");

        Ok(Self {
            output: Some(output),
            path,
            stream_index: None,
            time_base: None,
            trailer_written: false,
            discard_incomplete,
        })
    }

    /// True when the container keeps codec configuration out of band.
    pub fn requires_global_header(&self) -> bool {
        self.output
            .as_ref()
            .map(output_requires_global_header)
            .unwrap_or(false)
    }

    /// Add the single audio stream, configured from the opened encoder.
    pub fn add_stream(&mut self, encoder: &AacEncoder) -> Result<usize> {
        let params = encoder_codec_parameters(encoder.inner()).ok_or_else(|| {
            TranscodeError::Allocation("Failed to copy encoder parameters".into())
        })?;
        let time_base = ffmpeg::Rational::new(1, encoder.descriptor().rate as i32);

        let output = self.output_mut()?;
        let mut stream = output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| TranscodeError::OutputCreate(format!("Failed to add audio stream: {}", e)))?;
        stream.set_parameters(params);
        stream.set_time_base(time_base);

        let index = stream.index();
        self.stream_index = Some(index);

        tracing::debug!(stream_index = index, "added audio output stream");
        Ok(index)
    }

    /// Write the container header. The muxer may replace the stream time base.
    pub fn write_header(&mut self) -> Result<()> {
        let index = self
            .stream_index
            .ok_or_else(|| TranscodeError::HeaderWrite("no output stream configured".into()))?;

        let output = self.output_mut()?;
        output
            .write_header()
            .map_err(|e| TranscodeError::HeaderWrite(format!("Failed to write header: {}", e)))?;

        let time_base = output
            .stream(index)
            .map(|s| s.time_base())
            .ok_or_else(|| TranscodeError::HeaderWrite(format!("stream {} vanished", index)))?;
        self.time_base = Some(time_base);

        tracing::debug!(time_base = %time_base, "header written");
        Ok(())
    }

    /// Output stream time base, once the header has been written.
    pub fn time_base(&self) -> Option<ffmpeg::Rational> {
        self.time_base
    }

    fn output_mut(&mut self) -> Result<&mut ffmpeg::format::context::Output> {
        self.output
            .as_mut()
            .ok_or_else(|| TranscodeError::Mux("output already closed".into()))
    }
}

impl PacketSink for Mp4Writer {
    fn write_packet(&mut self, mut packet: ffmpeg::Packet, time_base: ffmpeg::Rational) -> Result<()> {
        let (index, out_tb) = match (self.stream_index, self.time_base) {
            (Some(index), Some(tb)) => (index, tb),
            _ => return Err(TranscodeError::Mux("packet written before header".into())),
        };
        if self.trailer_written {
            return Err(TranscodeError::Mux("packet written after trailer".into()));
        }

        packet.set_stream(index);
        packet.set_position(-1);
        packet.rescale_ts(time_base, out_tb);

        let output = self.output_mut()?;
        packet
            .write_interleaved(output)
            .map_err(|e| TranscodeError::Mux(format!("Failed to write packet: {}", e)))
    }

    fn write_trailer(&mut self) -> Result<()> {
        if self.time_base.is_none() {
            return Err(TranscodeError::TrailerWrite(
                "trailer requested before header".into(),
            ));
        }
        if self.trailer_written {
            return Ok(());
        }
        let output = self.output_mut()?;
        output
            .write_trailer()
            .map_err(|e| TranscodeError::TrailerWrite(format!("Failed to write trailer: {}", e)))?;
        self.trailer_written = true;
        tracing::debug!(path = %self.path.display(), "trailer written");
        Ok(())
    }
}

impl Drop for Mp4Writer {
    fn drop(&mut self) {
        // Close the file before removing it
        drop(self.output.take());

        if !self.trailer_written && self.discard_incomplete {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {
                    tracing::debug!(path = %self.path.display(), "removed incomplete output")
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove incomplete output"
                ),
            }
        }
    }
}
