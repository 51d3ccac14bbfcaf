use std::path::Path;
use std::time::Instant;

use crate::config::TranscodeConfig;
use crate::error::{Result, TranscodeError};
use crate::transcode::decoder::AudioDecoder;
use crate::transcode::encoder::AacEncoder;
use crate::transcode::muxer::Mp4Writer;
use crate::transcode::negotiate::negotiate;
use crate::transcode::pipeline::Pipeline;
use crate::transcode::resampler::SwrResamplerFactory;
use crate::transcode::source::SourceReader;
use crate::transcode::stages::{FrameDecoder, FrameEncoder, FrameResampler};

pub use crate::transcode::pipeline::ConversionSummary;

/// Convert the first audio stream of `input` to AAC in an MP4 file at
/// `output`, using the default configuration.
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<ConversionSummary> {
    convert_with_config(input, output, &TranscodeConfig::default())
}

/// Convert with an explicit configuration.
///
/// On error the destination is closed and, unless
/// `discard_incomplete_output` is off, deleted.
pub fn convert_with_config<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &TranscodeConfig,
) -> Result<ConversionSummary> {
    let (input, output) = (input.as_ref(), output.as_ref());
    config.validate()?;
    crate::ffmpeg_utils::init()?;

    let started = Instant::now();
    tracing::info!(input = %input.display(), output = %output.display(), "conversion starting");

    let result = run_conversion(input, output, config);

    match &result {
        Ok(summary) => tracing::info!(
            output = %output.display(),
            codec = %summary.input_codec,
            sample_rate = summary.sample_rate,
            channels = summary.channels,
            frames = summary.output_frames,
            packets = summary.packets_written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "conversion finished"
        ),
        Err(e) => tracing::error!(
            input = %input.display(),
            kind = e.kind(),
            code = e.code(),
            "conversion failed: {}",
            e
        ),
    }
    result
}

/// Result-code form of [`convert`]: 0 on success, a negative error code
/// otherwise.
pub fn convert_status<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> i32 {
    match convert(input, output) {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

fn run_conversion(input: &Path, output: &Path, config: &TranscodeConfig) -> Result<ConversionSummary> {
    let source = SourceReader::open(input)?;
    let decoder = source.open_decoder()?;
    let writer = Mp4Writer::create(output, &config.container, config.discard_incomplete_output)?;

    Setup {
        resampler: None,
        decoder,
        encoder: None,
        source,
        writer,
    }
    .into_pipeline(config)?
    .run()
}

/// Stages opened before the pipeline exists.
///
/// Fields are declared in the pipeline's teardown order, so a failure while
/// configuring the encoder or the header still releases the destination last.
struct Setup {
    resampler: Option<Box<dyn FrameResampler>>,
    decoder: AudioDecoder,
    encoder: Option<AacEncoder>,
    source: SourceReader,
    writer: Mp4Writer,
}

impl Setup {
    fn into_pipeline(
        mut self,
        config: &TranscodeConfig,
    ) -> Result<Pipeline<SourceReader, AudioDecoder, AacEncoder, Mp4Writer>> {
        let decoded = self.decoder.descriptor();

        // The destination decides whether the encoder needs a global header.
        let global_header = self.writer.requires_global_header();
        let encoder = self
            .encoder
            .insert(AacEncoder::open(&decoded, config.bit_rate, global_header)?);
        self.resampler = negotiate(&decoded, &encoder.descriptor(), &SwrResamplerFactory)?;

        self.writer.add_stream(encoder)?;
        self.writer.write_header()?;

        tracing::debug!(
            decoded = %decoded,
            encoder = %encoder.descriptor(),
            frame_size = encoder.frame_size(),
            resampling = self.resampler.is_some(),
            "pipeline configured"
        );

        let Setup {
            resampler,
            decoder,
            encoder,
            source,
            writer,
        } = self;
        let encoder =
            encoder.ok_or_else(|| TranscodeError::EncoderInit("encoder was not opened".into()))?;
        Ok(Pipeline::new(source, decoder, resampler, encoder, writer))
    }
}
