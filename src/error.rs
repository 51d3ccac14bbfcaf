use thiserror::Error;

/// Main error type for the transcoder.
///
/// Every variant is fatal to the conversion in progress. The "no output
/// available yet" condition reported by decoders and encoders is never
/// represented here.
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// Global FFmpeg initialization failed
    #[error("FFmpeg initialization failed: {0}")]
    Init(String),

    /// The input could not be opened or its container parsed
    #[error("Failed to open input: {0}")]
    Open(String),

    /// The input contains no audio stream
    #[error("No audio stream found in input")]
    NoAudioStream,

    /// No decoder is registered for the selected stream's codec
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The decoder context could not be configured or opened
    #[error("Failed to initialize decoder: {0}")]
    DecoderInit(String),

    /// The AAC encoder is missing or could not be opened
    #[error("Failed to initialize encoder: {0}")]
    EncoderInit(String),

    /// A resampler was required but could not be built
    #[error("Failed to initialize resampler: {0}")]
    ResamplerInit(String),

    /// The sample buffer rejected or could not store incoming samples
    #[error("Sample buffer write failed: {0}")]
    BufferWrite(String),

    /// The sample buffer holds fewer samples than requested
    #[error("Sample buffer read failed: {0}")]
    BufferRead(String),

    /// Mid-stream decoder failure
    #[error("Decoding failed: {0}")]
    Decode(String),

    /// Mid-stream encoder failure
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// The destination container could not be created
    #[error("Failed to create output: {0}")]
    OutputCreate(String),

    /// The destination header could not be written
    #[error("Failed to write header: {0}")]
    HeaderWrite(String),

    /// A packet could not be written to the destination
    #[error("Muxing error: {0}")]
    Mux(String),

    /// The destination trailer could not be written
    #[error("Failed to write trailer: {0}")]
    TrailerWrite(String),

    /// A frame, packet or buffer allocation failed
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Negative result code identifying the failing stage.
    ///
    /// Zero is reserved for success and never returned here.
    pub fn code(&self) -> i32 {
        match self {
            TranscodeError::Init(_) => -1,
            TranscodeError::Open(_) => -2,
            TranscodeError::NoAudioStream => -3,
            TranscodeError::UnsupportedCodec(_) => -4,
            TranscodeError::DecoderInit(_) => -5,
            TranscodeError::EncoderInit(_) => -6,
            TranscodeError::ResamplerInit(_) => -7,
            TranscodeError::BufferWrite(_) => -8,
            TranscodeError::BufferRead(_) => -9,
            TranscodeError::Decode(_) => -10,
            TranscodeError::Encode(_) => -11,
            TranscodeError::OutputCreate(_) => -12,
            TranscodeError::HeaderWrite(_) => -13,
            TranscodeError::Mux(_) => -14,
            TranscodeError::TrailerWrite(_) => -15,
            TranscodeError::Allocation(_) => -16,
            TranscodeError::Config(_) => -17,
            TranscodeError::Io(_) => -18,
        }
    }

    /// Stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TranscodeError::Init(_) => "init",
            TranscodeError::Open(_) => "open",
            TranscodeError::NoAudioStream => "no_audio_stream",
            TranscodeError::UnsupportedCodec(_) => "unsupported_codec",
            TranscodeError::DecoderInit(_) => "decoder_init",
            TranscodeError::EncoderInit(_) => "encoder_init",
            TranscodeError::ResamplerInit(_) => "resampler_init",
            TranscodeError::BufferWrite(_) => "buffer_write",
            TranscodeError::BufferRead(_) => "buffer_read",
            TranscodeError::Decode(_) => "decode",
            TranscodeError::Encode(_) => "encode",
            TranscodeError::OutputCreate(_) => "output_create",
            TranscodeError::HeaderWrite(_) => "header_write",
            TranscodeError::Mux(_) => "mux",
            TranscodeError::TrailerWrite(_) => "trailer_write",
            TranscodeError::Allocation(_) => "allocation",
            TranscodeError::Config(_) => "config",
            TranscodeError::Io(_) => "io",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TranscodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_negative_and_distinct() {
        let errors = vec![
            TranscodeError::Init(String::new()),
            TranscodeError::Open(String::new()),
            TranscodeError::NoAudioStream,
            TranscodeError::UnsupportedCodec(String::new()),
            TranscodeError::DecoderInit(String::new()),
            TranscodeError::EncoderInit(String::new()),
            TranscodeError::ResamplerInit(String::new()),
            TranscodeError::BufferWrite(String::new()),
            TranscodeError::BufferRead(String::new()),
            TranscodeError::Decode(String::new()),
            TranscodeError::Encode(String::new()),
            TranscodeError::OutputCreate(String::new()),
            TranscodeError::HeaderWrite(String::new()),
            TranscodeError::Mux(String::new()),
            TranscodeError::TrailerWrite(String::new()),
            TranscodeError::Allocation(String::new()),
            TranscodeError::Config(String::new()),
            TranscodeError::Io(std::io::Error::other("x")),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        assert!(codes.iter().all(|c| *c < 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display() {
        let err = TranscodeError::NoAudioStream;
        assert_eq!(err.to_string(), "No audio stream found in input");
        assert_eq!(err.kind(), "no_audio_stream");

        let err = TranscodeError::Mux("disk full".into());
        assert_eq!(err.to_string(), "Muxing error: disk full");
    }
}
