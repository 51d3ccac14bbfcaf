//! Audio transcoding module
//!
//! This module converts one audio stream to AAC:
//! - Source demuxing and audio stream selection
//! - Audio decoder initialization from the source stream
//! - Format negotiation and optional resampling to the encoder's format
//! - Sample FIFO regrouping decoded frames into encoder-sized frames
//! - AAC encoder initialization
//! - MP4 muxing
//! - The pipeline state machine driving all of the above

pub mod decoder;
pub mod encoder;
pub mod fifo;
pub mod muxer;
pub mod negotiate;
pub mod pipeline;
pub mod resampler;
pub mod source;
pub mod stages;
