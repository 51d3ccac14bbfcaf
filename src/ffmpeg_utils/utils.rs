//! FFmpeg utility functions

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;

/// Get the codec name for a codec ID
pub fn codec_name(codec_id: ffmpeg::codec::Id) -> &'static str {
    codec_id.name()
}

/// Get the media type name
pub fn media_type_name(media_type: ffmpeg::media::Type) -> &'static str {
    match media_type {
        ffmpeg::media::Type::Video => "video",
        ffmpeg::media::Type::Audio => "audio",
        ffmpeg::media::Type::Subtitle => "subtitle",
        ffmpeg::media::Type::Data => "data",
        ffmpeg::media::Type::Attachment => "attachment",
        _ => "unknown",
    }
}

/// Resolve an unspecified channel layout from the channel count.
///
/// Decoders for some containers report only a channel count; the
/// resampler and encoder both need a concrete layout. Counts without a
/// named layout still get one with the right number of channels.
pub fn resolve_channel_layout(layout: ChannelLayout, channels: u16) -> ChannelLayout {
    if !layout.is_empty() {
        return layout;
    }
    ChannelLayout::default(channels as i32)
}
