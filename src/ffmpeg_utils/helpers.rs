//! Safe wrappers around FFmpeg FFI calls.
//!
//! Every function in this module is `pub` and **safe** to call.  All `unsafe`
//! blocks are contained here with explicit safety arguments.  Callers outside
//! this module should never need to write `unsafe` for routine FFmpeg access.

use ffmpeg_next as ffmpeg;

// ── Codec-parameter field accessors ─────────────────────────────────────────

/// Read `sample_rate` from an `AVCodecParameters` struct.
///
/// `ffmpeg-next` does not expose this field through a safe accessor.
pub fn codec_params_sample_rate(params: &ffmpeg::codec::parameters::Parameters) -> u32 {
    // SAFETY: `params.as_ptr()` returns a valid non-null pointer for the
    // lifetime of `params`.  `sample_rate` is a plain i32 field with no
    // ownership semantics.
    unsafe { (*params.as_ptr()).sample_rate as u32 }
}

/// Read `ch_layout.nb_channels` from an `AVCodecParameters` struct.
pub fn codec_params_channels(params: &ffmpeg::codec::parameters::Parameters) -> u16 {
    // SAFETY: same as `codec_params_sample_rate`.
    unsafe { (*params.as_ptr()).ch_layout.nb_channels as u16 }
}

/// Allocate a fresh `AVCodecParameters`, copy the opened encoder context
/// into it, and return it as a safe `ffmpeg::codec::Parameters`.
///
/// Used to hand the encoder's resolved codec id, sample format, rate,
/// channel layout and extradata to the muxer's output stream.
pub fn encoder_codec_parameters(
    encoder: &ffmpeg::codec::encoder::Audio,
) -> Option<ffmpeg::codec::Parameters> {
    use std::ops::Deref;
    use std::rc::Rc;
    let ctx: &ffmpeg::codec::Context = encoder.deref();
    // SAFETY: `avcodec_parameters_alloc` returns a valid pointer or null,
    // checked below.  `avcodec_parameters_from_context` copies fields from a
    // valid, open encoder context; on failure the allocation is released
    // before returning.
    unsafe {
        let mut params = ffmpeg::ffi::avcodec_parameters_alloc();
        if params.is_null() {
            return None;
        }
        if ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr()) < 0 {
            ffmpeg::ffi::avcodec_parameters_free(&mut params);
            return None;
        }
        Some(ffmpeg::codec::Parameters::wrap(
            params,
            None::<Rc<dyn std::any::Any>>,
        ))
    }
}

// ── Container flags ─────────────────────────────────────────────────────────

/// Returns `true` if the output container stores codec headers globally
/// (in the `moov`/`esds` box for MP4) rather than in-band.
pub fn output_requires_global_header(output: &ffmpeg::format::context::Output) -> bool {
    // SAFETY: `output.as_ptr()` is valid for the lifetime of `output`, and an
    // output context created by `avformat_alloc_output_context2` always has a
    // non-null `oformat`.
    unsafe {
        let ctx = output.as_ptr();
        let oformat = (*ctx).oformat;
        !oformat.is_null() && ((*oformat).flags & ffmpeg::ffi::AVFMT_GLOBALHEADER as i32) != 0
    }
}

/// Set `AV_CODEC_FLAG_GLOBAL_HEADER` on an encoder that has not been opened yet.
pub fn encoder_set_global_header(encoder: &mut ffmpeg::codec::encoder::audio::Audio) {
    // SAFETY: the context pointer is valid for the lifetime of `encoder`;
    // `flags` is a plain int field read by `avcodec_open2`.
    unsafe {
        let ctx = encoder.as_mut_ptr();
        (*ctx).flags |= ffmpeg::ffi::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
    }
}

// ── Codec lookup ────────────────────────────────────────────────────────────

/// Returns `true` if a decoder is registered for `codec_id`.
pub fn decoder_exists(codec_id: ffmpeg::codec::Id) -> bool {
    // SAFETY: `avcodec_find_decoder` reads a global read-only registry after
    // `ffmpeg::init()`.  The returned pointer is only used for a null check.
    let ptr = unsafe { ffmpeg::ffi::avcodec_find_decoder(codec_id.into()) };
    !ptr.is_null()
}

// ── Audio plane access ──────────────────────────────────────────────────────

/// Extract an audio plane slice from an `AVFrame`.
///
/// Works around a bug in `ffmpeg-next`'s `Audio::data(index)` method where it
/// stops counting planes if `linesize[1] == 0`. In FFmpeg, planar audio frames
/// often only populate `linesize[0]` to represent the size of *every* plane.
///
/// The returned slice spans the whole (possibly padded) plane; callers slice
/// it down to `samples * bytes_per_sample` themselves.
pub fn audio_plane_data(frame: &ffmpeg::util::frame::Audio, index: usize) -> &[u8] {
    // SAFETY: `extended_data` holds `nb_channels` plane pointers for planar
    // formats and one for packed formats, each valid for `linesize[0]` bytes
    // while the frame is alive.  Out-of-range indices and null pointers
    // yield an empty slice.
    unsafe {
        let f = frame.as_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        let is_planar = frame.format().is_planar();
        if is_planar {
            if index >= channels {
                return &[];
            }
        } else if index > 0 {
            return &[];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &[];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &[];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts(plane_ptr, size)
    }
}

/// Mutable version of `audio_plane_data`.
pub fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    // SAFETY: see `audio_plane_data`; the frame is borrowed mutably so no
    // other slice into its planes can exist.
    unsafe {
        let f = frame.as_mut_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        let is_planar = frame.format().is_planar();
        if is_planar {
            if index >= channels {
                return &mut [];
            }
        } else if index > 0 {
            return &mut [];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &mut [];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &mut [];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts_mut(plane_ptr, size)
    }
}

/// Number of data planes a frame of `format` with `channels` channels has.
pub fn plane_count(format: ffmpeg::util::format::sample::Sample, channels: usize) -> usize {
    if format.is_planar() {
        channels
    } else {
        1
    }
}

/// Bytes occupied by `samples` samples in one plane.
pub fn plane_bytes(
    format: ffmpeg::util::format::sample::Sample,
    channels: usize,
    samples: usize,
) -> usize {
    if format.is_planar() {
        samples * format.bytes()
    } else {
        samples * format.bytes() * channels
    }
}
