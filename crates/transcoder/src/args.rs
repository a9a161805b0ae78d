//! ffmpeg command line for the HLS stream-copy output.

use std::path::Path;

use crate::hls::{SEGMENT_PATTERN, VARIANT_PLAYLIST};

/// Inputs of one stream job, already resolved to absolute paths.
#[derive(Debug, Clone, Copy)]
pub struct StreamInputs<'a> {
    pub video: &'a Path,
    pub subtitle: Option<&'a Path>,
    pub subtitle_delay_secs: f64,
}

/// `-itsoffset` value for a subtitle delay. Zero means no shift at all.
pub fn subtitle_offset(delay_secs: f64) -> Option<String> {
    if delay_secs == 0.0 {
        None
    } else {
        Some(delay_secs.to_string())
    }
}

/// Build the ffmpeg argument list. Arguments are passed to the process
/// as a list, never joined into a shell string.
pub fn build_ffmpeg_args(inputs: &StreamInputs<'_>, output_dir: &Path, segment_secs: u32) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostats".into(),
        "-loglevel".into(),
        "warning".into(),
        "-y".into(),
    ];

    args.extend(["-i".into(), inputs.video.to_string_lossy().into_owned()]);

    if let Some(subtitle) = inputs.subtitle {
        // -itsoffset applies to the input that follows it
        if let Some(offset) = subtitle_offset(inputs.subtitle_delay_secs) {
            args.extend(["-itsoffset".into(), offset]);
        }
        args.extend(["-i".into(), subtitle.to_string_lossy().into_owned()]);
    }

    args.extend([
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "0:a?".into(),
    ]);
    if inputs.subtitle.is_some() {
        args.extend(["-map".into(), "1:0".into()]);
    }

    args.extend([
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "copy".into(),
    ]);
    if inputs.subtitle.is_some() {
        args.extend(["-c:s".into(), "webvtt".into()]);
    }

    let seg_pattern = output_dir.join(SEGMENT_PATTERN);
    let variant = output_dir.join(VARIANT_PLAYLIST);

    args.extend([
        "-f".into(),
        "hls".into(),
        "-start_number".into(),
        "0".into(),
        "-hls_time".into(),
        segment_secs.to_string(),
        "-hls_list_size".into(),
        "0".into(),
        "-hls_segment_filename".into(),
        seg_pattern.to_string_lossy().into_owned(),
        variant.to_string_lossy().into_owned(),
    ]);

    args
}
