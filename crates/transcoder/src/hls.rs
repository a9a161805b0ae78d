//! HLS file names, content types and the master playlist.

/// Master playlist written by the launcher.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Media playlist written by ffmpeg.
pub const VARIANT_PLAYLIST: &str = "output.m3u8";

/// Subtitle rendition playlist ffmpeg derives from the variant name.
pub const SUBTITLE_PLAYLIST: &str = "output_vtt.m3u8";

pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";

/// Content-Type for HLS master/variant playlists.
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Content-Type for MPEG-TS segments.
pub const SEGMENT_CONTENT_TYPE_TS: &str = "video/MP2T";

/// Content-Type for fMP4 segments.
pub const SEGMENT_CONTENT_TYPE_MP4: &str = "video/mp4";

/// Content-Type for WebVTT subtitle segments.
pub const SUBTITLE_CONTENT_TYPE: &str = "text/vtt";

/// Extensions of files produced into the output directory.
pub const OUTPUT_EXTENSIONS: &[&str] = &["m3u8", "ts", "m4s", "mp4", "vtt"];

/// Determine content type from filename extension.
pub fn content_type(filename: &str) -> &'static str {
    if filename.ends_with(".m3u8") {
        PLAYLIST_CONTENT_TYPE
    } else if filename.ends_with(".vtt") {
        SUBTITLE_CONTENT_TYPE
    } else if filename.ends_with(".m4s") || filename.ends_with(".mp4") {
        SEGMENT_CONTENT_TYPE_MP4
    } else {
        SEGMENT_CONTENT_TYPE_TS
    }
}

/// Whether a file name is something ffmpeg or the launcher writes.
pub fn is_output_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && OUTPUT_EXTENSIONS.contains(&ext))
}

/// Master playlist pointing at the variant and, with subtitles, the
/// WebVTT rendition group.
pub fn master_playlist(with_subtitles: bool) -> String {
    let mut out = String::from("#EXTM3U\n\n");
    if with_subtitles {
        out.push_str(&format!(
            "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",NAME=\"Subtitles\",DEFAULT=YES,AUTOSELECT=YES,URI=\"{SUBTITLE_PLAYLIST}\"\n\n"
        ));
        out.push_str("#EXT-X-STREAM-INF:BANDWIDTH=800000,SUBTITLES=\"subs\"\n");
    } else {
        out.push_str("#EXT-X-STREAM-INF:BANDWIDTH=800000\n");
    }
    out.push_str(VARIANT_PLAYLIST);
    out.push('\n');
    out
}
