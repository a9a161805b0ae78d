//! Server-rendered browse page.

use std::fmt::Write;

use axum::http::StatusCode;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reelcast_core::error::ApiError;
use reelcast_core::types::{EntryKind, JobState};
use reelcast_scanner::Listing;
use reelcast_transcoder::hls::MASTER_PLAYLIST;
use reelcast_transcoder::launcher::{DEFAULT_SUBTITLE_DELAY_SECS, StreamStatus};

use crate::session::Selection;

/// Escape text for HTML element and attribute content.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Query component encoding; unreserved characters and `/` stay literal.
pub const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

fn browse_href(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        format!("/?path={}", utf8_percent_encode(path, QUERY_COMPONENT))
    }
}

fn select_href(kind: EntryKind, path: &str) -> String {
    format!(
        "/select?type={}&path={}",
        kind.as_str(),
        utf8_percent_encode(path, QUERY_COMPONENT)
    )
}

pub fn render_browse(listing: &Listing, selection: &Selection, status: &StreamStatus) -> String {
    let mut html = String::new();
    let title = if listing.path.is_empty() {
        "/".to_string()
    } else {
        escape(&listing.path)
    };

    let _ = write!(
        html,
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>reelcast - {title}</title></head><body>\n<h1>Browse {title}</h1>\n"
    );

    if let Some(video) = &selection.video {
        let _ = writeln!(html, "<p>Video: {}</p>", escape(video));
    }
    if let Some(subtitle) = &selection.subtitle {
        let _ = writeln!(html, "<p>Subtitle: {}</p>", escape(subtitle));
    }

    let delay = selection.delay.unwrap_or(DEFAULT_SUBTITLE_DELAY_SECS);
    let _ = writeln!(
        html,
        "<form action=\"/start\" method=\"post\">\n  Delay (s): <input name=\"delay\" value=\"{delay}\">\n  <label><input type=\"checkbox\" name=\"force\" value=\"true\"> replace running stream</label>\n  <input type=\"submit\" value=\"Start Streaming\">\n</form>"
    );

    render_status(&mut html, status);

    html.push_str("<ul>\n");
    if let Some(parent) = &listing.parent {
        let _ = writeln!(html, "  <li><a href=\"{}\">..</a></li>", escape(&browse_href(parent)));
    }
    for entry in &listing.entries {
        let name = escape(&entry.name);
        let line = match entry.kind {
            EntryKind::Directory => format!(
                "[DIR] <a href=\"{}\">{name}</a>",
                escape(&browse_href(&entry.path))
            ),
            EntryKind::Video | EntryKind::Subtitle => format!(
                "{name} - <a href=\"{}\">select {}</a>",
                escape(&select_href(entry.kind, &entry.path)),
                entry.kind
            ),
            EntryKind::Other => name,
        };
        let _ = writeln!(html, "  <li>{line}</li>");
    }
    html.push_str("</ul>\n</body></html>\n");
    html
}

fn render_status(html: &mut String, status: &StreamStatus) {
    let _ = write!(html, "<section><p>Stream: {}", status.state);
    if let Some(job) = &status.job {
        let _ = write!(html, " ({})", escape(&job.meta.request.video_path));
    }
    html.push_str("</p>\n");

    if status.state.is_active() {
        let _ = writeln!(
            html,
            "<p>Playlist: <a href=\"/stream/{MASTER_PLAYLIST}\">/stream/{MASTER_PLAYLIST}</a></p>\n<form action=\"/stop\" method=\"post\"><input type=\"submit\" value=\"Stop\"></form>"
        );
    }

    if status.state == JobState::Crashed {
        if let Some(error) = &status.error {
            let _ = writeln!(html, "<p><strong>{}</strong></p>", escape(error));
        }
        if !status.diagnostics.is_empty() {
            let _ = writeln!(html, "<pre>{}</pre>", escape(&status.diagnostics.join("\n")));
        }
    }
    html.push_str("</section>\n");
}

/// Error page for the form flow, with a link back to the browser.
pub fn render_error(status: StatusCode, error: &ApiError) -> String {
    let mut html = String::new();
    let _ = writeln!(
        html,
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>reelcast - error</title></head><body>\n<h1>{}</h1>\n<p>{}</p>",
        status.as_u16(),
        escape(&error.to_string())
    );
    if let ApiError::LaunchFailed { diagnostics, .. } = error {
        if !diagnostics.is_empty() {
            let _ = writeln!(html, "<pre>{}</pre>", escape(&diagnostics.join("\n")));
        }
    }
    html.push_str("<p><a href=\"/\">Back</a></p>\n</body></html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcast_scanner::BrowseEntry;

    fn idle() -> StreamStatus {
        StreamStatus {
            state: JobState::Idle,
            job: None,
            exit_code: None,
            diagnostics: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn escaping() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(browse_href("My Show/ep 1&2"), "/?path=My%20Show/ep%201%262");
        assert_eq!(
            select_href(EntryKind::Subtitle, "é.srt"),
            "/select?type=subtitle&path=%C3%A9.srt"
        );
    }

    #[test]
    fn page_lists_entries_with_links() {
        let listing = Listing {
            path: "show".into(),
            parent: Some(String::new()),
            entries: vec![
                BrowseEntry {
                    name: "extras".into(),
                    kind: EntryKind::Directory,
                    path: "show/extras".into(),
                    size_bytes: None,
                },
                BrowseEntry {
                    name: "ep1.mkv".into(),
                    kind: EntryKind::Video,
                    path: "show/ep1.mkv".into(),
                    size_bytes: Some(10),
                },
                BrowseEntry {
                    name: "<notes>.txt".into(),
                    kind: EntryKind::Other,
                    path: "show/<notes>.txt".into(),
                    size_bytes: Some(1),
                },
            ],
        };
        let selection = Selection {
            video: Some("show/ep1.mkv".into()),
            ..Default::default()
        };
        let html = render_browse(&listing, &selection, &idle());

        assert!(html.contains("<h1>Browse show</h1>"));
        assert!(html.contains("<a href=\"/\">..</a>"));
        assert!(html.contains("[DIR] <a href=\"/?path=show/extras\">extras</a>"));
        assert!(html.contains("/select?type=video&amp;path=show/ep1.mkv"));
        assert!(html.contains("&lt;notes&gt;.txt"));
        assert!(html.contains("<p>Video: show/ep1.mkv</p>"));
        assert!(html.contains("value=\"1.5\""));
        assert!(html.contains("Stream: idle"));
        assert!(!html.contains("value=\"Stop\""));
    }

    #[test]
    fn crashed_status_shows_diagnostics() {
        let status = StreamStatus {
            state: JobState::Crashed,
            job: None,
            exit_code: Some(1),
            diagnostics: vec!["Conversion failed!".into()],
            error: Some("stream job crashed (exit code 1)".into()),
        };
        let listing = Listing {
            path: String::new(),
            parent: None,
            entries: Vec::new(),
        };
        let html = render_browse(&listing, &Selection::default(), &status);
        assert!(html.contains("<h1>Browse /</h1>"));
        assert!(html.contains("stream job crashed (exit code 1)"));
        assert!(html.contains("<pre>Conversion failed!</pre>"));
    }

    #[test]
    fn error_page_escapes_message_and_shows_diagnostics() {
        let error = ApiError::LaunchFailed {
            message: "ffmpeg: exited during startup".into(),
            diagnostics: vec!["<input> not found".into()],
        };
        let html = render_error(StatusCode::BAD_GATEWAY, &error);
        assert!(html.contains("<h1>502</h1>"));
        assert!(html.contains("launch failed: ffmpeg: exited during startup"));
        assert!(html.contains("<pre>&lt;input&gt; not found</pre>"));
        assert!(html.contains("<a href=\"/\">Back</a>"));
    }
}
