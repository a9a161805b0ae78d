use std::path::PathBuf;
use std::time::Duration;

use reelcast_transcoder::StreamConfig;
use tracing::warn;

/// Used when `SECRET_KEY` is unset. Fine for a single local user, never
/// for anything reachable from a network.
pub const DEFAULT_SECRET_KEY: &str = "change_this_secret";

pub const DEFAULT_MOVIES_DIR: &str = "~/Movies";

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Server configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub movies_dir: PathBuf,
    pub secret_key: String,
    pub bind_addr: String,
    pub log_json: bool,
    pub stream: StreamConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let movies_dir = lookup("MOVIES_DIR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MOVIES_DIR.to_string());
        let movies_dir = PathBuf::from(shellexpand::tilde(&movies_dir).into_owned());

        let secret_key = lookup("SECRET_KEY")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string());

        let bind_addr = lookup("REELCAST_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());

        let log_json = lookup("REELCAST_LOG_JSON").is_some_and(|v| v == "1" || v == "true");

        let defaults = StreamConfig::default();
        let stream = StreamConfig {
            ffmpeg_path: lookup("REELCAST_FFMPEG")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            output_dir: lookup("REELCAST_STREAM_DIR")
                .map(|v| PathBuf::from(shellexpand::tilde(&v).into_owned()))
                .unwrap_or(defaults.output_dir),
            segment_secs: parse_or(&lookup, "REELCAST_SEGMENT_SECS", defaults.segment_secs),
            grace_period: lookup("REELCAST_GRACE_SECS")
                .and_then(|v| parse_logged::<u64>("REELCAST_GRACE_SECS", &v))
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace_period),
            ..defaults
        };

        Self {
            movies_dir,
            secret_key,
            bind_addr,
            log_json,
            stream,
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| parse_logged(key, &v))
        .unwrap_or(default)
}

fn parse_logged<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        warn!(key, value, "ignoring unparsable setting");
    }
    parsed
}
