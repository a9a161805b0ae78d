use std::sync::Arc;

use reelcast_scanner::MediaRoot;
use reelcast_transcoder::launcher::StreamLauncher;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub launcher: Arc<StreamLauncher>,
    pub session_secret: String,
}

impl AppState {
    pub fn media_root(&self) -> &MediaRoot {
        self.launcher.media_root()
    }
}
