//! Third-party player script registry
//!
//! Each platform script is injected at most once per page. Concurrent callers
//! share one in-flight load; a failed load is not cached, so the next caller
//! retries.

use crate::host::{ScriptInjector, ScriptKind};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Load-once registry shared by every session on a page
pub struct ScriptLoader {
    injector: Arc<dyn ScriptInjector>,
    youtube: OnceCell<()>,
    vimeo: OnceCell<()>,
}

impl ScriptLoader {
    pub fn new(injector: Arc<dyn ScriptInjector>) -> Self {
        Self {
            injector,
            youtube: OnceCell::new(),
            vimeo: OnceCell::new(),
        }
    }

    fn cell(&self, kind: ScriptKind) -> &OnceCell<()> {
        match kind {
            ScriptKind::YouTubeIframeApi => &self.youtube,
            ScriptKind::VimeoPlayerApi => &self.vimeo,
        }
    }

    /// Make sure a script is loaded, injecting it if no load has succeeded yet
    pub async fn ensure_loaded(&self, kind: ScriptKind) -> anyhow::Result<()> {
        let cell = self.cell(kind);
        if cell.initialized() {
            debug!(script = %kind, "Script already loaded");
            return Ok(());
        }

        cell.get_or_try_init(|| async {
            info!(script = %kind, src = kind.src(), "Injecting player script");
            self.injector.inject(kind).await.inspect_err(|e| {
                warn!(script = %kind, error = %e, "Player script failed to load");
            })
        })
        .await?;

        Ok(())
    }

    pub fn is_loaded(&self, kind: ScriptKind) -> bool {
        self.cell(kind).initialized()
    }
}
