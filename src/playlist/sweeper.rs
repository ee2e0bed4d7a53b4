use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::registry::{PlaylistRegistry, SweepReport};
use crate::client::MusicCatalog;

/// How often expired playlists are looked for
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Age after which a generated playlist is deleted
pub const PLAYLIST_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Background task deleting generated playlists once they are too old
pub struct PlaylistSweeper {
    registry: Arc<PlaylistRegistry>,
    catalog: Arc<dyn MusicCatalog>,
    interval: Duration,
    max_age: Duration,
}

impl PlaylistSweeper {
    pub fn new(registry: Arc<PlaylistRegistry>, catalog: Arc<dyn MusicCatalog>) -> Self {
        Self {
            registry,
            catalog,
            interval: SWEEP_INTERVAL,
            max_age: PLAYLIST_MAX_AGE,
        }
    }

    #[cfg(test)]
    pub fn with_timing(mut self, interval: Duration, max_age: Duration) -> Self {
        self.interval = interval;
        self.max_age = max_age;
        self
    }

    /// Run one sweep at `now` (seconds since epoch). Blocks on the catalog.
    pub fn sweep_once(&self, now: i64) -> SweepReport {
        let max_age_secs = self.max_age.as_secs() as i64;
        if !self.registry.has_expired(now, max_age_secs) {
            return SweepReport::default();
        }

        let user = match self.catalog.current_user() {
            Ok(user) => user,
            Err(e) => {
                error!("Skipping playlist sweep, cannot fetch current user: {e:#}");
                return SweepReport::default();
            }
        };

        let report = self
            .registry
            .sweep(now, max_age_secs, |playlist_id| {
                self.catalog.unfollow_playlist(&user.id, playlist_id)
            });

        if !report.removed.is_empty() || !report.failed.is_empty() {
            info!(
                removed = report.removed.len(),
                failed = report.failed.len(),
                remaining = self.registry.len(),
                "Playlist sweep done"
            );
        }
        report
    }

    /// Sweep every interval until `shutdown` is cancelled.
    ///
    /// The first sweep happens one interval after start.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            "Playlist sweeper starting (interval={}s, max_age={}s)",
            self.interval.as_secs(),
            self.max_age.as_secs()
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.cancelled() => break,
            }

            let sweeper = self.clone();
            let result =
                tokio::task::spawn_blocking(move || sweeper.sweep_once(Utc::now().timestamp()))
                    .await;
            if let Err(e) = result {
                error!("Playlist sweep task failed: {e}");
            }
        }

        info!("Playlist sweeper stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::new(self).run(shutdown))
    }
}
