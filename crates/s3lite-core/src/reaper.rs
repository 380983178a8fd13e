//! Background reclamation of expired multipart uploads.

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::provider::ObjectGateway;

/// Run [`ObjectGateway::reap_expired_uploads`] every configured interval on
/// its own task.
///
/// The task ends once `shutdown` reads `true` or its sender is dropped. A
/// sweep only touches expired uploads, so foreground requests are never
/// waited on.
pub fn spawn_upload_reaper(
    gateway: ObjectGateway,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = gateway.config().reaper_interval();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;
        info!(interval_secs = period.as_secs(), "upload reaper started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("upload reaper stopping");
                        break;
                    }
                }
                _ = interval.tick() => {
                    let reaped = gateway.reap_expired_uploads(Utc::now());
                    debug!(reaped, "upload reaper sweep finished");
                }
            }
        }
    })
}
