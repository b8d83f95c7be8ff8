//! Comment change watcher.
//!
//! The platform can stream row-level changes, but all this system needs
//! from that interface is "something changed, refetch". A fixed-interval
//! poll of a cheap change marker (highest comment id + total count) gets
//! the same effect without owning a realtime transport: when the marker
//! moves, the prefetch cache is invalidated and refilled.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::prefetch::PrefetchCache;
use crate::store::Store;

/// (highest comment id, total comment count). Covers inserts and deletes:
/// an insert moves the id, a delete moves the count.
type CommentMarker = (Option<i64>, i64);

fn should_refresh(previous: Option<CommentMarker>, current: CommentMarker) -> bool {
    // The first observation is a baseline, not a change.
    previous.is_some_and(|prev| prev != current)
}

/// Run the watcher forever. Poll failures are logged and skipped; the
/// cache keeps serving whatever it has.
pub async fn watch_comments(store: Store, cache: Arc<PrefetchCache>, interval: Duration) {
    let mut previous: Option<CommentMarker> = None;

    loop {
        match store.comment_change_marker().await {
            Ok(current) => {
                if should_refresh(previous, current) {
                    info!(
                        latest_id = ?current.0,
                        total = current.1,
                        "Comments changed, refreshing prefetch cache"
                    );
                    cache.invalidate();
                    cache.ensure().await;
                } else {
                    debug!(total = current.1, "No comment changes");
                }
                previous = Some(current);
            }
            Err(e) => {
                error!("Comment watch poll error: {e}");
            }
        }

        tokio::time::sleep(interval).await;
    }
}
