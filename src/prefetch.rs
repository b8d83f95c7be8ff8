//! Process-wide prefetch cache for the shared collections.
//!
//! Several views (sidebar categories, home aggregates, per-category link
//! lists) need overlapping subsets of the same three collections. The cache
//! fetches all three in one combined round on first use, serves every later
//! read from memory, and coalesces concurrent misses onto a single in-flight
//! fetch: callers that arrive while a fetch is running await the same shared
//! future and resolve to the same `Arc<Snapshot>`.
//!
//! A generation counter guards the check-then-fetch-then-store sequence:
//! `invalidate()` bumps it, so a fetch that was already in flight when the
//! invalidation happened can never repopulate the cache with stale data.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::error;

use crate::platform::PlatformError;
use crate::store::{Category, Comment, CommentScope, Link, UserCollection, UserCollectionItem};

/// Source of the collections the cache memoizes. Injected so tests can
/// count and gate fetches.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn categories(&self) -> Result<Vec<Category>, PlatformError>;
    async fn links(&self) -> Result<Vec<Link>, PlatformError>;
    async fn comments(&self) -> Result<Vec<Comment>, PlatformError>;
    async fn user_collections(&self, user_id: &str) -> Result<Vec<UserCollection>, PlatformError>;
    async fn user_collection_items(
        &self,
        collection_ids: &[i64],
    ) -> Result<Vec<UserCollectionItem>, PlatformError>;
}

/// The shared bundle of categories, links and comments.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub categories: Vec<Category>,
    pub links: Vec<Link>,
    pub comments: Vec<Comment>,
    pub fetched_at: DateTime<Utc>,
}

/// One signed-in user's collections and collection items.
#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub user_id: String,
    pub collections: Vec<UserCollection>,
    pub items: Vec<UserCollectionItem>,
    pub fetched_at: DateTime<Utc>,
}

type GlobalFetch = Shared<BoxFuture<'static, Arc<Snapshot>>>;
type UserFetch = Shared<BoxFuture<'static, Result<Arc<UserSnapshot>, Arc<PlatformError>>>>;

#[derive(Default)]
struct GlobalSlot {
    cached: Option<Arc<Snapshot>>,
    in_flight: Option<GlobalFetch>,
    generation: u64,
}

#[derive(Default)]
struct UserSlot {
    cached: Option<Arc<UserSnapshot>>,
    in_flight: Option<(String, UserFetch)>,
    generation: u64,
}

pub struct PrefetchCache {
    source: Arc<dyn SnapshotSource>,
    global: Arc<Mutex<GlobalSlot>>,
    user: Arc<Mutex<UserSlot>>,
}

impl PrefetchCache {
    #[must_use]
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            source,
            global: Arc::new(Mutex::new(GlobalSlot::default())),
            user: Arc::new(Mutex::new(UserSlot::default())),
        }
    }

    /// The cached global snapshot, if one has been fetched. Never performs I/O.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.global.lock().unwrap().cached.clone()
    }

    /// Return the cached snapshot, or join/launch the single in-flight fetch.
    ///
    /// Individual collection failures degrade to empty slices and are only
    /// logged; this never fails.
    pub async fn ensure(&self) -> Arc<Snapshot> {
        let fetch = {
            let mut slot = self.global.lock().unwrap();
            if let Some(snapshot) = &slot.cached {
                return Arc::clone(snapshot);
            }
            if let Some(in_flight) = &slot.in_flight {
                in_flight.clone()
            } else {
                let source = Arc::clone(&self.source);
                let slots = Arc::clone(&self.global);
                let generation = slot.generation;
                let fetch: GlobalFetch = async move {
                    let snapshot = Arc::new(fetch_snapshot(source.as_ref()).await);
                    let mut slot = slots.lock().unwrap();
                    if slot.generation == generation {
                        slot.cached = Some(Arc::clone(&snapshot));
                        slot.in_flight = None;
                    }
                    snapshot
                }
                .boxed()
                .shared();
                slot.in_flight = Some(fetch.clone());
                fetch
            }
        };
        fetch.await
    }

    /// Drop both the global and the per-user snapshot. Link and category
    /// changes can change which favorites are meaningful, so the two are
    /// coupled. The next `ensure()` always issues a fresh fetch.
    pub fn invalidate(&self) {
        {
            let mut slot = self.global.lock().unwrap();
            slot.generation = slot.generation.wrapping_add(1);
            slot.cached = None;
            slot.in_flight = None;
        }
        self.invalidate_user();
    }

    /// Drop only the per-user snapshot (sign-out).
    pub fn invalidate_user(&self) {
        let mut slot = self.user.lock().unwrap();
        slot.generation = slot.generation.wrapping_add(1);
        slot.cached = None;
        slot.in_flight = None;
    }

    /// Return the cached per-user snapshot for `user_id`, coalescing
    /// concurrent fetches for the same user. A snapshot cached for a
    /// different user is discarded first.
    ///
    /// Unlike the global snapshot, a failed fetch caches nothing and the
    /// error propagates: silently showing "no favorites" would be worse
    /// than an explicit retry.
    pub async fn ensure_user(
        &self,
        user_id: &str,
    ) -> Result<Arc<UserSnapshot>, Arc<PlatformError>> {
        let fetch = {
            let mut slot = self.user.lock().unwrap();
            if let Some(snapshot) = slot.cached.as_ref().filter(|s| s.user_id == user_id) {
                return Ok(Arc::clone(snapshot));
            }

            // Anything belonging to another user is stale now.
            let stale_cached = slot.cached.is_some();
            let stale_flight = slot
                .in_flight
                .as_ref()
                .is_some_and(|(pending, _)| pending != user_id);
            if stale_cached || stale_flight {
                slot.generation = slot.generation.wrapping_add(1);
                slot.cached = None;
                slot.in_flight = None;
            }

            if let Some((_, in_flight)) = &slot.in_flight {
                in_flight.clone()
            } else {
                let source = Arc::clone(&self.source);
                let slots = Arc::clone(&self.user);
                let generation = slot.generation;
                let id = user_id.to_string();
                let fetch: UserFetch = async move {
                    let result = fetch_user_snapshot(source.as_ref(), &id).await;
                    let mut slot = slots.lock().unwrap();
                    match result {
                        Ok(snapshot) => {
                            let snapshot = Arc::new(snapshot);
                            if slot.generation == generation {
                                slot.cached = Some(Arc::clone(&snapshot));
                                slot.in_flight = None;
                            }
                            Ok(snapshot)
                        }
                        Err(e) => {
                            if slot.generation == generation {
                                slot.in_flight = None;
                            }
                            Err(Arc::new(e))
                        }
                    }
                }
                .boxed()
                .shared();
                slot.in_flight = Some((user_id.to_string(), fetch.clone()));
                fetch
            }
        };
        fetch.await
    }

    /// Pure filter over the cached snapshot; `None` when nothing is cached.
    /// Never performs I/O.
    #[must_use]
    pub fn links_for_category(&self, category_id: i64) -> Option<Vec<Link>> {
        let snapshot = self.snapshot()?;
        Some(
            snapshot
                .links
                .iter()
                .filter(|link| link.category_id == category_id)
                .cloned()
                .collect(),
        )
    }

    /// Pure filter over the cached snapshot; `None` when nothing is cached.
    /// Never performs I/O.
    #[must_use]
    pub fn comments_for(&self, scope: CommentScope) -> Option<Vec<Comment>> {
        let snapshot = self.snapshot()?;
        Some(
            snapshot
                .comments
                .iter()
                .filter(|comment| scope.matches(comment))
                .cloned()
                .collect(),
        )
    }
}

async fn fetch_snapshot(source: &dyn SnapshotSource) -> Snapshot {
    let (categories, links, comments) =
        tokio::join!(source.categories(), source.links(), source.comments());

    // A failed slice is an empty slice; reads never fail the cache.
    let categories = categories.unwrap_or_else(|e| {
        error!("prefetch categories failed: {e}");
        Vec::new()
    });
    let links = links.unwrap_or_else(|e| {
        error!("prefetch links failed: {e}");
        Vec::new()
    });
    let comments = comments.unwrap_or_else(|e| {
        error!("prefetch comments failed: {e}");
        Vec::new()
    });

    Snapshot {
        categories,
        links,
        comments,
        fetched_at: Utc::now(),
    }
}

async fn fetch_user_snapshot(
    source: &dyn SnapshotSource,
    user_id: &str,
) -> Result<UserSnapshot, PlatformError> {
    let collections = source.user_collections(user_id).await?;
    let collection_ids: Vec<i64> = collections.iter().map(|c| c.id).collect();
    let items = source.user_collection_items(&collection_ids).await?;
    Ok(UserSnapshot {
        user_id: user_id.to_string(),
        collections,
        items,
        fetched_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Semaphore;

    use super::*;

    /// Counting fake source; the optional gate makes fetches block until
    /// the test releases them.
    struct TestSource {
        fetch_rounds: AtomicUsize,
        user_fetches: AtomicUsize,
        gate: Option<Semaphore>,
        fail_user_fetches: AtomicUsize,
    }

    impl TestSource {
        fn new() -> Self {
            Self {
                fetch_rounds: AtomicUsize::new(0),
                user_fetches: AtomicUsize::new(0),
                gate: None,
                fail_user_fetches: AtomicUsize::new(0),
            }
        }

        fn gated() -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::new()
            }
        }

        fn failing_user_fetches(count: usize) -> Self {
            let source = Self::new();
            source.fail_user_fetches.store(count, Ordering::SeqCst);
            source
        }

        async fn pass_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
        }

        fn release(&self, permits: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(permits);
            }
        }
    }

    #[async_trait]
    impl SnapshotSource for TestSource {
        async fn categories(&self) -> Result<Vec<Category>, PlatformError> {
            // One count per combined round; categories is always part of it.
            self.fetch_rounds.fetch_add(1, Ordering::SeqCst);
            self.pass_gate().await;
            Ok(vec![Category {
                id: 1,
                name: "フォーラム".to_string(),
                description: None,
                created_at: None,
            }])
        }

        async fn links(&self) -> Result<Vec<Link>, PlatformError> {
            self.pass_gate().await;
            Ok(vec![Link {
                id: 10,
                category_id: 1,
                title: "2dfan".to_string(),
                url: "https://2dfan.com".to_string(),
                featured: None,
                favorite_count: None,
                created_at: None,
            }])
        }

        async fn comments(&self) -> Result<Vec<Comment>, PlatformError> {
            self.pass_gate().await;
            Ok(Vec::new())
        }

        async fn user_collections(
            &self,
            user_id: &str,
        ) -> Result<Vec<UserCollection>, PlatformError> {
            self.user_fetches.fetch_add(1, Ordering::SeqCst);
            if self
                .fail_user_fetches
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(PlatformError::MissingRow);
            }
            Ok(vec![UserCollection {
                id: 100,
                name: "フォーラム".to_string(),
                category_id: Some(1),
                user_id: Some(user_id.to_string()),
            }])
        }

        async fn user_collection_items(
            &self,
            collection_ids: &[i64],
        ) -> Result<Vec<UserCollectionItem>, PlatformError> {
            Ok(collection_ids
                .iter()
                .map(|&collection_id| UserCollectionItem {
                    collection_id,
                    link_id: 10,
                })
                .collect())
        }
    }

    fn cache_with(source: TestSource) -> (Arc<PrefetchCache>, Arc<TestSource>) {
        let source = Arc::new(source);
        let cache = Arc::new(PrefetchCache::new(
            Arc::clone(&source) as Arc<dyn SnapshotSource>
        ));
        (cache, source)
    }

    #[tokio::test]
    async fn test_concurrent_ensure_coalesces_to_one_fetch() {
        let (cache, source) = cache_with(TestSource::new());

        let (a, b, c) = tokio::join!(cache.ensure(), cache.ensure(), cache.ensure());

        assert_eq!(source.fetch_rounds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn test_ensure_serves_cached_without_fetching() {
        let (cache, source) = cache_with(TestSource::new());

        let first = cache.ensure().await;
        let second = cache.ensure().await;

        assert_eq!(source.fetch_rounds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_fetch() {
        let (cache, source) = cache_with(TestSource::new());

        cache.ensure().await;
        cache.invalidate();
        assert!(cache.snapshot().is_none());

        cache.ensure().await;
        assert_eq!(source.fetch_rounds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_in_flight_fetch_cannot_repopulate_after_invalidate() {
        let (cache, source) = cache_with(TestSource::gated());

        let pending = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.ensure().await }
        });

        // Let the fetch start, then invalidate while it is still in flight.
        tokio::task::yield_now().await;
        cache.invalidate();
        source.release(3);

        // The caller that started the fetch still gets its snapshot...
        pending.await.unwrap();
        // ...but the cache stays empty, and the next ensure refetches.
        assert!(cache.snapshot().is_none());
        source.release(3);
        cache.ensure().await;
        assert_eq!(source.fetch_rounds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_filters_return_none_before_first_fetch() {
        let (cache, _source) = cache_with(TestSource::new());

        assert!(cache.links_for_category(1).is_none());
        assert!(cache.comments_for(CommentScope::SiteWide).is_none());

        cache.ensure().await;

        let links = cache.links_for_category(1).unwrap();
        assert_eq!(links.len(), 1);
        assert!(cache.links_for_category(99).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_user_coalesces_and_caches() {
        let (cache, source) = cache_with(TestSource::new());

        let (a, b) = tokio::join!(cache.ensure_user("u-1"), cache.ensure_user("u-1"));
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(source.user_fetches.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));

        let again = cache.ensure_user("u-1").await.unwrap();
        assert_eq!(source.user_fetches.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &again));
    }

    #[tokio::test]
    async fn test_switching_users_discards_previous_snapshot() {
        let (cache, source) = cache_with(TestSource::new());

        let first = cache.ensure_user("u-1").await.unwrap();
        let second = cache.ensure_user("u-2").await.unwrap();

        assert_eq!(source.user_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(second.user_id, "u-2");
        assert!(!Arc::ptr_eq(&first, &second));

        // The old user's snapshot is gone: asking again refetches.
        cache.ensure_user("u-1").await.unwrap();
        assert_eq!(source.user_fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_user_fetch_failure_caches_nothing_and_allows_retry() {
        let (cache, source) = cache_with(TestSource::failing_user_fetches(1));

        let err = cache.ensure_user("u-1").await;
        assert!(err.is_err());

        // Failure cleared the in-flight marker; the retry succeeds.
        let retried = cache.ensure_user("u-1").await.unwrap();
        assert_eq!(retried.user_id, "u-1");
        assert_eq!(source.user_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_global_fetch_failure_degrades_to_empty_slices() {
        struct FailingSource;

        #[async_trait]
        impl SnapshotSource for FailingSource {
            async fn categories(&self) -> Result<Vec<Category>, PlatformError> {
                Err(PlatformError::MissingRow)
            }
            async fn links(&self) -> Result<Vec<Link>, PlatformError> {
                Err(PlatformError::MissingRow)
            }
            async fn comments(&self) -> Result<Vec<Comment>, PlatformError> {
                Err(PlatformError::MissingRow)
            }
            async fn user_collections(
                &self,
                _user_id: &str,
            ) -> Result<Vec<UserCollection>, PlatformError> {
                Err(PlatformError::MissingRow)
            }
            async fn user_collection_items(
                &self,
                _collection_ids: &[i64],
            ) -> Result<Vec<UserCollectionItem>, PlatformError> {
                Err(PlatformError::MissingRow)
            }
        }

        let cache = Arc::new(PrefetchCache::new(Arc::new(FailingSource)));

        // The partial (here: fully empty) snapshot is still cached.
        let snapshot = cache.ensure().await;
        assert!(snapshot.categories.is_empty());
        assert!(snapshot.links.is_empty());
        assert!(snapshot.comments.is_empty());
        assert!(cache.snapshot().is_some());
    }
}
