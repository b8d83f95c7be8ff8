//! Favorite links and the per-category collections that hold them.
//!
//! A favorite lives in the user's collection for the link's category; the
//! collection is created on first use, named after the category. The
//! denormalized favorite counter on the link is adjusted through the
//! platform's atomic RPC and is never recomputed by counting join rows
//! here; concurrent favoriters would race such a count.

use async_trait::async_trait;

use crate::platform::PlatformError;
use crate::store::UserCollection;

/// Storage operations the favorites flow needs. `Store` implements this
/// against the platform; tests use a mock with an in-memory counter.
#[async_trait]
pub trait FavoriteStore: Send + Sync {
    async fn find_collection(
        &self,
        user_id: &str,
        category_id: i64,
    ) -> Result<Option<UserCollection>, PlatformError>;

    async fn create_collection(
        &self,
        user_id: &str,
        category_id: i64,
        name: &str,
    ) -> Result<UserCollection, PlatformError>;

    /// Returns `PlatformError::Conflict` when the (collection, link) pair
    /// already exists.
    async fn insert_collection_item(
        &self,
        collection_id: i64,
        link_id: i64,
    ) -> Result<(), PlatformError>;

    async fn delete_collection_item(
        &self,
        collection_id: i64,
        link_id: i64,
    ) -> Result<(), PlatformError>;

    async fn collection_link_ids(&self, collection_id: i64) -> Result<Vec<i64>, PlatformError>;

    async fn link_favorite_count(&self, link_id: i64) -> Result<Option<i64>, PlatformError>;

    /// Atomically adjust the link's counter by `delta`, returning the new
    /// value as reported by the platform.
    async fn adjust_favorite_count(
        &self,
        link_id: i64,
        delta: i64,
    ) -> Result<Option<i64>, PlatformError>;
}

/// Result of an add-favorite call.
#[derive(Debug, Clone)]
pub struct FavoriteOutcome {
    pub collection: UserCollection,
    /// Counter value after the operation, when the platform reported one.
    pub new_count: Option<i64>,
}

/// Find the user's collection for a category, creating one named after the
/// category when absent (find-or-create; there is no hard uniqueness
/// constraint behind it).
pub async fn ensure_collection(
    store: &dyn FavoriteStore,
    user_id: &str,
    category_id: i64,
    category_name: &str,
) -> Result<UserCollection, PlatformError> {
    if let Some(existing) = store.find_collection(user_id, category_id).await? {
        return Ok(existing);
    }
    store
        .create_collection(user_id, category_id, category_name)
        .await
}

/// Add a link to the user's collection for its category and bump the
/// counter. A duplicate-insert conflict means the link was already
/// favorited: the current count is read back and returned as success.
pub async fn add_favorite(
    store: &dyn FavoriteStore,
    user_id: &str,
    category_id: i64,
    category_name: &str,
    link_id: i64,
) -> Result<FavoriteOutcome, PlatformError> {
    let collection = ensure_collection(store, user_id, category_id, category_name).await?;

    match store.insert_collection_item(collection.id, link_id).await {
        Ok(()) => {}
        Err(e) if e.is_conflict() => {
            let new_count = store.link_favorite_count(link_id).await?;
            return Ok(FavoriteOutcome {
                collection,
                new_count,
            });
        }
        Err(e) => return Err(e),
    }

    let new_count = store.adjust_favorite_count(link_id, 1).await?;
    Ok(FavoriteOutcome {
        collection,
        new_count,
    })
}

/// Remove a link from the user's collection for a category and decrement
/// the counter. A missing collection is a no-op (`Ok(None)`).
pub async fn remove_favorite(
    store: &dyn FavoriteStore,
    user_id: &str,
    category_id: i64,
    link_id: i64,
) -> Result<Option<i64>, PlatformError> {
    let Some(collection) = store.find_collection(user_id, category_id).await? else {
        return Ok(None);
    };

    store.delete_collection_item(collection.id, link_id).await?;
    store.adjust_favorite_count(link_id, -1).await
}

/// The user's collection for a category and the link ids saved in it.
pub async fn favorites_in_category(
    store: &dyn FavoriteStore,
    user_id: &str,
    category_id: i64,
) -> Result<(Option<UserCollection>, Vec<i64>), PlatformError> {
    let Some(collection) = store.find_collection(user_id, category_id).await? else {
        return Ok((None, Vec::new()));
    };
    let link_ids = store.collection_link_ids(collection.id).await?;
    Ok((Some(collection), link_ids))
}
