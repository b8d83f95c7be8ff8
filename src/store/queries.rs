//! One function per logical operation on the platform's tables.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::models::{
    Category, Comment, CommentScope, Link, NewCollection, NewCollectionItem, NewComment, NewLink,
    UserCollection, UserCollectionItem, UserProfile,
};
use super::Store;
use crate::favorites::FavoriteStore;
use crate::platform::PlatformError;
use crate::prefetch::SnapshotSource;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r".+@.+\..+").expect("valid email regex"));

/// The loose shape check the sign-up and reset forms use before any
/// platform request is issued.
#[must_use]
pub fn looks_like_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

// ========== Categories ==========

impl Store {
    pub async fn list_categories(&self) -> Result<Vec<Category>, PlatformError> {
        self.platform
            .select("categories", &[("select", "*"), ("order", "id")])
            .await
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, PlatformError> {
        self.platform
            .insert("categories", &json!({ "name": name }))
            .await
    }

    pub async fn rename_category(&self, id: i64, name: &str) -> Result<Category, PlatformError> {
        let id_filter = format!("eq.{id}");
        let mut rows = self
            .platform
            .update(
                "categories",
                &[("id", id_filter.as_str())],
                &json!({ "name": name }),
            )
            .await?;
        if rows.is_empty() {
            return Err(PlatformError::MissingRow);
        }
        Ok(rows.swap_remove(0))
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), PlatformError> {
        let id_filter = format!("eq.{id}");
        self.platform
            .delete("categories", &[("id", id_filter.as_str())])
            .await
    }

    // ========== Links ==========

    pub async fn list_links(&self) -> Result<Vec<Link>, PlatformError> {
        self.platform
            .select("links", &[("select", "*"), ("order", "category_id,id")])
            .await
    }

    pub async fn featured_links(&self) -> Result<Vec<Link>, PlatformError> {
        self.platform
            .select(
                "links",
                &[("select", "*"), ("featured", "eq.true"), ("order", "id")],
            )
            .await
    }

    pub async fn create_link(&self, link: &NewLink) -> Result<Link, PlatformError> {
        self.platform.insert("links", link).await
    }

    pub async fn update_link(&self, id: i64, title: &str, url: &str) -> Result<Link, PlatformError> {
        let id_filter = format!("eq.{id}");
        let mut rows = self
            .platform
            .update(
                "links",
                &[("id", id_filter.as_str())],
                &json!({ "title": title, "url": url }),
            )
            .await?;
        if rows.is_empty() {
            return Err(PlatformError::MissingRow);
        }
        Ok(rows.swap_remove(0))
    }

    pub async fn set_link_featured(&self, id: i64, featured: bool) -> Result<(), PlatformError> {
        let id_filter = format!("eq.{id}");
        self.platform
            .update::<Link>(
                "links",
                &[("id", id_filter.as_str())],
                &json!({ "featured": featured }),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_link(&self, id: i64) -> Result<(), PlatformError> {
        let id_filter = format!("eq.{id}");
        self.platform
            .delete("links", &[("id", id_filter.as_str())])
            .await
    }

    // ========== Comments ==========

    pub async fn list_comments(&self) -> Result<Vec<Comment>, PlatformError> {
        self.platform
            .select("comments", &[("select", "*"), ("order", "created_at")])
            .await
    }

    pub async fn comments_in_scope(
        &self,
        scope: CommentScope,
    ) -> Result<Vec<Comment>, PlatformError> {
        let category = scope
            .category_id()
            .map_or_else(|| "is.null".to_string(), |id| format!("eq.{id}"));
        let link = scope
            .link_id()
            .map_or_else(|| "is.null".to_string(), |id| format!("eq.{id}"));
        self.platform
            .select(
                "comments",
                &[
                    ("select", "*"),
                    ("category_id", category.as_str()),
                    ("link_id", link.as_str()),
                    ("order", "created_at"),
                ],
            )
            .await
    }

    pub async fn create_comment(&self, comment: &NewComment) -> Result<Comment, PlatformError> {
        self.platform.insert("comments", comment).await
    }

    pub async fn delete_comment(&self, id: i64) -> Result<(), PlatformError> {
        let id_filter = format!("eq.{id}");
        self.platform
            .delete("comments", &[("id", id_filter.as_str())])
            .await
    }

    /// Cheap change marker for the comment watcher: (highest id, total count).
    pub async fn comment_change_marker(&self) -> Result<(Option<i64>, i64), PlatformError> {
        #[derive(serde::Deserialize)]
        struct IdRow {
            id: i64,
        }
        let latest: Option<IdRow> = self
            .platform
            .select_one("comments", &[("select", "id"), ("order", "id.desc")])
            .await?;
        let total = self.platform.count("comments", &[]).await?;
        Ok((latest.map(|row| row.id), total))
    }

    // ========== Profiles ==========

    /// Resolve a login identifier (username or email) to an email address.
    pub async fn resolve_email(&self, identifier: &str) -> Result<Option<String>, PlatformError> {
        if looks_like_email(identifier) {
            return Ok(Some(identifier.to_string()));
        }
        let username_filter = format!("eq.{identifier}");
        let profile: Option<UserProfile> = self
            .platform
            .select_one(
                "profiles",
                &[
                    ("select", "id,email"),
                    ("username", username_filter.as_str()),
                ],
            )
            .await?;
        Ok(profile.and_then(|p| p.email))
    }

    pub async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, PlatformError> {
        let id_filter = format!("eq.{user_id}");
        self.platform
            .select_one("profiles", &[("select", "*"), ("id", id_filter.as_str())])
            .await
    }

    pub async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), PlatformError> {
        self.platform
            .upsert::<UserProfile>("profiles", profile)
            .await?;
        Ok(())
    }

    // ========== Collections ==========

    pub async fn user_collections(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserCollection>, PlatformError> {
        let user_filter = format!("eq.{user_id}");
        self.platform
            .select(
                "user_collections",
                &[
                    ("select", "id,name,category_id,user_id"),
                    ("user_id", user_filter.as_str()),
                    ("order", "id"),
                ],
            )
            .await
    }

    pub async fn collection_items(
        &self,
        collection_ids: &[i64],
    ) -> Result<Vec<UserCollectionItem>, PlatformError> {
        if collection_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = collection_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let in_filter = format!("in.({ids})");
        self.platform
            .select(
                "user_collection_items",
                &[
                    ("select", "collection_id,link_id"),
                    ("collection_id", in_filter.as_str()),
                ],
            )
            .await
    }
}

/// The RPC result arrives either as a bare number or a one-element array,
/// depending on how the function is declared on the platform.
fn parse_count(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::Array(items) => items.first().and_then(serde_json::Value::as_i64),
        _ => None,
    }
}

#[async_trait]
impl FavoriteStore for Store {
    async fn find_collection(
        &self,
        user_id: &str,
        category_id: i64,
    ) -> Result<Option<UserCollection>, PlatformError> {
        let user_filter = format!("eq.{user_id}");
        let category_filter = format!("eq.{category_id}");
        self.platform
            .select_one(
                "user_collections",
                &[
                    ("select", "id,name,category_id,user_id"),
                    ("user_id", user_filter.as_str()),
                    ("category_id", category_filter.as_str()),
                ],
            )
            .await
    }

    async fn create_collection(
        &self,
        user_id: &str,
        category_id: i64,
        name: &str,
    ) -> Result<UserCollection, PlatformError> {
        self.platform
            .insert(
                "user_collections",
                &NewCollection {
                    user_id,
                    category_id,
                    name,
                },
            )
            .await
    }

    async fn insert_collection_item(
        &self,
        collection_id: i64,
        link_id: i64,
    ) -> Result<(), PlatformError> {
        self.platform
            .insert_only(
                "user_collection_items",
                &NewCollectionItem {
                    collection_id,
                    link_id,
                },
            )
            .await
    }

    async fn delete_collection_item(
        &self,
        collection_id: i64,
        link_id: i64,
    ) -> Result<(), PlatformError> {
        let collection_filter = format!("eq.{collection_id}");
        let link_filter = format!("eq.{link_id}");
        self.platform
            .delete(
                "user_collection_items",
                &[
                    ("collection_id", collection_filter.as_str()),
                    ("link_id", link_filter.as_str()),
                ],
            )
            .await
    }

    async fn collection_link_ids(&self, collection_id: i64) -> Result<Vec<i64>, PlatformError> {
        #[derive(serde::Deserialize)]
        struct ItemRow {
            link_id: i64,
        }
        let collection_filter = format!("eq.{collection_id}");
        let rows: Vec<ItemRow> = self
            .platform
            .select(
                "user_collection_items",
                &[
                    ("select", "link_id"),
                    ("collection_id", collection_filter.as_str()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|row| row.link_id).collect())
    }

    async fn link_favorite_count(&self, link_id: i64) -> Result<Option<i64>, PlatformError> {
        let id_filter = format!("eq.{link_id}");
        let link: Option<Link> = self
            .platform
            .select_one(
                "links",
                &[("select", "id,category_id,title,url,favorite_count"), ("id", id_filter.as_str())],
            )
            .await?;
        Ok(link.and_then(|l| l.favorite_count))
    }

    async fn adjust_favorite_count(
        &self,
        link_id: i64,
        delta: i64,
    ) -> Result<Option<i64>, PlatformError> {
        let value: serde_json::Value = self
            .platform
            .rpc(
                "adjust_link_favorite_count",
                &json!({ "link_id": link_id, "delta": delta }),
            )
            .await?;
        Ok(parse_count(&value))
    }
}

#[async_trait]
impl SnapshotSource for Store {
    async fn categories(&self) -> Result<Vec<Category>, PlatformError> {
        self.list_categories().await
    }

    async fn links(&self) -> Result<Vec<Link>, PlatformError> {
        self.list_links().await
    }

    async fn comments(&self) -> Result<Vec<Comment>, PlatformError> {
        self.list_comments().await
    }

    async fn user_collections(&self, user_id: &str) -> Result<Vec<UserCollection>, PlatformError> {
        Store::user_collections(self, user_id).await
    }

    async fn user_collection_items(
        &self,
        collection_ids: &[i64],
    ) -> Result<Vec<UserCollectionItem>, PlatformError> {
        self.collection_items(collection_ids).await
    }
}
