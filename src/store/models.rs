//! Row models for the platform's logical tables.
//!
//! Timestamps stay as the ISO-8601 strings the platform returns; they sort
//! lexicographically in chronological order, which is all the views need.

use serde::{Deserialize, Serialize};

/// A named grouping of links, analogous to a forum board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// An external link filed under a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub featured: Option<bool>,
    /// Denormalized counter maintained by the platform's atomic RPC; never
    /// recomputed client-side.
    #[serde(default)]
    pub favorite_count: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Link {
    #[must_use]
    pub fn is_featured(&self) -> bool {
        self.featured.unwrap_or(false)
    }
}

/// A comment, attached site-wide, to a category, or to one link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub author_id: Option<String>,
    /// Display-name snapshot taken at post time.
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub link_id: Option<i64>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Comment {
    #[must_use]
    pub fn scope(&self) -> CommentScope {
        CommentScope::from_ids(self.category_id, self.link_id)
    }
}

/// Where a comment lives. Replaces the pair of independently-nullable
/// category/link columns so the invalid (no category, some link) state
/// cannot be represented in the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentScope {
    /// The home view's comment thread.
    SiteWide,
    /// A category's own thread.
    Category(i64),
    /// The thread under one link.
    Link { category: i64, link: i64 },
}

impl CommentScope {
    /// Classify a raw row. A link id without a category id is a malformed
    /// row; it degrades to site-wide rather than inventing a category.
    #[must_use]
    pub fn from_ids(category_id: Option<i64>, link_id: Option<i64>) -> Self {
        match (category_id, link_id) {
            (Some(category), Some(link)) => Self::Link { category, link },
            (Some(category), None) => Self::Category(category),
            (None, _) => Self::SiteWide,
        }
    }

    #[must_use]
    pub fn category_id(&self) -> Option<i64> {
        match self {
            Self::SiteWide => None,
            Self::Category(category) | Self::Link { category, .. } => Some(*category),
        }
    }

    #[must_use]
    pub fn link_id(&self) -> Option<i64> {
        match self {
            Self::Link { link, .. } => Some(*link),
            _ => None,
        }
    }

    #[must_use]
    pub fn matches(&self, comment: &Comment) -> bool {
        comment.scope() == *self
    }

    /// Row-filter string for change subscriptions on the comments table,
    /// e.g. `category_id=eq.3,link_id=is.null`.
    #[must_use]
    pub fn changes_filter(&self) -> String {
        let category = match self.category_id() {
            Some(id) => format!("category_id=eq.{id}"),
            None => "category_id=is.null".to_string(),
        };
        let link = match self.link_id() {
            Some(id) => format!("link_id=eq.{id}"),
            None => "link_id=is.null".to_string(),
        };
        format!("{category},{link}")
    }
}

/// A user's saved-favorites list, mirroring one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCollection {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Join row between a collection and a link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCollectionItem {
    pub collection_id: i64,
    pub link_id: i64,
}

/// Profile row; resolves login identifiers and carries the avatar URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

// ========== Insert payloads ==========

#[derive(Debug, Clone, Serialize)]
pub struct NewLink {
    pub category_id: i64,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub content: String,
    pub category_id: Option<i64>,
    pub link_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub author_id: String,
    pub author_name: String,
    pub author_email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCollection<'a> {
    pub user_id: &'a str,
    pub category_id: i64,
    pub name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCollectionItem {
    pub collection_id: i64,
    pub link_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(category_id: Option<i64>, link_id: Option<i64>) -> Comment {
        Comment {
            id: 1,
            content: "hello".to_string(),
            author_id: None,
            author_name: None,
            author_email: None,
            category_id,
            link_id,
            parent_id: None,
            created_at: None,
        }
    }

    #[test]
    fn test_scope_classification() {
        assert_eq!(CommentScope::from_ids(None, None), CommentScope::SiteWide);
        assert_eq!(
            CommentScope::from_ids(Some(3), None),
            CommentScope::Category(3)
        );
        assert_eq!(
            CommentScope::from_ids(Some(3), Some(9)),
            CommentScope::Link { category: 3, link: 9 }
        );
        // Malformed row: link without category degrades to site-wide
        assert_eq!(CommentScope::from_ids(None, Some(9)), CommentScope::SiteWide);
    }

    #[test]
    fn test_scope_matches() {
        let scope = CommentScope::Link { category: 3, link: 9 };
        assert!(scope.matches(&comment(Some(3), Some(9))));
        assert!(!scope.matches(&comment(Some(3), None)));
        assert!(!scope.matches(&comment(None, None)));
    }

    #[test]
    fn test_changes_filter() {
        assert_eq!(
            CommentScope::SiteWide.changes_filter(),
            "category_id=is.null,link_id=is.null"
        );
        assert_eq!(
            CommentScope::Category(3).changes_filter(),
            "category_id=eq.3,link_id=is.null"
        );
        assert_eq!(
            CommentScope::Link { category: 3, link: 9 }.changes_filter(),
            "category_id=eq.3,link_id=eq.9"
        );
    }
}
