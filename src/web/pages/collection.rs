//! Collection view: per-category tabs over the viewer's favorites, plus
//! the featured links recommended for the active category.

use std::collections::{HashMap, HashSet};

use maud::{html, Markup};

use super::PageContext;
use crate::components::format::date_time;
use crate::prefetch::{Snapshot, UserSnapshot};
use crate::store::{Category, Link, UserCollection};

/// One tab per category; the label prefers the user's collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTab {
    pub category_id: i64,
    pub label: String,
    pub collection_id: Option<i64>,
}

#[must_use]
pub fn collection_tabs(categories: &[Category], collections: &[UserCollection]) -> Vec<CategoryTab> {
    let by_category: HashMap<i64, &UserCollection> = collections
        .iter()
        .filter_map(|c| c.category_id.map(|id| (id, c)))
        .collect();

    categories
        .iter()
        .map(|category| {
            let collection = by_category.get(&category.id);
            CategoryTab {
                category_id: category.id,
                label: collection.map_or_else(|| category.name.clone(), |c| c.name.clone()),
                collection_id: collection.map(|c| c.id),
            }
        })
        .collect()
}

/// The viewer's saved links for one tab, in save order.
#[must_use]
pub fn saved_links_for_tab(
    tab: &CategoryTab,
    user: &UserSnapshot,
    snapshot: &Snapshot,
) -> Vec<Link> {
    let Some(collection_id) = tab.collection_id else {
        return Vec::new();
    };
    let links: HashMap<i64, &Link> = snapshot.links.iter().map(|l| (l.id, l)).collect();
    user.items
        .iter()
        .filter(|item| item.collection_id == collection_id)
        .filter_map(|item| links.get(&item.link_id).map(|&l| l.clone()))
        .collect()
}

/// Featured links for one category, excluding what the viewer already saved.
#[must_use]
pub fn recommended_for_tab(tab: &CategoryTab, saved: &[Link], snapshot: &Snapshot) -> Vec<Link> {
    let saved_ids: HashSet<i64> = saved.iter().map(|l| l.id).collect();
    snapshot
        .links
        .iter()
        .filter(|l| l.category_id == tab.category_id && l.is_featured())
        .filter(|l| !saved_ids.contains(&l.id))
        .cloned()
        .collect()
}

#[must_use]
pub fn render_collection(
    ctx: &PageContext<'_>,
    snapshot: &Snapshot,
    user: &UserSnapshot,
    active_category: Option<i64>,
) -> Markup {
    let tabs = collection_tabs(&snapshot.categories, &user.collections);
    let active = active_category
        .and_then(|id| tabs.iter().find(|t| t.category_id == id))
        .or_else(|| tabs.first());

    ctx.layout("コレクション").render(html! {
        h1 { "コレクション" }

        @if tabs.is_empty() {
            p class="muted" { "暂无栏目" }
        } @else {
            div class="tabs" {
                @for tab in &tabs {
                    @let is_active = active.is_some_and(|a| a.category_id == tab.category_id);
                    a class=[is_active.then_some("active")]
                        href={ "/collection?tab=" (tab.category_id) } {
                        (tab.label)
                    }
                }
            }
        }

        @if let Some(tab) = active {
            @let saved = saved_links_for_tab(tab, user, snapshot);
            @let recommended = recommended_for_tab(tab, &saved, snapshot);
            @let return_to = format!("/collection?tab={}", tab.category_id);

            section class="box" {
                h2 { "收藏" }
                @if saved.is_empty() {
                    p class="muted" {
                        "还没有收藏，去 "
                        a href={ "/category/" (tab.category_id) } { "栏目" }
                        " 看看吧"
                    }
                }
                @for link in &saved {
                    div class="site-row" {
                        span class="title" {
                            a href=(link.url) target="_blank" rel="noopener noreferrer" {
                                (link.title)
                            }
                        }
                        span class="muted" { (date_time(link.created_at.as_deref())) }
                        form class="inline" method="post" action="/favorites/remove" {
                            input type="hidden" name="category_id" value=(tab.category_id);
                            input type="hidden" name="link_id" value=(link.id);
                            input type="hidden" name="next" value=(return_to);
                            button class="plain" type="submit" { "取消收藏" }
                        }
                    }
                }
            }

            @if !recommended.is_empty() {
                section class="box" {
                    h2 { "推荐" }
                    @for link in &recommended {
                        div class="site-row" {
                            span class="title" {
                                a href=(link.url) target="_blank" rel="noopener noreferrer" {
                                    (link.title)
                                }
                            }
                            form class="inline" method="post" action="/favorites/add" {
                                input type="hidden" name="category_id" value=(tab.category_id);
                                input type="hidden" name="link_id" value=(link.id);
                                input type="hidden" name="next" value=(return_to);
                                button class="plain" type="submit" { "收藏" }
                            }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::UserCollectionItem;

    fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
            description: None,
            created_at: None,
        }
    }

    fn link(id: i64, category_id: i64, featured: bool) -> Link {
        Link {
            id,
            category_id,
            title: format!("link {id}"),
            url: format!("https://example.com/{id}"),
            featured: Some(featured),
            favorite_count: None,
            created_at: None,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            categories: vec![category(1, "フォーラム"), category(2, "ライトノベル")],
            links: vec![link(10, 1, false), link(11, 1, true), link(20, 2, true)],
            comments: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    fn user_snapshot() -> UserSnapshot {
        UserSnapshot {
            user_id: "u-1".to_string(),
            collections: vec![UserCollection {
                id: 100,
                name: "我的フォーラム".to_string(),
                category_id: Some(1),
                user_id: Some("u-1".to_string()),
            }],
            items: vec![UserCollectionItem {
                collection_id: 100,
                link_id: 10,
            }],
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_tabs_prefer_collection_names() {
        let tabs = collection_tabs(&snapshot().categories, &user_snapshot().collections);
        assert_eq!(
            tabs,
            vec![
                CategoryTab {
                    category_id: 1,
                    label: "我的フォーラム".to_string(),
                    collection_id: Some(100),
                },
                CategoryTab {
                    category_id: 2,
                    label: "ライトノベル".to_string(),
                    collection_id: None,
                },
            ]
        );
    }

    #[test]
    fn test_saved_links_resolve_through_collection_items() {
        let snapshot = snapshot();
        let user = user_snapshot();
        let tabs = collection_tabs(&snapshot.categories, &user.collections);

        let saved = saved_links_for_tab(&tabs[0], &user, &snapshot);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, 10);

        // No collection for category 2 yet
        assert!(saved_links_for_tab(&tabs[1], &user, &snapshot).is_empty());
    }

    #[test]
    fn test_recommended_excludes_already_saved() {
        let mut snapshot = snapshot();
        snapshot.links[0].featured = Some(true); // link 10, already saved
        let user = user_snapshot();
        let tabs = collection_tabs(&snapshot.categories, &user.collections);

        let saved = saved_links_for_tab(&tabs[0], &user, &snapshot);
        let recommended = recommended_for_tab(&tabs[0], &saved, &snapshot);

        let ids: Vec<i64> = recommended.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![11]);
    }
}
