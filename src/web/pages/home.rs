//! Home view: totals, per-category counts, recent comments, latest links
//! and the site-wide comment thread.

use std::collections::HashMap;

use maud::{html, Markup};

use super::PageContext;
use crate::comments::CommentNode;
use crate::components::comment::CommentThread;
use crate::components::format::date_time;
use crate::prefetch::Snapshot;
use crate::store::{Comment, CommentScope, Link};

/// Per-category aggregate row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCounts {
    pub id: i64,
    pub name: String,
    pub links: usize,
    pub comments: usize,
}

/// A recent comment enriched with where it was posted.
#[derive(Debug, Clone)]
pub struct RecentComment {
    pub comment: Comment,
    pub category_name: String,
    pub link_title: String,
    /// 1-based position of the link within its category (0 when none).
    pub link_index: usize,
}

#[must_use]
pub fn per_category_counts(snapshot: &Snapshot) -> Vec<CategoryCounts> {
    let mut counts: Vec<CategoryCounts> = snapshot
        .categories
        .iter()
        .map(|category| CategoryCounts {
            id: category.id,
            name: category.name.clone(),
            links: 0,
            comments: 0,
        })
        .collect();
    let index: HashMap<i64, usize> = counts
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();

    for link in &snapshot.links {
        if let Some(&i) = index.get(&link.category_id) {
            counts[i].links += 1;
        }
    }
    for comment in &snapshot.comments {
        if let Some(category_id) = comment.scope().category_id() {
            if let Some(&i) = index.get(&category_id) {
                counts[i].comments += 1;
            }
        }
    }
    counts
}

/// 1-based position of every link within its category, ordered by id.
/// Recent comments refer to links by this position.
#[must_use]
pub fn link_positions(links: &[Link]) -> HashMap<i64, usize> {
    let mut by_category: HashMap<i64, Vec<i64>> = HashMap::new();
    for link in links {
        by_category.entry(link.category_id).or_default().push(link.id);
    }

    let mut positions = HashMap::new();
    for ids in by_category.values_mut() {
        ids.sort_unstable();
        for (index, id) in ids.iter().enumerate() {
            positions.insert(*id, index + 1);
        }
    }
    positions
}

/// The `limit` newest comments, enriched with category and link context.
/// References to rows that no longer exist degrade to placeholder labels.
#[must_use]
pub fn recent_comments(snapshot: &Snapshot, limit: usize) -> Vec<RecentComment> {
    let categories: HashMap<i64, &str> = snapshot
        .categories
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();
    let links: HashMap<i64, &Link> = snapshot.links.iter().map(|l| (l.id, l)).collect();
    let positions = link_positions(&snapshot.links);

    let mut recent: Vec<&Comment> = snapshot.comments.iter().collect();
    // ISO-8601 strings sort chronologically; None sorts below Some, so a
    // descending sort puts missing timestamps last.
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(limit);

    recent
        .into_iter()
        .map(|comment| {
            let category_name = comment.scope().category_id().map_or_else(
                || "首页".to_string(),
                |id| {
                    categories
                        .get(&id)
                        .map_or_else(|| "已删除栏目".to_string(), |name| (*name).to_string())
                },
            );
            let (link_title, link_index) = comment.scope().link_id().map_or_else(
                || (String::new(), 0),
                |id| {
                    let title = links
                        .get(&id)
                        .map_or_else(|| "已删除内容".to_string(), |l| l.title.clone());
                    (title, positions.get(&id).copied().unwrap_or(0))
                },
            );
            RecentComment {
                comment: comment.clone(),
                category_name,
                link_title,
                link_index,
            }
        })
        .collect()
}

/// The `limit` newest links with their category names.
#[must_use]
pub fn latest_links(snapshot: &Snapshot, limit: usize) -> Vec<(Link, String)> {
    let categories: HashMap<i64, &str> = snapshot
        .categories
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();

    let mut links: Vec<&Link> = snapshot.links.iter().collect();
    links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    links.truncate(limit);

    links
        .into_iter()
        .map(|link| {
            let name = categories
                .get(&link.category_id)
                .map_or_else(|| "未知栏目".to_string(), |name| (*name).to_string());
            (link.clone(), name)
        })
        .collect()
}

#[must_use]
pub fn render_home(
    ctx: &PageContext<'_>,
    snapshot: &Snapshot,
    site_thread: &[CommentNode],
) -> Markup {
    let counts = per_category_counts(snapshot);
    let recent = recent_comments(snapshot, 10);
    let latest = latest_links(snapshot, 10);

    ctx.layout("ホーム").render(html! {
        section class="box" {
            h2 { "サイト" }
            p class="muted" {
                (snapshot.categories.len()) " 个栏目 · "
                (snapshot.links.len()) " 条内容 · "
                (snapshot.comments.len()) " 条评论"
            }
            table class="stats" {
                thead { tr { th { "栏目" } th { "内容" } th { "评论" } } }
                tbody {
                    @for row in &counts {
                        tr {
                            td { a href={ "/category/" (row.id) } { (row.name) } }
                            td { (row.links) }
                            td { (row.comments) }
                        }
                    }
                }
            }
        }

        @if ctx.viewer.is_some_and(|v| v.is_admin) {
            section class="box" {
                h2 { "栏目管理" }
                @for row in &counts {
                    div class="site-row" {
                        form class="inline" method="post"
                            action={ "/categories/" (row.id) "/rename" } {
                            input type="hidden" name="next" value="/";
                            input type="text" name="name" value=(row.name)
                                style="width:14rem;display:inline-block;";
                            button class="plain" type="submit" { "重命名" }
                        }
                        form class="inline" method="post"
                            action={ "/categories/" (row.id) "/delete" }
                            onsubmit="return confirm('确认删除栏目及其下内容？')" {
                            input type="hidden" name="next" value="/";
                            button class="plain danger" type="submit" { "删除" }
                        }
                    }
                }
                form method="post" action="/categories" {
                    input type="hidden" name="next" value="/";
                    p { input type="text" name="name" placeholder="新增栏目名称"; }
                    p { button type="submit" { "添加栏目" } }
                }
            }
        }

        section class="box" {
            h2 { "最新内容" }
            @if latest.is_empty() {
                p class="muted" { "暂无内容" }
            }
            @for (link, category_name) in &latest {
                div class="site-row" {
                    span class="title" {
                        a href=(link.url) target="_blank" rel="noopener noreferrer" {
                            (link.title)
                        }
                    }
                    span class="muted" { (category_name) }
                    span class="muted" { (date_time(link.created_at.as_deref())) }
                }
            }
        }

        section class="box" {
            h2 { "最新评论" }
            @if recent.is_empty() {
                p class="muted" { "暂无评论" }
            }
            @for entry in &recent {
                div class="site-row" {
                    span class="title" {
                        strong { (entry.comment.author_name.as_deref().unwrap_or("匿名")) }
                        " : " (entry.comment.content)
                    }
                    span class="muted" {
                        (entry.category_name)
                        @if !entry.link_title.is_empty() {
                            " / #" (entry.link_index) " " (entry.link_title)
                        }
                    }
                }
            }
        }

        section class="box" {
            h2 { "留言板" }
            (CommentThread::new(site_thread, CommentScope::SiteWide, ctx.viewer, "/").render())
        }
    })
}
