//! Category view: the category's links, their comment threads, favorite
//! toggles and the admin link management forms.

use std::collections::HashSet;

use maud::{html, Markup};

use super::PageContext;
use crate::comments::build_comment_tree;
use crate::components::comment::CommentThread;
use crate::components::format::date_time;
use crate::store::{Category, Comment, CommentScope, Link};

#[must_use]
pub fn render_category(
    ctx: &PageContext<'_>,
    category: &Category,
    links: &[Link],
    comments: &[Comment],
    favorited: &HashSet<i64>,
) -> Markup {
    let return_to = format!("/category/{}", category.id);
    let admin = ctx.viewer.is_some_and(|v| v.is_admin);

    let category_scope = CommentScope::Category(category.id);
    let category_comments: Vec<Comment> = comments
        .iter()
        .filter(|c| category_scope.matches(c))
        .cloned()
        .collect();
    let category_thread = build_comment_tree(&category_comments);

    ctx.layout(&category.name).render(html! {
        h1 { (category.name) }
        @if let Some(description) = &category.description {
            p class="muted" { (description) }
        }

        section class="box" {
            @if links.is_empty() {
                p class="muted" { "暂无内容" }
            }
            @for link in links {
                (link_row(ctx, category, link, comments, favorited, &return_to, admin))
            }

            @if admin {
                details {
                    summary { "新增内容" }
                    form method="post" action="/links" {
                        input type="hidden" name="category_id" value=(category.id);
                        input type="hidden" name="next" value=(return_to);
                        p { input type="text" name="title" placeholder="标题"; }
                        p { input type="text" name="url" placeholder="链接"; }
                        p { button type="submit" { "添加" } }
                    }
                }
            }
        }

        section class="box" {
            h2 { "栏目评论" }
            (CommentThread::new(&category_thread, category_scope, ctx.viewer, &return_to).render())
        }
    })
}

fn link_row(
    ctx: &PageContext<'_>,
    category: &Category,
    link: &Link,
    comments: &[Comment],
    favorited: &HashSet<i64>,
    return_to: &str,
    admin: bool,
) -> Markup {
    let scope = CommentScope::Link {
        category: category.id,
        link: link.id,
    };
    let link_comments: Vec<Comment> = comments.iter().filter(|c| scope.matches(c)).cloned().collect();
    let thread = build_comment_tree(&link_comments);
    let favorite_count = link.favorite_count.unwrap_or(0);
    let is_favorited = favorited.contains(&link.id);

    html! {
        div class="site-row" {
            span class="title" {
                a href=(link.url) target="_blank" rel="noopener noreferrer" { (link.title) }
                @if link.is_featured() { " ★" }
            }
            span class="muted" { (date_time(link.created_at.as_deref())) }
            span class="muted" { "♥ " (favorite_count) }

            @if ctx.viewer.is_some() {
                @let action = if is_favorited { "/favorites/remove" } else { "/favorites/add" };
                form class="inline" method="post" action=(action) {
                    input type="hidden" name="category_id" value=(category.id);
                    input type="hidden" name="link_id" value=(link.id);
                    input type="hidden" name="next" value=(return_to);
                    button class="plain" type="submit" {
                        @if is_favorited { "取消收藏" } @else { "收藏" }
                    }
                }
            }

            @if admin {
                form class="inline" method="post" action={ "/links/" (link.id) "/feature" } {
                    input type="hidden" name="featured" value=((!link.is_featured()).to_string());
                    input type="hidden" name="next" value=(return_to);
                    button class="plain" type="submit" {
                        @if link.is_featured() { "取消推荐" } @else { "推荐" }
                    }
                }
                form class="inline" method="post" action={ "/links/" (link.id) "/delete" }
                    onsubmit="return confirm('确认删除该内容？')" {
                    input type="hidden" name="next" value=(return_to);
                    button class="plain danger" type="submit" { "删除" }
                }
            }
        }

        @if admin {
            details {
                summary class="muted" { "编辑" }
                form method="post" action={ "/links/" (link.id) "/edit" } {
                    input type="hidden" name="next" value=(return_to);
                    p { input type="text" name="title" value=(link.title); }
                    p { input type="text" name="url" value=(link.url); }
                    p { button type="submit" { "保存" } }
                }
            }
        }

        details {
            summary class="muted" { "评论 (" (link_comments.len()) ")" }
            (CommentThread::new(&thread, scope, ctx.viewer, return_to).render())
        }
    }
}
