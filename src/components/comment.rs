//! Threaded comment list with post, reply and delete controls.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use maud::{html, Markup};

use super::form::hidden_input;
use super::format::relative_time;
use crate::comments::CommentNode;
use crate::store::CommentScope;
use crate::web::session::Viewer;

/// One comment thread (site-wide, category or link scoped).
pub struct CommentThread<'a> {
    nodes: &'a [CommentNode],
    scope: CommentScope,
    viewer: Option<&'a Viewer>,
    /// Path the mutation handlers redirect back to.
    return_to: &'a str,
    now: DateTime<Utc>,
}

impl<'a> CommentThread<'a> {
    #[must_use]
    pub fn new(
        nodes: &'a [CommentNode],
        scope: CommentScope,
        viewer: Option<&'a Viewer>,
        return_to: &'a str,
    ) -> Self {
        Self {
            nodes,
            scope,
            viewer,
            return_to,
            now: Utc::now(),
        }
    }

    #[must_use]
    pub fn render(&self) -> Markup {
        html! {
            div class="comment-panel" {
                (self.post_form(None, "说点什么…", "发表"))
                @if self.nodes.is_empty() {
                    p class="muted" { "暂无评论，抢个沙发吧～" }
                } @else {
                    (self.render_forest())
                }
            }
        }
    }

    fn post_form(&self, parent_id: Option<i64>, placeholder: &str, label: &str) -> Markup {
        if self.viewer.is_none() {
            return html! {
                @if parent_id.is_none() {
                    p class="muted" { "请先登录再评论" }
                }
            };
        }

        let scope_category = self.scope.category_id().map(|id| id.to_string());
        let scope_link = self.scope.link_id().map(|id| id.to_string());
        html! {
            form method="post" action="/comments" {
                @if let Some(category) = &scope_category {
                    input type="hidden" name="category_id" value=(category);
                }
                @if let Some(link) = &scope_link {
                    input type="hidden" name="link_id" value=(link);
                }
                @if let Some(parent) = parent_id {
                    input type="hidden" name="parent_id" value=(parent);
                }
                (hidden_input("next", self.return_to))
                textarea name="content" placeholder=(placeholder) {}
                p { button type="submit" { (label) } }
            }
        }
    }

    /// Assemble the nested markup bottom-up over an explicit worklist,
    /// mirroring how the tree itself is built; reply chains of any depth
    /// render without recursion.
    fn render_forest(&self) -> Markup {
        let mut discovery: Vec<&CommentNode> = Vec::new();
        let mut stack: Vec<&CommentNode> = self.nodes.iter().collect();
        while let Some(node) = stack.pop() {
            discovery.push(node);
            stack.extend(node.replies.iter());
        }

        let mut rendered: HashMap<i64, Markup> = HashMap::with_capacity(discovery.len());
        for node in discovery.iter().rev() {
            let children: Vec<Markup> = node
                .replies
                .iter()
                .filter_map(|reply| rendered.remove(&reply.comment.id))
                .collect();
            let markup = html! {
                li class="comment-row" {
                    (self.comment_box(node))
                    @if !children.is_empty() {
                        ul class="comment-children" {
                            @for child in &children { (child) }
                        }
                    }
                }
            };
            rendered.insert(node.comment.id, markup);
        }

        html! {
            ul class="comment-list" {
                @for node in self.nodes {
                    @if let Some(markup) = rendered.remove(&node.comment.id) { (markup) }
                }
            }
        }
    }

    fn comment_box(&self, node: &CommentNode) -> Markup {
        let author = node.comment.author_name.as_deref().unwrap_or("匿名");
        let admin = self.viewer.is_some_and(|v| v.is_admin);
        html! {
            div class="comment-box" {
                p {
                    strong { (author) }
                    " "
                    span class="muted" {
                        (relative_time(node.comment.created_at.as_deref(), self.now))
                    }
                }
                p { (node.comment.content) }
                @if self.viewer.is_some() {
                    details {
                        summary { "回复" }
                        (self.post_form(
                            Some(node.comment.id),
                            &format!("回复 {author}…"),
                            "发送回复",
                        ))
                    }
                }
                @if admin {
                    form class="inline" method="post"
                        action={ "/comments/" (node.comment.id) "/delete" }
                        onsubmit="return confirm('确认删除该评论？')" {
                        input type="hidden" name="next" value=(self.return_to);
                        button class="plain danger" type="submit" { "删除" }
                    }
                }
            }
        }
    }
}
