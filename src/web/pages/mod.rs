//! Page templates. Pure rendering: handlers fetch, pages draw.

pub mod auth;
pub mod category;
pub mod collection;
pub mod home;
pub mod settings;

use maud::{html, Markup};

use crate::components::{Alert, BaseLayout};
use crate::web::session::{Theme, Viewer};

/// What every page needs to draw the chrome.
#[derive(Clone, Copy)]
pub struct PageContext<'a> {
    pub site_title: &'a str,
    pub theme: Theme,
    pub viewer: Option<&'a Viewer>,
}

impl<'a> PageContext<'a> {
    #[must_use]
    pub fn layout(&self, title: &'a str) -> BaseLayout<'a> {
        BaseLayout::new(title, self.site_title, self.theme, self.viewer)
    }
}

/// Full page for a failed mutation: the blocking notification plus a way
/// back. No partial state is rendered.
#[must_use]
pub fn error_page(ctx: &PageContext<'_>, message: &str, back: &str) -> Markup {
    ctx.layout("错误").render(html! {
        (Alert::error(message))
        p { a href=(back) { "返回" } }
    })
}

/// Full page for an informational notice (e.g. "check your email").
#[must_use]
pub fn notice_page(ctx: &PageContext<'_>, title: &str, message: &str, back: &str) -> Markup {
    ctx.layout(title).render(html! {
        (Alert::success(message))
        p { a href=(back) { "返回" } }
    })
}
