//! Base layout: HTML skeleton, navigation and theme plumbing.

use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::web::session::{Theme, Viewer};

/// Applies the OS preference when the viewer saved "system" (or nothing).
/// Must be inline in <head> so the right theme lands before first paint.
const SYSTEM_THEME_SCRIPT: &str = r#"(function() {
    if (window.matchMedia('(prefers-color-scheme: dark)').matches) {
        document.documentElement.setAttribute('data-theme', 'dark');
    }
})();"#;

const STYLESHEET: &str = r#"
:root { --bg: #fafafa; --bg-box: #ffffff; --text: #1f2328; --muted: #6b7280;
        --border: #e5e7eb; --accent: #2563eb; --danger: #dc2626; --radius: 8px; }
[data-theme="dark"] { --bg: #15181d; --bg-box: #1e2329; --text: #e6e6e6;
        --muted: #9ca3af; --border: #30363d; --accent: #60a5fa; --danger: #f87171; }
* { box-sizing: border-box; }
body { margin: 0; background: var(--bg); color: var(--text);
       font-family: system-ui, "Hiragino Sans", "Noto Sans JP", sans-serif; }
a { color: var(--accent); text-decoration: none; }
nav.topbar { display: flex; align-items: center; gap: 1rem; padding: 0.75rem 1.25rem;
             border-bottom: 1px solid var(--border); background: var(--bg-box); }
nav.topbar .brand { font-weight: 700; font-size: 1.1rem; color: var(--text); }
nav.topbar .spacer { flex: 1; }
nav.topbar img.avatar { width: 28px; height: 28px; border-radius: 50%; vertical-align: middle; }
main.container { max-width: 880px; margin: 0 auto; padding: 1.25rem; }
.box { background: var(--bg-box); border: 1px solid var(--border);
       border-radius: var(--radius); padding: 1rem; margin-bottom: 1rem; }
.muted { color: var(--muted); font-size: 0.875rem; }
.alert { border-radius: var(--radius); padding: 0.75rem 1rem; margin-bottom: 1rem; }
.alert.error { background: rgba(220, 38, 38, 0.1); color: var(--danger); }
.alert.success { background: rgba(22, 163, 74, 0.12); }
button, .button { background: var(--accent); color: #fff; border: none; cursor: pointer;
       border-radius: var(--radius); padding: 0.4rem 0.9rem; font-size: 0.9rem; }
button.danger { background: var(--danger); }
button.plain { background: none; color: var(--accent); padding: 0.2rem 0.4rem; }
input, textarea, select { width: 100%; padding: 0.45rem 0.6rem; border-radius: var(--radius);
       border: 1px solid var(--border); background: var(--bg); color: var(--text); }
textarea { min-height: 4.5rem; resize: vertical; }
form.inline { display: inline; }
ul.comment-list, ul.comment-children { list-style: none; padding-left: 0; }
ul.comment-children { padding-left: 1.5rem; border-left: 2px solid var(--border); }
.comment-box { padding: 0.6rem 0; border-bottom: 1px solid var(--border); }
table.stats { width: 100%; border-collapse: collapse; }
table.stats td, table.stats th { padding: 0.4rem 0.5rem; text-align: left;
       border-bottom: 1px solid var(--border); }
.tabs { display: flex; gap: 0.5rem; flex-wrap: wrap; margin-bottom: 1rem; }
.tabs a { padding: 0.3rem 0.8rem; border: 1px solid var(--border); border-radius: 999px; }
.tabs a.active { background: var(--accent); color: #fff; border-color: var(--accent); }
.site-row { display: flex; align-items: center; gap: 0.6rem; padding: 0.5rem 0;
       border-bottom: 1px solid var(--border); }
.site-row .title { flex: 1; }
"#;

/// Page skeleton builder. The viewer is required so authentication-aware
/// navigation is always an explicit decision; pass `None` for anonymous
/// visitors.
pub struct BaseLayout<'a> {
    title: &'a str,
    site_title: &'a str,
    theme: Theme,
    viewer: Option<&'a Viewer>,
}

impl<'a> BaseLayout<'a> {
    #[must_use]
    pub fn new(
        title: &'a str,
        site_title: &'a str,
        theme: Theme,
        viewer: Option<&'a Viewer>,
    ) -> Self {
        Self {
            title,
            site_title,
            theme,
            viewer,
        }
    }

    /// Render the complete page with `content` inside the main container.
    #[must_use]
    pub fn render(self, content: Markup) -> Markup {
        let explicit_theme = match self.theme {
            Theme::Light => Some("light"),
            Theme::Dark => Some("dark"),
            Theme::System => None,
        };

        html! {
            (DOCTYPE)
            html lang="ja" data-theme=[explicit_theme] {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    meta name="color-scheme" content="light dark";
                    title { (self.title) " - " (self.site_title) }
                    @if explicit_theme.is_none() {
                        script { (PreEscaped(SYSTEM_THEME_SCRIPT)) }
                    }
                    style { (PreEscaped(STYLESHEET)) }
                }
                body {
                    (self.nav())
                    main class="container" {
                        (content)
                    }
                    footer class="container muted" {
                        "© " (self.site_title)
                    }
                }
            }
        }
    }

    fn nav(&self) -> Markup {
        html! {
            nav class="topbar" {
                a class="brand" href="/" { (self.site_title) }
                a href="/" { "ホーム" }
                a href="/collection" { "コレクション" }
                a href="/settings" { "設定" }
                div class="spacer" {}
                @match self.viewer {
                    Some(viewer) => {
                        @if let Some(avatar) = &viewer.avatar_url {
                            img class="avatar" src=(avatar) alt="avatar";
                        }
                        span { (viewer.display_name()) }
                        form class="inline" method="post" action="/logout" {
                            button class="plain" type="submit" { "退出" }
                        }
                    }
                    None => {
                        a class="button" href="/login" { "登录 / 注册" }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_renders_title_and_nav() {
        let page = BaseLayout::new("ホーム", "コレクション", Theme::Light, None)
            .render(html! { h1 { "hello" } })
            .into_string();

        assert!(page.contains("<title>ホーム - コレクション</title>"));
        assert!(page.contains("<html lang=\"ja\" data-theme=\"light\">"));
        assert!(page.contains("登录 / 注册"));
        assert!(page.contains("<h1>hello</h1>"));
    }

    #[test]
    fn test_system_theme_defers_to_script() {
        let page = BaseLayout::new("ホーム", "コレクション", Theme::System, None)
            .render(html! {})
            .into_string();

        assert!(page.contains("<html lang=\"ja\">"));
        assert!(page.contains("prefers-color-scheme"));
    }
}
