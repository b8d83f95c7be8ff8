//! Settings view: theme preference, profile, credentials and avatar.

use maud::{html, Markup};

use super::PageContext;
use crate::components::form::{labeled_password_input, labeled_text_input};
use crate::components::Alert;
use crate::store::UserProfile;
use crate::web::session::Theme;

#[must_use]
pub fn render_settings(
    ctx: &PageContext<'_>,
    profile: Option<&UserProfile>,
    message: Option<&str>,
) -> Markup {
    ctx.layout("設定").render(html! {
        h1 { "設定" }
        @if let Some(message) = message {
            (Alert::success(message))
        }

        section class="box" {
            h2 { "主题" }
            form method="post" action="/settings/theme" {
                @for (value, label) in [
                    (Theme::Light, "亮色主题"),
                    (Theme::Dark, "暗色主题"),
                    (Theme::System, "跟随系统"),
                ] {
                    label style="display:inline-flex;align-items:center;gap:0.3rem;margin-right:1rem;" {
                        input type="radio" name="theme" value=(value.as_str())
                            checked[ctx.theme == value];
                        (label)
                    }
                }
                p { button type="submit" { "保存" } }
            }
        }

        @match ctx.viewer {
            Some(viewer) => {
                section class="box" {
                    h2 { "账号" }
                    @let username = profile
                        .and_then(|p| p.username.as_deref())
                        .or_else(|| viewer.user.username())
                        .unwrap_or("");
                    form method="post" action="/settings/profile" {
                        (labeled_text_input("用户名", "username", username, "用户名"))
                        p { button type="submit" { "保存用户名" } }
                    }
                    form method="post" action="/settings/email" {
                        (labeled_text_input(
                            "邮箱",
                            "email",
                            viewer.user.email.as_deref().unwrap_or(""),
                            "邮箱",
                        ))
                        p { button type="submit" { "更新邮箱" } }
                    }
                    form method="post" action="/settings/password" {
                        (labeled_password_input("新密码", "new_password"))
                        p { button type="submit" { "更新密码" } }
                    }
                }

                section class="box" {
                    h2 { "头像" }
                    @if let Some(avatar) = &viewer.avatar_url {
                        p { img class="avatar" src=(avatar) alt="avatar"
                            style="width:64px;height:64px;border-radius:50%;"; }
                    }
                    form method="post" action="/settings/avatar" enctype="multipart/form-data" {
                        p { input type="file" name="avatar" accept="image/*"; }
                        p { button type="submit" { "上传头像" } }
                    }
                }
            }
            None => {
                div class="box" {
                    p class="muted" { "登录后可以修改用户名、邮箱、密码和头像" }
                    p { a class="button" href="/login" { "登录 / 注册" } }
                }
            }
        }
    })
}
