//! Auth views: login, signup, password-reset request and recovery.
//!
//! The platform does the real work; these pages only collect input. The
//! recovery page has one job the server cannot do: the platform puts the
//! recovery token in the URL fragment, which never reaches the server, so
//! a small inline script copies it into the form.

use maud::{html, Markup, PreEscaped};

use super::PageContext;
use crate::components::form::{labeled_password_input, labeled_text_input, submit_button};
use crate::components::Alert;

/// Copies the recovery access token from the URL fragment into the form.
const RECOVERY_TOKEN_SCRIPT: &str = r#"(function() {
    var match = location.hash.match(/access_token=([^&]+)/);
    if (match) {
        document.getElementById('recover-token').value = decodeURIComponent(match[1]);
    }
})();"#;

fn auth_tabs(active: &str) -> Markup {
    html! {
        div class="tabs" {
            a class=[(active == "login").then_some("active")] href="/login" { "登录" }
            a class=[(active == "signup").then_some("active")] href="/signup" { "注册" }
        }
    }
}

#[must_use]
pub fn render_login(ctx: &PageContext<'_>, message: Option<&str>) -> Markup {
    ctx.layout("登录").render(html! {
        (auth_tabs("login"))
        div class="box" {
            @if let Some(message) = message {
                (Alert::error(message))
            }
            form method="post" action="/login" {
                (labeled_text_input("用户名或邮箱", "identifier", "", "用户名或邮箱"))
                (labeled_password_input("密码", "password"))
                p { (submit_button("登录")) }
            }
            p { a href="/reset" { "忘记密码?" } }
        }
    })
}

#[must_use]
pub fn render_signup(ctx: &PageContext<'_>, message: Option<&str>) -> Markup {
    ctx.layout("注册").render(html! {
        (auth_tabs("signup"))
        div class="box" {
            @if let Some(message) = message {
                (Alert::error(message))
            }
            form method="post" action="/signup" {
                (labeled_text_input("用户名", "username", "", "用户名"))
                (labeled_text_input("邮箱", "email", "", "邮箱"))
                (labeled_password_input("密码", "password"))
                p { (submit_button("注册")) }
            }
        }
    })
}

#[must_use]
pub fn render_reset(ctx: &PageContext<'_>, message: Option<&str>) -> Markup {
    ctx.layout("重置密码").render(html! {
        div class="box" {
            @if let Some(message) = message {
                (Alert::error(message))
            }
            form method="post" action="/reset" {
                (labeled_text_input("邮箱", "email", "", "邮箱"))
                p { (submit_button("发送重置邮件")) }
            }
        }
    })
}

#[must_use]
pub fn render_recover(ctx: &PageContext<'_>, message: Option<&str>) -> Markup {
    ctx.layout("设置新密码").render(html! {
        div class="box" {
            @if let Some(message) = message {
                (Alert::error(message))
            }
            form method="post" action="/recover" {
                input type="hidden" id="recover-token" name="access_token" value="";
                (labeled_password_input("新密码", "new_password"))
                p { (submit_button("设置新密码")) }
            }
            script { (PreEscaped(RECOVERY_TOKEN_SCRIPT)) }
        }
    })
}
