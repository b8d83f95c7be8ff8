//! Router and handlers.
//!
//! Reads go through the prefetch cache and degrade on failure; mutations
//! validate first, go straight to the platform, invalidate the cache and
//! redirect. A failed mutation renders a blocking error page and applies
//! no partial state. Nothing is retried automatically.

use std::collections::HashSet;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use super::pages::{self, PageContext};
use super::session::{
    avatar_cookie, clear_avatar_cookie, clear_session_cookie, session_cookie, theme_cookie,
    MaybeViewer, RequireAdmin, RequireViewer, Theme, ThemePref, Viewer,
};
use super::AppState;
use crate::comments::build_comment_tree;
use crate::favorites;
use crate::store::{looks_like_email, CommentScope, NewComment, NewLink, UserProfile};

const MIN_PASSWORD_LEN: usize = 6;

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/category/:id", get(category_page))
        .route("/collection", get(collection_page))
        .route("/settings", get(settings_page))
        .route("/settings/theme", post(set_theme))
        .route("/settings/profile", post(save_profile))
        .route("/settings/email", post(save_email))
        .route("/settings/password", post(save_password))
        .route("/settings/avatar", post(upload_avatar))
        .route("/login", get(login_page).post(login))
        .route("/signup", get(signup_page).post(signup))
        .route("/reset", get(reset_page).post(request_reset))
        .route("/recover", get(recover_page).post(set_recovered_password))
        .route("/logout", post(logout))
        .route("/categories", post(create_category))
        .route("/categories/:id/rename", post(rename_category))
        .route("/categories/:id/delete", post(delete_category))
        .route("/links", post(create_link))
        .route("/links/:id/edit", post(edit_link))
        .route("/links/:id/delete", post(delete_link))
        .route("/links/:id/feature", post(feature_link))
        .route("/comments", post(post_comment))
        .route("/comments/:id/delete", post(delete_comment))
        .route("/favorites/add", post(add_favorite))
        .route("/favorites/remove", post(remove_favorite))
        .route("/healthz", get(health))
}

fn ctx<'a>(state: &'a AppState, theme: Theme, viewer: Option<&'a Viewer>) -> PageContext<'a> {
    PageContext {
        site_title: &state.config.site_title,
        theme,
        viewer,
    }
}

/// Redirect target from a form's `next` field; only same-site paths.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") {
        next
    } else {
        "/"
    }
}

fn redirect_with_message(path: &str, message: &str) -> Redirect {
    // Query values must be percent-encoded; messages are not ASCII.
    let location = format!("{path}?m={}", urlencoding::encode(message));
    Redirect::to(&location)
}

// ========== Pages ==========

async fn home(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    MaybeViewer(viewer): MaybeViewer,
) -> Response {
    let snapshot = state.cache.ensure().await;
    let site_comments = state
        .cache
        .comments_for(CommentScope::SiteWide)
        .unwrap_or_default();
    let thread = build_comment_tree(&site_comments);

    pages::home::render_home(&ctx(&state, theme, viewer.as_ref()), &snapshot, &thread)
        .into_response()
}

async fn category_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ThemePref(theme): ThemePref,
    MaybeViewer(viewer): MaybeViewer,
) -> Response {
    let snapshot = state.cache.ensure().await;

    let Some(category) = snapshot.categories.iter().find(|c| c.id == id) else {
        return (StatusCode::NOT_FOUND, "栏目不存在").into_response();
    };

    let links = state.cache.links_for_category(id).unwrap_or_default();

    // Which of these links the viewer has favorited. A failed user fetch
    // degrades to "none marked"; the collection page is where failures
    // surface explicitly.
    let favorited: HashSet<i64> = match &viewer {
        Some(viewer) => match state.cache.ensure_user(&viewer.user.id).await {
            Ok(user) => {
                let collection_ids: HashSet<i64> = user
                    .collections
                    .iter()
                    .filter(|c| c.category_id == Some(id))
                    .map(|c| c.id)
                    .collect();
                user.items
                    .iter()
                    .filter(|item| collection_ids.contains(&item.collection_id))
                    .map(|item| item.link_id)
                    .collect()
            }
            Err(e) => {
                tracing::error!("Failed to load viewer favorites: {e}");
                HashSet::new()
            }
        },
        None => HashSet::new(),
    };

    pages::category::render_category(
        &ctx(&state, theme, viewer.as_ref()),
        category,
        &links,
        &snapshot.comments,
        &favorited,
    )
    .into_response()
}

#[derive(Debug, Deserialize)]
struct TabQuery {
    tab: Option<i64>,
}

async fn collection_page(
    State(state): State<AppState>,
    Query(query): Query<TabQuery>,
    ThemePref(theme): ThemePref,
    RequireViewer(viewer): RequireViewer,
) -> Response {
    let snapshot = state.cache.ensure().await;

    match state.cache.ensure_user(&viewer.user.id).await {
        Ok(user) => pages::collection::render_collection(
            &ctx(&state, theme, Some(&viewer)),
            &snapshot,
            &user,
            query.tab,
        )
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to load collections: {e}");
            pages::error_page(
                &ctx(&state, theme, Some(&viewer)),
                "加载收藏失败，请刷新重试",
                "/collection",
            )
            .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    m: Option<String>,
}

async fn settings_page(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    ThemePref(theme): ThemePref,
    MaybeViewer(viewer): MaybeViewer,
) -> Response {
    let profile = match &viewer {
        Some(viewer) => match state.store.profile(&viewer.user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::error!("Failed to load profile: {e}");
                None
            }
        },
        None => None,
    };

    pages::settings::render_settings(
        &ctx(&state, theme, viewer.as_ref()),
        profile.as_ref(),
        query.m.as_deref(),
    )
    .into_response()
}

async fn health() -> &'static str {
    "OK"
}

// ========== Auth ==========

async fn login_page(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    MaybeViewer(viewer): MaybeViewer,
) -> Response {
    if viewer.is_some() {
        return Redirect::to("/").into_response();
    }
    pages::auth::render_login(&ctx(&state, theme, None), None).into_response()
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    identifier: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    Form(form): Form<LoginForm>,
) -> Response {
    let page = ctx(&state, theme, None);
    let identifier = form.identifier.trim();
    if identifier.is_empty() || form.password.is_empty() {
        return pages::auth::render_login(&page, Some("请输入用户名和密码")).into_response();
    }

    let email = match state.store.resolve_email(identifier).await {
        Ok(Some(email)) => email,
        Ok(None) => {
            return pages::auth::render_login(&page, Some("用户名或邮箱不存在")).into_response();
        }
        Err(e) => {
            tracing::error!("Identifier resolution failed: {e}");
            return pages::auth::render_login(&page, Some("登录失败，请稍后重试")).into_response();
        }
    };

    let session = match state
        .store
        .platform()
        .sign_in_with_password(&email, &form.password)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Sign-in rejected: {e}");
            return pages::auth::render_login(&page, Some("邮箱或密码不正确")).into_response();
        }
    };

    let mut cookies = vec![session_cookie(
        &session.access_token,
        session.expires_in.unwrap_or(3600),
    )];
    if let Some(avatar) = session.user.avatar_url() {
        cookies.push(avatar_cookie(avatar));
    }
    let headers: Vec<(_, String)> = cookies.into_iter().map(|c| (SET_COOKIE, c)).collect();
    (AppendHeaders(headers), Redirect::to("/")).into_response()
}

async fn signup_page(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
) -> Response {
    pages::auth::render_signup(&ctx(&state, theme, None), None).into_response()
}

#[derive(Debug, Deserialize)]
struct SignupForm {
    username: String,
    email: String,
    password: String,
}

async fn signup(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    Form(form): Form<SignupForm>,
) -> Response {
    let page = ctx(&state, theme, None);
    let username = form.username.trim();
    let email = form.email.trim();

    if username.is_empty() {
        return pages::auth::render_signup(&page, Some("请输入用户名")).into_response();
    }
    if !looks_like_email(email) {
        return pages::auth::render_signup(&page, Some("请输入有效邮箱作为注册邮箱"))
            .into_response();
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return pages::auth::render_signup(&page, Some("密码长度至少 6 位")).into_response();
    }

    match state
        .store
        .platform()
        .sign_up(email, &form.password, username)
        .await
    {
        Ok(()) => pages::notice_page(
            &page,
            "注册",
            "注册成功，已发送验证邮件，请前往邮箱验证后再登录",
            "/login",
        )
        .into_response(),
        Err(e) => {
            tracing::warn!("Sign-up rejected: {e}");
            pages::auth::render_signup(&page, Some("注册失败，请稍后重试")).into_response()
        }
    }
}

async fn reset_page(State(state): State<AppState>, ThemePref(theme): ThemePref) -> Response {
    pages::auth::render_reset(&ctx(&state, theme, None), None).into_response()
}

#[derive(Debug, Deserialize)]
struct ResetForm {
    email: String,
}

async fn request_reset(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    Form(form): Form<ResetForm>,
) -> Response {
    let page = ctx(&state, theme, None);
    let email = form.email.trim();
    if !looks_like_email(email) {
        return pages::auth::render_reset(&page, Some("请输入有效邮箱以重置密码")).into_response();
    }

    let redirect_to = format!("{}/recover", state.config.site_url.trim_end_matches('/'));
    match state
        .store
        .platform()
        .send_recovery_email(email, &redirect_to)
        .await
    {
        Ok(()) => pages::notice_page(
            &page,
            "重置密码",
            "已发送密码重置邮件，请前往邮箱操作",
            "/login",
        )
        .into_response(),
        Err(e) => {
            tracing::warn!("Recovery email failed: {e}");
            pages::auth::render_reset(&page, Some("发送失败，请稍后重试")).into_response()
        }
    }
}

async fn recover_page(State(state): State<AppState>, ThemePref(theme): ThemePref) -> Response {
    pages::auth::render_recover(&ctx(&state, theme, None), None).into_response()
}

#[derive(Debug, Deserialize)]
struct RecoverForm {
    access_token: String,
    new_password: String,
}

async fn set_recovered_password(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    Form(form): Form<RecoverForm>,
) -> Response {
    let page = ctx(&state, theme, None);
    if form.access_token.is_empty() {
        return pages::auth::render_recover(&page, Some("重置链接无效，请重新申请"))
            .into_response();
    }
    if form.new_password.chars().count() < MIN_PASSWORD_LEN {
        return pages::auth::render_recover(&page, Some("密码长度至少 6 位")).into_response();
    }

    match state
        .store
        .platform()
        .update_password(&form.access_token, &form.new_password)
        .await
    {
        Ok(()) => pages::notice_page(&page, "重置密码", "密码已重置，请使用新密码登录", "/login")
            .into_response(),
        Err(e) => {
            tracing::warn!("Password recovery failed: {e}");
            pages::auth::render_recover(&page, Some("重置失败，请重新申请重置邮件"))
                .into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, MaybeViewer(viewer): MaybeViewer) -> Response {
    if let Some(viewer) = viewer {
        if let Err(e) = state.store.platform().sign_out(&viewer.access_token).await {
            tracing::warn!("Sign-out failed: {e}");
        }
    }
    state.cache.invalidate_user();

    let headers = AppendHeaders([
        (SET_COOKIE, clear_session_cookie()),
        (SET_COOKIE, clear_avatar_cookie()),
    ]);
    (headers, Redirect::to("/")).into_response()
}

// ========== Categories (admin) ==========

#[derive(Debug, Deserialize)]
struct CategoryForm {
    name: String,
    next: String,
}

async fn create_category(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    RequireAdmin(viewer): RequireAdmin,
    Form(form): Form<CategoryForm>,
) -> Response {
    let name = form.name.trim();
    let back = safe_next(&form.next);
    if name.is_empty() {
        return pages::error_page(&ctx(&state, theme, Some(&viewer)), "栏目名称不能为空", back)
            .into_response();
    }

    let store = state.store.as_user(&viewer.access_token);
    match store.create_category(name).await {
        Ok(_) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Create category failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "新增栏目失败", back)
                .into_response()
        }
    }
}

async fn rename_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ThemePref(theme): ThemePref,
    RequireAdmin(viewer): RequireAdmin,
    Form(form): Form<CategoryForm>,
) -> Response {
    let name = form.name.trim();
    let back = safe_next(&form.next);
    if name.is_empty() {
        return pages::error_page(&ctx(&state, theme, Some(&viewer)), "栏目名称不能为空", back)
            .into_response();
    }

    let store = state.store.as_user(&viewer.access_token);
    match store.rename_category(id, name).await {
        Ok(_) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Rename category failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "修改栏目失败", back)
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct NextForm {
    next: String,
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ThemePref(theme): ThemePref,
    RequireAdmin(viewer): RequireAdmin,
    Form(form): Form<NextForm>,
) -> Response {
    let back = safe_next(&form.next);
    let store = state.store.as_user(&viewer.access_token);
    match store.delete_category(id).await {
        Ok(()) => {
            state.cache.invalidate();
            Redirect::to("/").into_response()
        }
        Err(e) => {
            tracing::error!("Delete category failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "删除栏目失败", back)
                .into_response()
        }
    }
}

// ========== Links (admin) ==========

#[derive(Debug, Deserialize)]
struct NewLinkForm {
    category_id: i64,
    title: String,
    url: String,
    next: String,
}

async fn create_link(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    RequireAdmin(viewer): RequireAdmin,
    Form(form): Form<NewLinkForm>,
) -> Response {
    let title = form.title.trim();
    let url = form.url.trim();
    let back = safe_next(&form.next);
    if title.is_empty() || url.is_empty() {
        return pages::error_page(
            &ctx(&state, theme, Some(&viewer)),
            "标题和链接都不能为空",
            back,
        )
        .into_response();
    }

    let store = state.store.as_user(&viewer.access_token);
    let new_link = NewLink {
        category_id: form.category_id,
        title: title.to_string(),
        url: url.to_string(),
    };
    match store.create_link(&new_link).await {
        Ok(_) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Create link failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "添加内容失败", back)
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct EditLinkForm {
    title: String,
    url: String,
    next: String,
}

async fn edit_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ThemePref(theme): ThemePref,
    RequireAdmin(viewer): RequireAdmin,
    Form(form): Form<EditLinkForm>,
) -> Response {
    let title = form.title.trim();
    let url = form.url.trim();
    let back = safe_next(&form.next);
    if title.is_empty() || url.is_empty() {
        return pages::error_page(
            &ctx(&state, theme, Some(&viewer)),
            "标题和链接都不能为空",
            back,
        )
        .into_response();
    }

    let store = state.store.as_user(&viewer.access_token);
    match store.update_link(id, title, url).await {
        Ok(_) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Edit link failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "保存内容失败", back)
                .into_response()
        }
    }
}

async fn delete_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ThemePref(theme): ThemePref,
    RequireAdmin(viewer): RequireAdmin,
    Form(form): Form<NextForm>,
) -> Response {
    let back = safe_next(&form.next);
    let store = state.store.as_user(&viewer.access_token);
    match store.delete_link(id).await {
        Ok(()) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Delete link failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "删除内容失败", back)
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureForm {
    featured: bool,
    next: String,
}

async fn feature_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ThemePref(theme): ThemePref,
    RequireAdmin(viewer): RequireAdmin,
    Form(form): Form<FeatureForm>,
) -> Response {
    let back = safe_next(&form.next);
    let store = state.store.as_user(&viewer.access_token);
    match store.set_link_featured(id, form.featured).await {
        Ok(()) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Feature toggle failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "设置推荐失败", back)
                .into_response()
        }
    }
}

// ========== Comments ==========

#[derive(Debug, Deserialize)]
struct CommentPostForm {
    content: String,
    category_id: Option<i64>,
    link_id: Option<i64>,
    parent_id: Option<i64>,
    next: String,
}

async fn post_comment(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    RequireViewer(viewer): RequireViewer,
    Form(form): Form<CommentPostForm>,
) -> Response {
    let content = form.content.trim();
    let back = safe_next(&form.next);
    if content.is_empty() {
        return pages::error_page(&ctx(&state, theme, Some(&viewer)), "评论内容不能为空", back)
            .into_response();
    }

    // Normalize through the scope type so a link id without a category id
    // cannot reach the platform.
    let scope = CommentScope::from_ids(form.category_id, form.link_id);
    let new_comment = NewComment {
        content: content.to_string(),
        category_id: scope.category_id(),
        link_id: scope.link_id(),
        parent_id: form.parent_id,
        author_id: viewer.user.id.clone(),
        author_name: viewer.display_name(),
        author_email: viewer.user.email.clone(),
    };

    let store = state.store.as_user(&viewer.access_token);
    match store.create_comment(&new_comment).await {
        Ok(_) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Post comment failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "发表评论失败", back)
                .into_response()
        }
    }
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ThemePref(theme): ThemePref,
    RequireAdmin(viewer): RequireAdmin,
    Form(form): Form<NextForm>,
) -> Response {
    let back = safe_next(&form.next);
    let store = state.store.as_user(&viewer.access_token);
    match store.delete_comment(id).await {
        Ok(()) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Delete comment failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "删除评论失败", back)
                .into_response()
        }
    }
}

// ========== Favorites ==========

#[derive(Debug, Deserialize)]
struct FavoriteForm {
    category_id: i64,
    link_id: i64,
    next: String,
}

async fn add_favorite(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    RequireViewer(viewer): RequireViewer,
    Form(form): Form<FavoriteForm>,
) -> Response {
    let back = safe_next(&form.next);

    // Collections are named after the category they mirror.
    let snapshot = state.cache.ensure().await;
    let category_name = snapshot
        .categories
        .iter()
        .find(|c| c.id == form.category_id)
        .map_or_else(|| format!("栏目 #{}", form.category_id), |c| c.name.clone());

    let store = state.store.as_user(&viewer.access_token);
    match favorites::add_favorite(
        &store,
        &viewer.user.id,
        form.category_id,
        &category_name,
        form.link_id,
    )
    .await
    {
        Ok(_) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Add favorite failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "收藏失败", back)
                .into_response()
        }
    }
}

async fn remove_favorite(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    RequireViewer(viewer): RequireViewer,
    Form(form): Form<FavoriteForm>,
) -> Response {
    let back = safe_next(&form.next);
    let store = state.store.as_user(&viewer.access_token);
    match favorites::remove_favorite(&store, &viewer.user.id, form.category_id, form.link_id).await
    {
        Ok(_) => {
            state.cache.invalidate();
            Redirect::to(back).into_response()
        }
        Err(e) => {
            tracing::error!("Remove favorite failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "取消收藏失败", back)
                .into_response()
        }
    }
}

// ========== Settings ==========

#[derive(Debug, Deserialize)]
struct ThemeForm {
    theme: String,
}

async fn set_theme(Form(form): Form<ThemeForm>) -> Response {
    let theme = Theme::parse(&form.theme);
    (
        AppendHeaders([(SET_COOKIE, theme_cookie(theme))]),
        Redirect::to("/settings"),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct ProfileForm {
    username: String,
}

async fn save_profile(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    RequireViewer(viewer): RequireViewer,
    Form(form): Form<ProfileForm>,
) -> Response {
    let username = form.username.trim();
    if username.is_empty() {
        return pages::error_page(&ctx(&state, theme, Some(&viewer)), "用户名不能为空", "/settings")
            .into_response();
    }

    let store = state.store.as_user(&viewer.access_token);
    let profile = UserProfile {
        id: viewer.user.id.clone(),
        username: Some(username.to_string()),
        email: viewer.user.email.clone(),
        avatar_url: None,
    };
    if let Err(e) = store.upsert_profile(&profile).await {
        tracing::error!("Profile upsert failed: {e}");
        return pages::error_page(&ctx(&state, theme, Some(&viewer)), "保存用户名失败", "/settings")
            .into_response();
    }

    // Keeping account metadata in sync is best-effort, like the profile row
    // is the source of truth for username lookups.
    if let Err(e) = state
        .store
        .platform()
        .update_metadata(
            &viewer.access_token,
            &serde_json::json!({ "username": username }),
        )
        .await
    {
        tracing::warn!("Metadata update failed: {e}");
    }

    redirect_with_message("/settings", "用户名已更新").into_response()
}

#[derive(Debug, Deserialize)]
struct EmailForm {
    email: String,
}

async fn save_email(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    RequireViewer(viewer): RequireViewer,
    Form(form): Form<EmailForm>,
) -> Response {
    let email = form.email.trim();
    if !looks_like_email(email) {
        return pages::error_page(&ctx(&state, theme, Some(&viewer)), "请输入有效邮箱", "/settings")
            .into_response();
    }

    if let Err(e) = state
        .store
        .platform()
        .update_email(&viewer.access_token, email)
        .await
    {
        tracing::error!("Email update failed: {e}");
        return pages::error_page(&ctx(&state, theme, Some(&viewer)), "更新邮箱失败", "/settings")
            .into_response();
    }

    let store = state.store.as_user(&viewer.access_token);
    let profile = UserProfile {
        id: viewer.user.id.clone(),
        username: None,
        email: Some(email.to_string()),
        avatar_url: None,
    };
    if let Err(e) = store.upsert_profile(&profile).await {
        tracing::warn!("Profile email sync failed: {e}");
    }

    redirect_with_message("/settings", "邮箱更新请求已提交，请查收确认邮件").into_response()
}

#[derive(Debug, Deserialize)]
struct PasswordForm {
    new_password: String,
}

async fn save_password(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    RequireViewer(viewer): RequireViewer,
    Form(form): Form<PasswordForm>,
) -> Response {
    if form.new_password.chars().count() < MIN_PASSWORD_LEN {
        return pages::error_page(&ctx(&state, theme, Some(&viewer)), "密码长度至少 6 位", "/settings")
            .into_response();
    }

    match state
        .store
        .platform()
        .update_password(&viewer.access_token, &form.new_password)
        .await
    {
        Ok(()) => redirect_with_message("/settings", "密码已更新").into_response(),
        Err(e) => {
            tracing::error!("Password update failed: {e}");
            pages::error_page(&ctx(&state, theme, Some(&viewer)), "更新密码失败", "/settings")
                .into_response()
        }
    }
}

async fn upload_avatar(
    State(state): State<AppState>,
    ThemePref(theme): ThemePref,
    RequireViewer(viewer): RequireViewer,
    mut multipart: Multipart,
) -> Response {
    let page_error = |message: &str| {
        pages::error_page(&ctx(&state, theme, Some(&viewer)), message, "/settings")
            .into_response()
    };

    let mut file_name = String::new();
    let mut content_type: Option<String> = None;
    let mut bytes: Vec<u8> = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("avatar") => {
                file_name = field.file_name().unwrap_or("avatar.png").to_string();
                content_type = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(data) => bytes = data.to_vec(),
                    Err(e) => {
                        tracing::error!("Avatar read failed: {e}");
                        return page_error("读取图片失败");
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Multipart error: {e}");
                return page_error("上传失败");
            }
        }
    }

    if bytes.is_empty() {
        return page_error("请选择要上传的图片");
    }

    let content_type = content_type.unwrap_or_else(|| {
        mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string()
    });
    let path = crate::platform::storage::avatar_object_path(&viewer.user.id, &file_name);

    let public_url = match state
        .store
        .platform()
        .upload_public_object(
            &viewer.access_token,
            crate::platform::storage::AVATAR_BUCKET,
            &path,
            bytes,
            &content_type,
        )
        .await
    {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Avatar upload failed: {e}");
            return page_error("上传头像失败");
        }
    };

    let store = state.store.as_user(&viewer.access_token);
    let profile = UserProfile {
        id: viewer.user.id.clone(),
        username: None,
        email: viewer.user.email.clone(),
        avatar_url: Some(public_url.clone()),
    };
    if let Err(e) = store.upsert_profile(&profile).await {
        tracing::error!("Avatar profile update failed: {e}");
        return page_error("保存头像失败");
    }
    if let Err(e) = state
        .store
        .platform()
        .update_metadata(
            &viewer.access_token,
            &serde_json::json!({ "avatar_url": public_url }),
        )
        .await
    {
        tracing::warn!("Avatar metadata update failed: {e}");
    }

    (
        AppendHeaders([(SET_COOKIE, avatar_cookie(&public_url))]),
        redirect_with_message("/settings", "头像已更新"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_rejects_offsite_targets() {
        assert_eq!(safe_next("/category/3"), "/category/3");
        assert_eq!(safe_next("https://evil.example"), "/");
        assert_eq!(safe_next("//evil.example"), "/");
        assert_eq!(safe_next(""), "/");
    }

    #[test]
    fn test_message_query_values_are_percent_encoded() {
        let encoded = format!("/settings?m={}", urlencoding::encode("密码已更新"));
        assert!(encoded.starts_with("/settings?m=%"));
        assert!(encoded.is_ascii());
    }
}
