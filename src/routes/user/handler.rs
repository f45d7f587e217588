use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{
    AppState,
    error::{AppError, is_unique_violation},
    middleware::{AuthSession, SESSION_COOKIE, session_cookie},
    session::Session,
    utils::{digest_token, generate_token, hash_password, validated, verify_password},
};

use super::model::{
    CreateUserRequest, LoginRequest, PasswordResetToken, RegisterRequest, RequestResetRequest,
    ResetPasswordRequest, ResetRequestResponse, Role, User,
};

/// 自助注册，成功后直接建立会话，客户端无需再登录一次
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = validated(payload)?;
    let role = req.role.unwrap_or(Role::Reporter);

    if User::find_by_username(&state.pool, &req.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    let password_hash = hash_password(&req.password).await?;

    // 并发注册同名用户时由唯一约束兜底
    let user = match User::create(&state.pool, &req.username, &req.email, &password_hash, role).await
    {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("Username already exists".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let session = Session::new(user.session_user(), state.config.session_expiration());
    state.sessions.insert(&session).await?;

    tracing::info!("registered user {} ({})", user.username, user.role);
    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(&session)),
        Json(user),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = validated(payload)?;

    // 用户不存在与密码错误对外不可区分，只在日志里留差异
    let user = match User::find_by_username(&state.pool, &req.username).await? {
        Some(user) => user,
        None => {
            tracing::debug!("login failed for {}: unknown username", req.username);
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(&req.password, &user.password_hash).await? {
        tracing::debug!("login failed for {}: wrong password", req.username);
        return Err(AppError::InvalidCredentials);
    }

    let session = Session::new(user.session_user(), state.config.session_expiration());
    state.sessions.insert(&session).await?;

    tracing::info!("user {} logged in", user.username);
    Ok((
        StatusCode::OK,
        jar.add(session_cookie(&session)),
        Json(user),
    ))
}

/// 幂等：重复登出或会话早已过期同样返回 200
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = auth.token() {
        state.sessions.revoke(token).await?;
    }

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    Ok((jar, StatusCode::OK))
}

/// 返回调用方的最新用户记录；记录已消失则按未认证处理
#[axum::debug_handler]
pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
) -> Result<impl IntoResponse, AppError> {
    let caller = auth.require()?;
    let user = User::find_by_id(&state.pool, caller.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(user))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
) -> Result<impl IntoResponse, AppError> {
    auth.require_admin()?;
    let users = User::list_all(&state.pool).await?;
    Ok(Json(users))
}

/// 管理员建号，校验规则与自助注册一致，但不会替调用方换会话
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let admin = auth.require_admin()?.username.clone();
    let req = validated(payload)?;

    if User::find_by_username(&state.pool, &req.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    let password_hash = hash_password(&req.password).await?;

    let user = match User::create(
        &state.pool,
        &req.username,
        &req.email,
        &password_hash,
        req.role,
    )
    .await
    {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("Username already exists".into()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("admin {} created user {} ({})", admin, user.username, user.role);
    Ok((StatusCode::CREATED, Json(user)))
}

#[axum::debug_handler]
pub async fn request_password_reset(
    State(state): State<AppState>,
    payload: Result<Json<RequestResetRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = validated(payload)?;

    let user = User::find_by_username(&state.pool, &req.username)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let token = generate_token();
    PasswordResetToken::issue(
        &state.pool,
        user.id,
        &digest_token(&token),
        state.config.reset_token_expiration(),
    )
    .await?;

    tracing::info!("password reset requested for {}", user.username);

    // 明文令牌只在开发模式下进响应体，生产走邮件
    if state.config.expose_reset_tokens {
        return Ok(Json(ResetRequestResponse {
            token: Some(token),
            message: "Reset token issued".into(),
        }));
    }

    if let Some(mailer) = &state.mailer {
        mailer.notify_password_reset(user.email.clone(), user.username.clone(), token);
    } else {
        tracing::warn!(
            "no mailer configured; reset token for {} cannot be delivered",
            user.username
        );
    }

    Ok(Json(ResetRequestResponse {
        token: None,
        message: "Check your email for reset instructions".into(),
    }))
}

/// 消费重置令牌并改密；不会顺带登录
#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = validated(payload)?;
    let token_digest = digest_token(&req.token);

    let mut tx = state.pool.begin().await?;

    let user_id = PasswordResetToken::consume(&mut tx, &token_digest)
        .await?
        .ok_or(AppError::InvalidToken)?;

    let password_hash = hash_password(&req.new_password).await?;

    let user = User::update_password_hash(&mut tx, user_id, &password_hash)
        .await?
        .ok_or(AppError::InvalidToken)?;

    tx.commit().await?;

    tracing::info!("password reset completed for {}", user.username);
    Ok(Json(user))
}
