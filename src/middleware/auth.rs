use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::AppState;
use crate::error::AppError;
use crate::routes::user::Role;
use crate::session::{Session, SessionUser};

pub const SESSION_COOKIE: &str = "ct_session";

/// 每个请求解析一次的调用方身份，由认证中间件写入扩展。
/// 中间件本身不拒绝请求，401/403 由各 handler 决定。
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    token: Option<String>,
    user: Option<SessionUser>,
}

impl AuthSession {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn current_user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn current_role(&self) -> Option<Role> {
        self.user.as_ref().map(|user| user.role)
    }

    /// 请求携带的原始令牌，无论会话是否仍然有效
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn require(&self) -> Result<&SessionUser, AppError> {
        self.user.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn require_admin(&self) -> Result<&SessionUser, AppError> {
        let user = self.require()?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden);
        }
        Ok(user)
    }
}

/// 从 Authorization: Bearer 或会话 Cookie 中取出令牌
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
    })
}

/// 登录/注册成功后下发的会话 Cookie。
/// 不设置 max-age：过期由服务端会话存储裁决，残留 Cookie 无效即无害。
pub fn session_cookie(session: &Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = extract_token(request.headers());

    let mut auth = AuthSession {
        token: token.clone(),
        user: None,
    };

    if let Some(token) = &token {
        match state.sessions.get(token).await {
            Ok(Some(session)) => auth.user = Some(session.user),
            Ok(None) => {}
            // 存储故障按未认证处理，错误进日志
            Err(err) => tracing::error!("session lookup failed: {err:?}"),
        }
    }

    request.extensions_mut().insert(auth);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn reporter() -> SessionUser {
        SessionUser {
            id: 7,
            username: "alice".into(),
            role: Role::Reporter,
        }
    }

    fn admin() -> SessionUser {
        SessionUser {
            id: 1,
            username: "root".into(),
            role: Role::Admin,
        }
    }

    #[test]
    fn anonymous_session_exposes_nothing() {
        let auth = AuthSession::default();
        assert!(!auth.is_authenticated());
        assert!(auth.current_user().is_none());
        assert!(auth.current_role().is_none());
        assert!(matches!(auth.require(), Err(AppError::Unauthorized)));
        assert!(matches!(auth.require_admin(), Err(AppError::Unauthorized)));
    }

    #[test]
    fn reporter_is_not_admin() {
        let auth = AuthSession {
            token: Some("t".into()),
            user: Some(reporter()),
        };
        assert!(auth.is_authenticated());
        assert_eq!(auth.current_role(), Some(Role::Reporter));
        assert!(auth.require().is_ok());
        assert!(matches!(auth.require_admin(), Err(AppError::Forbidden)));
    }

    #[test]
    fn admin_passes_both_gates() {
        let auth = AuthSession {
            token: Some("t".into()),
            user: Some(admin()),
        };
        assert_eq!(auth.require_admin().unwrap().username, "root");
    }

    #[test]
    fn token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; ct_session=abc123"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("ct_session=from-cookie"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }
}
