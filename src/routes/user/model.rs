use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use validator::Validate;

use crate::session::SessionUser;

/// 角色为封闭枚举，非法取值在反序列化边界直接拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reporter,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reporter => "reporter",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reporter" => Ok(Role::Reporter),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// 数据库中以 TEXT 存储
impl sqlx::Type<sqlx::Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Role {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse::<Role>().map_err(Into::into)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// 管理员建号必须显式指定角色
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestResetRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ResetRequestResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub message: String,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

impl User {
    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }

    pub async fn create(
        pool: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY role, username"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn update_password_hash(
        conn: &mut PgConnection,
        id: i32,
        password_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET password_hash = $1
            WHERE id = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(password_hash)
        .bind(id)
        .fetch_optional(conn)
        .await
    }
}

/// 单次有效的密码重置令牌，库中只存摘要
pub struct PasswordResetToken;

impl PasswordResetToken {
    /// 新令牌顶替该用户此前未用完的令牌
    pub async fn issue(
        pool: &PgPool,
        user_id: i32,
        token_digest: &str,
        ttl: Duration,
    ) -> Result<(), sqlx::Error> {
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);

        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_digest, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(token_digest)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// 删除并返回所属用户，保证令牌恰好被消费一次；
    /// 过期令牌在此一并视为不存在
    pub async fn consume(
        conn: &mut PgConnection,
        token_digest: &str,
    ) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            r#"
            DELETE FROM password_reset_tokens
            WHERE token_digest = $1 AND expires_at > now()
            RETURNING user_id
            "#,
        )
        .bind(token_digest)
        .fetch_optional(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_serde() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), r#""admin""#);
        assert_eq!(
            serde_json::from_str::<Role>(r#""reporter""#).unwrap(),
            Role::Reporter
        );
    }

    #[test]
    fn unknown_role_is_rejected_at_the_boundary() {
        assert!(serde_json::from_str::<Role>(r#""superuser""#).is_err());
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn serialized_user_never_contains_the_password_field() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: "$2b$12$abcdefghijklmnopqrstuv".into(),
            role: Role::Reporter,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert!(value.get("password").is_none());
        assert_eq!(value["username"], "alice");
        assert_eq!(value["role"], "reporter");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn register_validation_reports_every_failing_field() {
        let req = RegisterRequest {
            username: "".into(),
            email: "not-an-email".into(),
            password: "short".into(),
            role: None,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn reset_request_uses_camel_case_wire_names() {
        let req: ResetPasswordRequest =
            serde_json::from_str(r#"{"token":"abc","newPassword":"secret1"}"#).unwrap();
        assert_eq!(req.new_password, "secret1");
        assert!(req.validate().is_ok());

        let short: ResetPasswordRequest =
            serde_json::from_str(r#"{"token":"abc","newPassword":"abc"}"#).unwrap();
        assert!(short.validate().is_err());
    }
}
