use axum::Json;
use axum::extract::rejection::JsonRejection;
use bcrypt::{DEFAULT_COST, hash, verify};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// bcrypt 为 CPU 密集操作，放到阻塞线程池执行
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(password.as_bytes(), DEFAULT_COST)).await??;
    Ok(hashed)
}

pub async fn verify_password(password: &str, hashed: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let hashed = hashed.to_owned();
    let matches =
        tokio::task::spawn_blocking(move || verify(password.as_bytes(), &hashed)).await??;
    Ok(matches)
}

/// 不可猜测的不透明令牌，用于会话和密码重置
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 重置令牌入库前先做摘要，数据库不保存明文令牌
pub fn digest_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// 统一的请求体入口：先解析 JSON，再跑字段校验
pub fn validated<T: Validate>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    let Json(value) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    value.validate()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_password_is_never_the_plaintext() {
        let hashed = hash_password("secret1").await.unwrap();
        assert_ne!(hashed, "secret1");
        assert!(verify_password("secret1", &hashed).await.unwrap());
        assert!(!verify_password("secret2", &hashed).await.unwrap());
    }

    #[test]
    fn tokens_are_opaque_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_digest_is_stable_hex() {
        let digest = digest_token("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, digest_token("abc"));
        assert_ne!(digest, digest_token("abd"));
    }
}
