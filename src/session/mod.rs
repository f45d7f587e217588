use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::routes::user::Role;
use crate::utils::generate_token;

mod memory;
mod postgres;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

/// 会话中保存的用户身份快照，中间件解析时不再查库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

/// 已认证会话，客户端只持有不透明令牌
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: SessionUser, ttl: Duration) -> Self {
        let now = Utc::now();
        Session {
            token: generate_token(),
            user,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl.as_secs() as i64),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// 会话存储：持久化（Postgres）或进程内（重启即失效）
#[derive(Clone)]
pub enum SessionStore {
    Postgres(PgSessionStore),
    Memory(MemorySessionStore),
}

impl SessionStore {
    pub async fn insert(&self, session: &Session) -> Result<(), AppError> {
        match self {
            SessionStore::Postgres(store) => store.insert(session).await,
            SessionStore::Memory(store) => store.insert(session),
        }
    }

    /// 已过期的会话视同不存在
    pub async fn get(&self, token: &str) -> Result<Option<Session>, AppError> {
        match self {
            SessionStore::Postgres(store) => store.get(token).await,
            SessionStore::Memory(store) => store.get(token),
        }
    }

    /// 幂等：令牌不存在或已过期也算成功
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        match self {
            SessionStore::Postgres(store) => store.revoke(token).await,
            SessionStore::Memory(store) => store.revoke(token),
        }
    }

    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        match self {
            SessionStore::Postgres(store) => store.purge_expired().await,
            SessionStore::Memory(store) => store.purge_expired(),
        }
    }
}
