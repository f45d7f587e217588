use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::Session;
use crate::error::AppError;

/// 进程内会话表，仅用于本地/演示部署，进程重启后全部丢失
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemorySessionStore {
    pub fn insert(&self, session: &Session) -> Result<(), AppError> {
        let mut sessions = self
            .inner
            .write()
            .map_err(|_| AppError::internal("session table lock poisoned"))?;
        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    pub fn get(&self, token: &str) -> Result<Option<Session>, AppError> {
        let found = {
            let sessions = self
                .inner
                .read()
                .map_err(|_| AppError::internal("session table lock poisoned"))?;
            sessions.get(token).cloned()
        };
        match found {
            Some(session) if session.is_expired() => {
                // 惰性清理过期条目
                self.revoke(token)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub fn revoke(&self, token: &str) -> Result<(), AppError> {
        let mut sessions = self
            .inner
            .write()
            .map_err(|_| AppError::internal("session table lock poisoned"))?;
        sessions.remove(token);
        Ok(())
    }

    pub fn purge_expired(&self) -> Result<u64, AppError> {
        let mut sessions = self
            .inner
            .write()
            .map_err(|_| AppError::internal("session table lock poisoned"))?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::routes::user::Role;
    use crate::session::SessionUser;

    fn reporter() -> SessionUser {
        SessionUser {
            id: 1,
            username: "alice".into(),
            role: Role::Reporter,
        }
    }

    fn expired_session() -> Session {
        let mut session = Session::new(reporter(), Duration::from_secs(3600));
        session.expires_at = Utc::now() - chrono::Duration::hours(1);
        session
    }

    #[test]
    fn insert_then_get_roundtrip() {
        let store = MemorySessionStore::default();
        let session = Session::new(reporter(), Duration::from_secs(3600));
        store.insert(&session).unwrap();

        let found = store.get(&session.token).unwrap().unwrap();
        assert_eq!(found.user.id, 1);
        assert_eq!(found.user.username, "alice");
    }

    #[test]
    fn expired_session_authenticates_nothing() {
        let store = MemorySessionStore::default();
        let session = expired_session();
        store.insert(&session).unwrap();

        assert!(store.get(&session.token).unwrap().is_none());
        // 惰性清理已经移除了条目
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[test]
    fn revoke_is_idempotent() {
        let store = MemorySessionStore::default();
        let session = Session::new(reporter(), Duration::from_secs(3600));
        store.insert(&session).unwrap();

        store.revoke(&session.token).unwrap();
        store.revoke(&session.token).unwrap();
        store.revoke("no-such-token").unwrap();
        assert!(store.get(&session.token).unwrap().is_none());
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = MemorySessionStore::default();
        let live = Session::new(reporter(), Duration::from_secs(3600));
        store.insert(&live).unwrap();
        store.insert(&expired_session()).unwrap();
        store.insert(&expired_session()).unwrap();

        assert_eq!(store.purge_expired().unwrap(), 2);
        assert!(store.get(&live.token).unwrap().is_some());
    }
}
