use std::env;
use std::fmt;
use std::time::Duration;

/// 会话存储后端，启动时通过 SESSION_STORE 选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub session_store: SessionStoreKind,
    pub session_expiration_secs: u64,
    pub reset_token_expiration_secs: u64,
    /// 开发模式下在响应体中返回重置令牌，生产环境必须关闭
    pub expose_reset_tokens: bool,
    pub cors_origin: Option<String>,
    pub smtp_host: String,
    pub smtp_email: Option<String>,
    pub smtp_password: Option<String>,
    pub admin_email: Option<String>,
}

#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError("DATABASE_URL is not set".into()))?;
        if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://") {
            return Err(ConfigError(
                "DATABASE_URL must start with postgres:// or postgresql://".into(),
            ));
        }

        let session_store = match env::var("SESSION_STORE").as_deref() {
            Ok("postgres") | Err(_) => SessionStoreKind::Postgres,
            Ok("memory") => SessionStoreKind::Memory,
            Ok(other) => {
                return Err(ConfigError(format!(
                    "SESSION_STORE must be 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        // 过期时间以小时为单位配置，如 "720h"
        let session_expiration = env::var("SESSION_EXPIRATION")
            .map(|v| v.trim_end_matches('h').parse::<u64>().unwrap_or(720))
            .unwrap_or(720);
        let reset_token_expiration = env::var("RESET_TOKEN_EXPIRATION")
            .map(|v| v.trim_end_matches('h').parse::<u64>().unwrap_or(1))
            .unwrap_or(1);

        Ok(Config {
            database_url,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "::".into()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            session_store,
            session_expiration_secs: session_expiration * 3600,
            reset_token_expiration_secs: reset_token_expiration * 3600,
            expose_reset_tokens: env::var("EXPOSE_RESET_TOKENS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into()),
            smtp_email: env::var("SMTP_EMAIL").ok().filter(|v| !v.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
        })
    }

    pub fn session_expiration(&self) -> Duration {
        Duration::from_secs(self.session_expiration_secs)
    }

    pub fn reset_token_expiration(&self) -> Duration {
        Duration::from_secs(self.reset_token_expiration_secs)
    }
}
