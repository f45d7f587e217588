use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crimetrack_backend::{
    AppState, app,
    config::{Config, SessionStoreKind},
    notify::Mailer,
    session::{MemorySessionStore, PgSessionStore, SessionStore},
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 会话清理周期
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置，配置不合法直接终止进程
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("FATAL: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'crimetrack_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // 选择会话存储
    let sessions = match config.session_store {
        SessionStoreKind::Postgres => {
            tracing::info!("using postgres-backed sessions");
            SessionStore::Postgres(PgSessionStore::new(pool.clone()))
        }
        SessionStoreKind::Memory => {
            tracing::warn!("using in-memory sessions; all sessions are lost on restart");
            SessionStore::Memory(MemorySessionStore::default())
        }
    };

    let mailer = Mailer::from_config(&config);

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        sessions,
        mailer,
    };

    // 定期清理过期会话
    let prune_store = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            match prune_store.purge_expired().await {
                Ok(0) => {}
                Ok(count) => tracing::info!("pruned {count} expired sessions"),
                Err(e) => tracing::error!("session prune failed: {e:?}"),
            }
        }
    });

    let app = app(state);

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service(),
    )
    .await
    .expect("Failed to start server");
}
