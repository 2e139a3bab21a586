//! 数据库连接启动入口
//!
//! 读取 `DB_SERVER_TYPE` / `DB_SERVER_ADDR`，建立连接并执行一次探活。
//! 启动失败时返回错误，由进程以非零状态退出。

use anyhow::Context;
use common::config::{load_dotenv, AppConfig};
use common::logging::{init_tracing, TracingSink};
use connection_factory::ConnectionFactory;
use tracing::info;

const SERVICE_NAME: &str = "connection-factory";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if present) before anything else; RUST_LOG may live there
    let dotenv = load_dotenv();

    // 初始化日志追踪（驱动日志经 TracingSink 转发）
    init_tracing(Some(TracingSink));
    dotenv.log();

    // 加载配置
    let config = AppConfig::load();

    // 建立连接
    let factory = ConnectionFactory::from_config(&config);
    let db = factory
        .create(&config)
        .await
        .with_context(|| format!("database startup failed (kind {:?})", config.server_type))?;

    let elapsed = db.ping().await.context("database ping failed")?;
    info!(
        service = SERVICE_NAME,
        backend = %db.backend(),
        elapsed = ?elapsed,
        "数据库连接就绪"
    );

    db.close().await;
    Ok(())
}
