//! 数据库连接工厂
//!
//! 根据环境配置选择数据库后端并建立连接，包括：
//! - 后端类型解析（sqlite / postgres / mysql / sqlserver / clickhouse）
//! - 驱动连接池创建
//! - 可选的遥测与驱动日志转发

pub mod factory;
pub mod pool_manager;
pub mod telemetry;

pub use factory::{ConnectionFactory, Database};
pub use pool_manager::{ClickHouseTarget, Connector, DatabasePool, DriverConnector};
pub use telemetry::Telemetry;
