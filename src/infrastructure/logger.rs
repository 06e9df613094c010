//! 日志基础设施

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::LoggingConfig;

pub struct Logger;

impl Logger {
    /// 初始化全局日志，RUST_LOG 存在时覆盖配置中的级别
    pub fn init(config: &LoggingConfig) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.level));

        // 重复初始化（例如测试中）时忽略错误
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(config.with_target).compact())
            .try_init();
    }
}
