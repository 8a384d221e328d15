use anyhow::{Context, Result};
use courier_core::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 命令行启动参数
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

/// 初始化日志系统
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 加载配置，命令行参数优先于配置文件和环境变量
pub fn load_config(startup_config: &StartupConfig) -> Result<AppConfig> {
    let mut config = AppConfig::load(startup_config.config_path.as_deref())
        .context("加载配置失败")?;

    if let Some(level) = &startup_config.log_level {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = &startup_config.log_format {
        config.observability.log_format = format.clone();
    }

    config.validate()?;
    Ok(config)
}
