use anyhow::{Context, Result};
use clap::{Arg, Command};
use courier::{init_logging, load_config, wait_for_shutdown_signal, Application, StartupConfig};
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let matches = Command::new("courier")
        .version("1.0.0")
        .about("包裹装箱投递流水线")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let startup = StartupConfig {
        config_path: matches.get_one::<String>("config").cloned(),
        log_level: matches.get_one::<String>("log-level").cloned(),
        log_format: matches.get_one::<String>("log-format").cloned(),
    };

    let config = load_config(&startup)?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;

    info!("启动包裹投递流水线");
    if let Some(path) = &startup.config_path {
        info!("配置文件: {path}");
    }

    let report_interval = config.observability.report_interval();
    let mut app = Application::new(config)?;
    app.start()?;

    let monitor = app.monitor();
    let reporter = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(report_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match serde_json::to_string(&monitor.snapshot()) {
                Ok(snapshot) => info!(%snapshot, "流水线状态"),
                Err(e) => warn!("序列化流水线状态失败: {e}"),
            }
        }
    });

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    reporter.abort();

    let report = tokio::task::spawn_blocking(move || app.stop())
        .await
        .context("等待流水线关闭失败")?;

    if report.is_clean() {
        info!("流水线已退出, 回收 {} 个线程", report.joined);
    } else {
        for failure in &report.failures {
            error!("组件异常: {failure}");
        }
        return Err(anyhow::anyhow!(
            "{} 个组件异常退出",
            report.failures.len()
        ));
    }

    Ok(())
}
