use std::time::Duration;

use serde::{Deserialize, Serialize};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub report_interval_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            report_interval_ms: 1000,
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}，有效级别: {:?}",
                self.log_level,
                LOG_LEVELS
            ));
        }

        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志格式: {}，有效格式: {:?}",
                self.log_format,
                LOG_FORMATS
            ));
        }

        if self.report_interval_ms == 0 {
            return Err(anyhow::anyhow!("统计输出间隔必须大于0"));
        }

        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}
