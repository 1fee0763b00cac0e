//! 构建日志配置
//!
//! 代理构建通常运行在 build script 或独立的构建命令中，
//! 这里负责初始化 tracing 订阅者

use crate::error::{AopError, AopResult};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(level)
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 紧凑格式（默认）
    Compact,
    /// 完整格式
    Full,
    /// JSON 格式（适合 CI 收集）
    Json,
    /// 美化格式
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别（默认：Info）
    pub level: LogLevel,

    /// 日志格式（默认：Compact）
    pub format: LogFormat,

    /// 是否显示目标（模块路径）
    pub show_target: bool,

    /// 自定义过滤器，例如 "chimera_aop_proxy=debug"
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            show_target: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 从环境变量读取配置（RUST_LOG、LOG_LEVEL、LOG_FORMAT）
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            config.filter = Some(rust_log);
        }
        if let Some(level) = std::env::var("LOG_LEVEL").ok().and_then(|s| s.parse().ok()) {
            config.level = level;
        }
        if let Some(format) = std::env::var("LOG_FORMAT").ok().and_then(|s| s.parse().ok()) {
            config.format = format;
        }

        config
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string());
        match &self.filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| fallback()),
            None => fallback(),
        }
    }

    /// 初始化全局日志订阅者
    ///
    /// 已经存在全局订阅者时返回 [`AopError::LoggingInit`]
    pub fn init(self) -> AopResult<()> {
        let builder = subscriber_fmt()
            .with_env_filter(self.env_filter())
            .with_target(self.show_target);

        let result = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };

        result.map_err(|e| AopError::LoggingInit(e.to_string()))
    }
}
