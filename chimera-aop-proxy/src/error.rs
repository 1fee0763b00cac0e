use std::path::PathBuf;
use thiserror::Error;

/// 代理构建错误
///
/// 这些错误都会中止整个构建；单个定义被跳过不属于错误，见 [`crate::SkipReason`]
#[derive(Debug, Error)]
pub enum AopError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Class '{0}' cannot be resolved")]
    UnresolvableClass(String),

    #[error("Failed to write proxy file {path:?}: {source}")]
    ProxyIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Proxy generator failed for class '{class}': {source}")]
    Generator {
        class: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Conflicting proxies for class '{class}' would both be written to {path:?}")]
    ConflictingProxy { class: String, path: PathBuf },

    #[error("Failed to load config: {0}")]
    Config(String),

    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}

impl AopError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn generator(class: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Generator {
            class: class.into(),
            source: source.into(),
        }
    }

    pub fn proxy_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ProxyIo {
            path: path.into(),
            source,
        }
    }
}

/// 构建执行结果
pub type AopResult<T> = Result<T, AopError>;
