//! 代理构建配置
//!
//! 支持从 TOML 文件加载，并允许环境变量覆盖

use crate::error::{AopError, AopResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// 默认切点标签
pub const DEFAULT_POINTCUT_TAG: &str = "aop.pointcut";

/// 默认拦截器加载器服务 ID
pub const DEFAULT_LOADER_SERVICE: &str = "aop.interceptor_loader";

/// 默认切点容器服务 ID
pub const DEFAULT_POINTCUT_CONTAINER_SERVICE: &str = "aop.pointcut_container";

/// 默认运行时 crate 路径（生成代码引用）
pub const DEFAULT_RUNTIME_PATH: &str = "::chimera_aop";

/// 缓存目录环境变量
pub const CACHE_DIR_ENV: &str = "CHIMERA_AOP_CACHE_DIR";

/// 运行时路径环境变量
pub const RUNTIME_PATH_ENV: &str = "CHIMERA_AOP_RUNTIME_PATH";

/// 代理构建配置
///
/// TOML 示例：
///
/// ```toml
/// [aop]
/// cache_dir = "target/aop"
/// runtime_path = "::chimera_aop"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// 缓存目录，代理文件写入 `<cache_dir>/proxies`
    pub cache_dir: PathBuf,

    /// 生成代码中引用运行时 crate 的路径
    pub runtime_path: String,

    /// 生成代码的缩进
    pub indent: String,

    /// 切点服务的标签名
    pub pointcut_tag: String,

    /// 拦截器加载器服务 ID
    pub loader_service: String,

    /// 切点容器服务 ID
    pub pointcut_container_service: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("target/aop"),
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
            indent: "    ".to_string(),
            pointcut_tag: DEFAULT_POINTCUT_TAG.to_string(),
            loader_service: DEFAULT_LOADER_SERVICE.to_string(),
            pointcut_container_service: DEFAULT_POINTCUT_CONTAINER_SERVICE.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    aop: ProxyConfig,
}

impl ProxyConfig {
    /// 使用指定缓存目录创建配置
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// 从 TOML 字符串解析（读取 `[aop]` 表）
    pub fn from_toml_str(content: &str) -> AopResult<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| AopError::Config(format!("Failed to parse TOML: {}", e)))?;
        Ok(file.aop)
    }

    /// 从 TOML 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> AopResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AopError::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// 应用环境变量覆盖
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(cache_dir) = std::env::var(CACHE_DIR_ENV) {
            tracing::debug!("Config 'cache_dir' overridden by {}", CACHE_DIR_ENV);
            self.cache_dir = PathBuf::from(cache_dir);
        }
        if let Ok(runtime_path) = std::env::var(RUNTIME_PATH_ENV) {
            tracing::debug!("Config 'runtime_path' overridden by {}", RUNTIME_PATH_ENV);
            self.runtime_path = runtime_path;
        }
        self
    }

    /// 设置运行时路径
    pub fn runtime_path(mut self, runtime_path: impl Into<String>) -> Self {
        self.runtime_path = runtime_path.into();
        self
    }

    /// 代理文件目录
    pub fn proxies_dir(&self) -> PathBuf {
        self.cache_dir.join("proxies")
    }
}
