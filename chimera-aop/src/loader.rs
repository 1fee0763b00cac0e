//! 拦截器加载器
//!
//! 生成的代理在调用时通过加载器解析当前方法的拦截器列表

use crate::{advice_for, InterceptorIndex, MethodInterceptor, MethodRef};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::Arc;

/// 加载器错误
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("Interceptor '{id}' advised on {class}::{method} is not registered")]
    UnknownInterceptor {
        class: String,
        method: String,
        id: String,
    },
}

/// 加载器执行结果
pub type LoaderResult<T> = Result<T, LoaderError>;

/// 拦截器加载器 Trait
///
/// 给定方法标识和目标实例，返回按顺序执行的拦截器
pub trait InterceptorLoader: Send + Sync {
    fn load_interceptors(
        &self,
        method: &MethodRef,
        target: &(dyn Any + Send + Sync),
    ) -> Vec<Arc<dyn MethodInterceptor>>;
}

/// 解析拦截器列表
///
/// 生成的代理方法调用此函数；尚未注入加载器的代理不执行任何拦截器
pub fn resolve_interceptors(
    loader: Option<&dyn InterceptorLoader>,
    method: &MethodRef,
    target: &(dyn Any + Send + Sync),
) -> Vec<Arc<dyn MethodInterceptor>> {
    match loader {
        Some(loader) => loader.load_interceptors(method, target),
        None => {
            tracing::trace!("No interceptor loader injected for {}, calling target directly", method);
            Vec::new()
        }
    }
}

/// 全局拦截器表
///
/// 首次访问时加载所有通过 inventory 注册的拦截器
static GLOBAL_INTERCEPTORS: Lazy<IndexMap<String, Arc<dyn MethodInterceptor>>> = Lazy::new(|| {
    let mut interceptors = IndexMap::new();
    for registration in crate::interceptor::get_all_interceptor_registrations() {
        tracing::debug!("  ├─ Loading interceptor: {}", registration.id);
        interceptors.insert(registration.id.to_string(), registration.create_instance());
    }
    tracing::info!("Auto-loaded {} interceptor(s)", interceptors.len());
    interceptors
});

/// 获取全局拦截器表
pub fn get_global_interceptors() -> &'static IndexMap<String, Arc<dyn MethodInterceptor>> {
    &GLOBAL_INTERCEPTORS
}

/// 基于拦截器索引的加载器
///
/// 构建期发布的 [`InterceptorIndex`] 优先；索引中没有的类回退到
/// 生成代码里的常量通知表（[`MethodRef::advice`]）
pub struct StaticInterceptorLoader {
    index: InterceptorIndex,
    interceptors: IndexMap<String, Arc<dyn MethodInterceptor>>,
}

impl StaticInterceptorLoader {
    /// 创建新的加载器
    pub fn new(index: InterceptorIndex) -> Self {
        Self {
            index,
            interceptors: IndexMap::new(),
        }
    }

    /// 使用全局注册的拦截器创建加载器
    pub fn auto_load(index: InterceptorIndex) -> Self {
        let mut loader = Self::new(index);
        for (id, interceptor) in get_global_interceptors() {
            loader.register(id.clone(), Arc::clone(interceptor));
        }
        loader
    }

    /// 注册拦截器
    pub fn register(&mut self, id: impl Into<String>, interceptor: Arc<dyn MethodInterceptor>) {
        let id = id.into();
        tracing::debug!("Registering interceptor: {}", id);
        self.interceptors.insert(id, interceptor);
    }

    /// 链式注册拦截器
    pub fn with_interceptor(
        mut self,
        id: impl Into<String>,
        interceptor: Arc<dyn MethodInterceptor>,
    ) -> Self {
        self.register(id, interceptor);
        self
    }

    /// 获取拦截器索引
    pub fn index(&self) -> &InterceptorIndex {
        &self.index
    }

    /// 检查索引中引用的所有拦截器都已注册
    pub fn validate(&self) -> LoaderResult<()> {
        for (class, advice) in &self.index {
            for (method, ids) in advice {
                if let Some(id) = ids.iter().find(|id| !self.interceptors.contains_key(id.as_str())) {
                    return Err(LoaderError::UnknownInterceptor {
                        class: class.clone(),
                        method: method.clone(),
                        id: id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, method: &MethodRef, id: &str) -> Option<Arc<dyn MethodInterceptor>> {
        let interceptor = self.interceptors.get(id).cloned();
        if interceptor.is_none() {
            tracing::warn!("Interceptor '{}' for {} is not registered, skipping", id, method);
        }
        interceptor
    }
}

impl InterceptorLoader for StaticInterceptorLoader {
    fn load_interceptors(
        &self,
        method: &MethodRef,
        _target: &(dyn Any + Send + Sync),
    ) -> Vec<Arc<dyn MethodInterceptor>> {
        match advice_for(&self.index, method.class, method.method) {
            Some(ids) => ids.iter().filter_map(|id| self.lookup(method, id)).collect(),
            None => method
                .advice
                .iter()
                .filter_map(|id| self.lookup(method, id))
                .collect(),
        }
    }
}

impl std::fmt::Debug for StaticInterceptorLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticInterceptorLoader")
            .field("index", &self.index)
            .field("interceptors", &self.interceptors.keys().collect::<Vec<_>>())
            .finish()
    }
}
