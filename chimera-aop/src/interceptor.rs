//! 方法拦截器（MethodInterceptor）定义
//!
//! 拦截器是横切关注点的载体，由拦截器 ID 标识

use crate::MethodInvocation;
use std::sync::Arc;

/// 方法拦截器 Trait
///
/// 实现者在 `invoke` 中决定调用前后做什么，并通过
/// `invocation.proceed()` 把调用交给链上的下一个环节
pub trait MethodInterceptor: Send + Sync {
    /// 执行拦截逻辑
    fn invoke(&self, invocation: &mut MethodInvocation<'_>);
}

impl<F> MethodInterceptor for F
where
    F: Fn(&mut MethodInvocation<'_>) + Send + Sync,
{
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) {
        self(invocation)
    }
}

/// 拦截器注册器
///
/// 用于 inventory 自动收集和注册拦截器
pub struct InterceptorRegistration {
    /// 拦截器 ID（与切点注册时的 interceptor 属性一致）
    pub id: &'static str,

    /// 创建拦截器实例的函数
    pub creator: fn() -> Arc<dyn MethodInterceptor>,
}

impl InterceptorRegistration {
    /// 创建新的拦截器注册器
    pub const fn new(id: &'static str, creator: fn() -> Arc<dyn MethodInterceptor>) -> Self {
        Self { id, creator }
    }

    /// 创建拦截器实例
    pub fn create_instance(&self) -> Arc<dyn MethodInterceptor> {
        (self.creator)()
    }
}

inventory::collect!(InterceptorRegistration);

/// 获取所有注册的拦截器注册器
pub fn get_all_interceptor_registrations() -> impl Iterator<Item = &'static InterceptorRegistration> {
    inventory::iter::<InterceptorRegistration>()
}

// ============================================================================
// 预定义的常用拦截器
// ============================================================================

/// 日志拦截器 - 记录方法调用
#[derive(Debug, Default)]
pub struct LoggingInterceptor {
    log_args: bool,
}

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args(mut self) -> Self {
        self.log_args = true;
        self
    }
}

impl MethodInterceptor for LoggingInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) {
        if self.log_args {
            let args: Vec<String> = invocation.arguments().iter().map(ToString::to_string).collect();
            tracing::info!("→ Entering: {} ({})", invocation.signature(), args.join(", "));
        } else {
            tracing::info!("→ Entering: {}", invocation.signature());
        }

        invocation.proceed();

        let elapsed = invocation.timestamp().elapsed();
        tracing::info!("← Exiting: {} (took {:?})", invocation.signature(), elapsed);
    }
}

/// 性能监控拦截器
#[derive(Debug)]
pub struct PerformanceInterceptor {
    threshold_ms: u128,
}

impl PerformanceInterceptor {
    pub fn new(threshold_ms: u128) -> Self {
        Self { threshold_ms }
    }
}

impl MethodInterceptor for PerformanceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) {
        invocation.proceed();

        let elapsed = invocation.timestamp().elapsed().as_millis();
        if elapsed > self.threshold_ms {
            tracing::warn!(
                "⚠️ Slow method detected: {} took {}ms (threshold: {}ms)",
                invocation.signature(),
                elapsed,
                self.threshold_ms
            );
        }
    }
}
