//! Chimera AOP - 生成代理的运行时支持
//!
//! 构建期由 `chimera-aop-proxy` 生成代理源码，生成的代码依赖本 crate：
//! - 方法标识与调用上下文（[`MethodRef`]、[`MethodInvocation`]）
//! - 方法拦截器与拦截器链（[`MethodInterceptor`]、[`invoke`]）
//! - 拦截器加载器（[`InterceptorLoader`]、[`StaticInterceptorLoader`]）
//! - 通过 inventory 在编译时注册拦截器

pub mod advice;
pub mod interceptor;
pub mod joinpoint;
pub mod loader;

// 重新导出核心类型
pub use advice::{advice_for, ClassAdviceMap, InterceptorIndex};
pub use interceptor::{
    InterceptorRegistration, LoggingInterceptor, MethodInterceptor, PerformanceInterceptor,
};
pub use joinpoint::{invoke, Argument, MethodInvocation, MethodRef};
pub use loader::{
    get_global_interceptors, resolve_interceptors, InterceptorLoader, LoaderError, LoaderResult,
    StaticInterceptorLoader,
};

// 导出 inventory 供注册宏使用
pub use inventory;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::{ClassAdviceMap, InterceptorIndex};
    pub use crate::interceptor::{InterceptorRegistration, MethodInterceptor};
    pub use crate::joinpoint::{Argument, MethodInvocation, MethodRef};
    pub use crate::loader::{InterceptorLoader, StaticInterceptorLoader};
    pub use crate::register_interceptor;
}

/// 注册拦截器到全局拦截器表
///
/// 使用示例：
/// ```ignore
/// use chimera_aop::register_interceptor;
///
/// register_interceptor!("logging", || std::sync::Arc::new(LoggingInterceptor::new()));
/// ```
#[macro_export]
macro_rules! register_interceptor {
    ($id:expr, $creator:expr) => {
        $crate::inventory::submit! {
            $crate::InterceptorRegistration::new($id, $creator)
        }
    };
}

#[cfg(test)]
extern crate self as chimera_aop;

#[cfg(test)]
mod tests {
    //! 按代理生成器的渲染结果手写的代理，验证生成代码与运行时的契约。
    //! 目标类位于本测试模块内，因此目标路径是 `crate::tests::app::UserService`

    use super::*;
    use std::sync::{Arc, Mutex};

    pub mod app {
        use std::sync::{Arc, Mutex};

        #[derive(Debug, Default)]
        pub struct UserService {
            pub log: Arc<Mutex<Vec<String>>>,
        }

        impl UserService {
            pub fn find(&self, id: u64) -> Option<String> {
                self.log.lock().unwrap().push(format!("find:{}", id));
                (id == 1).then(|| "alice".to_string())
            }

            pub fn rename(&mut self, id: u64, name: &str) {
                self.log.lock().unwrap().push(format!("rename:{}:{}", id, name));
            }

            pub fn untouched(&self) -> &'static str {
                "original"
            }
        }
    }

    #[allow(non_snake_case, non_camel_case_types, dead_code, clippy::all)]
    pub mod AopProxy_0123456789abcdef_fedcba9876543210 {
        pub mod __AOP__ {
            pub mod app {
                pub struct UserService {
                    __aop_target: crate::tests::app::UserService,
                    __aop_loader: ::std::option::Option<::std::sync::Arc<dyn ::chimera_aop::InterceptorLoader>>,
                }

                impl UserService {
                    const __AOP_METHOD_0_FIND: ::chimera_aop::MethodRef = ::chimera_aop::MethodRef::new("app::UserService", "find", &["trace"]);
                    const __AOP_METHOD_1_RENAME: ::chimera_aop::MethodRef = ::chimera_aop::MethodRef::new("app::UserService", "rename", &["trace"]);

                    /// 包装原始实例
                    pub fn __aop_wrap(target: crate::tests::app::UserService) -> Self {
                        Self {
                            __aop_target: target,
                            __aop_loader: ::std::option::Option::None,
                        }
                    }

                    /// 取回原始实例
                    pub fn __aop_into_inner(self) -> crate::tests::app::UserService {
                        self.__aop_target
                    }

                    /// 注入拦截器加载器
                    pub fn set_interceptor_loader(&mut self, loader: ::std::sync::Arc<dyn ::chimera_aop::InterceptorLoader>) {
                        self.__aop_loader = ::std::option::Option::Some(loader);
                    }

                    pub fn find(&self, id: u64) -> Option<String> {
                        let __aop_interceptors = ::chimera_aop::resolve_interceptors(self.__aop_loader.as_deref(), &Self::__AOP_METHOD_0_FIND, &self.__aop_target);
                        let __aop_arguments = vec![::chimera_aop::Argument::new("id", &id)];
                        ::chimera_aop::invoke(
                            &Self::__AOP_METHOD_0_FIND,
                            ::std::option::Option::Some(&self.__aop_target as &(dyn ::std::any::Any + Send + Sync)),
                            __aop_arguments,
                            __aop_interceptors,
                            move || self.__aop_target.find(id),
                        )
                    }

                    pub fn rename(&mut self, id: u64, name: &str) {
                        let __aop_interceptors = ::chimera_aop::resolve_interceptors(self.__aop_loader.as_deref(), &Self::__AOP_METHOD_1_RENAME, &self.__aop_target);
                        let __aop_arguments = vec![::chimera_aop::Argument::new("id", &id), ::chimera_aop::Argument::new("name", &name)];
                        ::chimera_aop::invoke(
                            &Self::__AOP_METHOD_1_RENAME,
                            ::std::option::Option::None,
                            __aop_arguments,
                            __aop_interceptors,
                            move || self.__aop_target.rename(id, name),
                        )
                    }
                }

                impl ::std::convert::From<crate::tests::app::UserService> for UserService {
                    fn from(target: crate::tests::app::UserService) -> Self {
                        Self::__aop_wrap(target)
                    }
                }

                impl ::std::ops::Deref for UserService {
                    type Target = crate::tests::app::UserService;

                    fn deref(&self) -> &Self::Target {
                        &self.__aop_target
                    }
                }

                impl ::std::ops::DerefMut for UserService {
                    fn deref_mut(&mut self) -> &mut Self::Target {
                        &mut self.__aop_target
                    }
                }
            }
        }
    }

    use self::app::UserService;
    use self::AopProxy_0123456789abcdef_fedcba9876543210::__AOP__::app::UserService as UserServiceProxy;

    fn tracing_loader(log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn InterceptorLoader> {
        let log = Arc::clone(log);
        let trace = move |invocation: &mut MethodInvocation<'_>| {
            let args: Vec<String> = invocation.arguments().iter().map(|a| a.to_string()).collect();
            log.lock().unwrap().push(format!("before:{}({})", invocation.method().method, args.join(",")));
            invocation.proceed();
            log.lock().unwrap().push(format!("after:{}", invocation.method().method));
        };
        Arc::new(StaticInterceptorLoader::new(InterceptorIndex::new()).with_interceptor("trace", Arc::new(trace)))
    }

    #[test]
    fn test_proxy_round_trip_records_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut proxy = UserServiceProxy::__aop_wrap(UserService { log: Arc::clone(&log) });
        proxy.set_interceptor_loader(tracing_loader(&log));

        assert_eq!(proxy.find(1), Some("alice".to_string()));
        proxy.rename(2, "bob");
        assert_eq!(proxy.untouched(), "original");

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "before:find(id=1)",
                "find:1",
                "after:find",
                "before:rename(id=2,name=\"bob\")",
                "rename:2:bob",
                "after:rename",
            ]
        );
    }

    #[test]
    fn test_proxy_without_loader_calls_target() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = UserServiceProxy::__aop_wrap(UserService { log: Arc::clone(&log) });

        assert_eq!(proxy.find(7), None);
        assert_eq!(*log.lock().unwrap(), vec!["find:7"]);
    }

    #[test]
    fn test_proxy_converts_and_unwraps() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut proxy = UserServiceProxy::from(UserService { log: Arc::clone(&log) });

        proxy.log.lock().unwrap().push("via-deref".to_string());
        proxy.rename(3, "carol");

        let inner = proxy.__aop_into_inner();
        assert_eq!(inner.untouched(), "original");
        assert_eq!(*log.lock().unwrap(), vec!["via-deref", "rename:3:carol"]);
    }
}
