//! Chimera AOP Proxy - 构建期切点匹配与代理生成
//!
//! 在构建阶段把切点与服务定义的类元数据进行匹配，为需要拦截的服务生成
//! Rust 代理源码，并改写服务定义指向生成的代理：
//!
//! - [`PointcutMatchingPass`]：遍历全部服务定义（含内联定义），计算拦截器索引
//! - [`ProxyMatcher`] / [`ProxyPromise`]：多个 pass 共同为同一服务贡献生成器，最后统一写入一次
//! - [`WriteProxiesPass`]：写入代理文件，并把修改应用到定义注册表
//! - [`ProxyCompiler`]：按顺序驱动以上各个 pass
//!
//! 生成的代码依赖运行时 crate `chimera-aop`

pub mod compiler;
pub mod config;
pub mod definition;
pub mod error;
pub mod generator;
pub mod logging;
pub mod matcher;
pub mod metadata;
pub mod naming;
pub mod pass;
pub mod pointcut;
pub mod promise;
pub mod resolver;

// 重新导出核心类型
pub use compiler::{BuildReport, ProxyCompiler};
pub use config::ProxyConfig;
pub use definition::{
    Argument, DefinitionId, DefinitionRegistry, Factory, MethodCall, ServiceDefinition, Tag,
};
pub use error::{AopError, AopResult};
pub use generator::{
    Enhancer, InterceptionGenerator, ProxyClass, ProxyConstant, ProxyField, ProxyGenerator,
    ProxyMethod,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use matcher::{AdviceMatcher, MatchOutcome};
pub use metadata::{
    ClassMetadata, ClassMetadataProvider, InMemoryClassMetadataProvider, MethodMetadata,
    Parameter, Receiver, Visibility,
};
pub use pass::{BuildContext, CompilerPass, PointcutMatchingPass, SkipReason, WriteProxiesPass};
pub use pointcut::{FnPointcut, Pointcut, PointcutMap, PointcutResolver};
pub use promise::{ProxyMatcher, ProxyPatch, ProxyPromise};
pub use resolver::eligible_methods;

pub use chimera_aop::{ClassAdviceMap, InterceptorIndex};

/// 预导入模块
pub mod prelude {
    pub use crate::compiler::{BuildReport, ProxyCompiler};
    pub use crate::config::ProxyConfig;
    pub use crate::definition::{Argument, DefinitionRegistry, MethodCall, ServiceDefinition, Tag};
    pub use crate::error::{AopError, AopResult};
    pub use crate::generator::{ProxyClass, ProxyGenerator, ProxyMethod};
    pub use crate::metadata::{ClassMetadata, ClassMetadataProvider, InMemoryClassMetadataProvider, MethodMetadata};
    pub use crate::pass::{BuildContext, CompilerPass};
    pub use crate::pointcut::{FnPointcut, Pointcut, PointcutMap};
}
