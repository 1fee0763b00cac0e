//! 切点（Pointcut）
//!
//! 切点是一种能力而不是表达式：回答“这个类是否匹配”和“这个方法是否匹配”

use crate::metadata::{ClassMetadata, MethodMetadata};
use indexmap::IndexMap;
use std::sync::Arc;

/// 切点 Trait
pub trait Pointcut: Send + Sync {
    /// 检查类是否匹配
    fn matches_class(&self, class: &ClassMetadata) -> bool;

    /// 检查方法是否匹配
    fn matches_method(&self, method: &MethodMetadata) -> bool;
}

/// 拦截器 ID -> 切点，迭代顺序即插入顺序
pub type PointcutMap = IndexMap<String, Arc<dyn Pointcut>>;

/// 由两个闭包组成的切点
pub struct FnPointcut<C, M> {
    class_matcher: C,
    method_matcher: M,
}

impl<C, M> FnPointcut<C, M>
where
    C: Fn(&ClassMetadata) -> bool + Send + Sync,
    M: Fn(&MethodMetadata) -> bool + Send + Sync,
{
    pub fn new(class_matcher: C, method_matcher: M) -> Self {
        Self {
            class_matcher,
            method_matcher,
        }
    }
}

impl<C, M> Pointcut for FnPointcut<C, M>
where
    C: Fn(&ClassMetadata) -> bool + Send + Sync,
    M: Fn(&MethodMetadata) -> bool + Send + Sync,
{
    fn matches_class(&self, class: &ClassMetadata) -> bool {
        (self.class_matcher)(class)
    }

    fn matches_method(&self, method: &MethodMetadata) -> bool {
        (self.method_matcher)(method)
    }
}

/// 提供切点服务实例
///
/// 标签发现只给出服务 ID，实例由宿主容器通过此 trait 提供
pub trait PointcutResolver {
    fn resolve(&self, service_id: &str) -> Option<Arc<dyn Pointcut>>;
}

impl<F> PointcutResolver for F
where
    F: Fn(&str) -> Option<Arc<dyn Pointcut>>,
{
    fn resolve(&self, service_id: &str) -> Option<Arc<dyn Pointcut>> {
        self(service_id)
    }
}
