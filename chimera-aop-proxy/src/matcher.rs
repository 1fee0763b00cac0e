//! 通知匹配
//!
//! 针对一个类计算每个可拦截方法的拦截器 ID 列表。计算是纯函数：
//! 同样的类和切点集合总是得到相同的结果和顺序

use crate::metadata::{ClassMetadata, ClassMetadataProvider};
use crate::pointcut::{Pointcut, PointcutMap};
use crate::resolver::eligible_methods;
use chimera_aop::ClassAdviceMap;
use std::path::PathBuf;
use std::sync::Arc;

/// 单个类的匹配结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    /// 类及其祖先的源文件（构建依赖）
    pub resources: Vec<PathBuf>,

    /// 方法 -> 拦截器 ID；为空表示不需要代理
    pub advice: ClassAdviceMap,
}

impl MatchOutcome {
    pub fn is_proxied(&self) -> bool {
        !self.advice.is_empty()
    }
}

/// 通知匹配器
pub struct AdviceMatcher<'a> {
    pointcuts: &'a PointcutMap,
}

impl<'a> AdviceMatcher<'a> {
    pub fn new(pointcuts: &'a PointcutMap) -> Self {
        Self { pointcuts }
    }

    /// 匹配一个类
    ///
    /// 没有任何切点匹配该类时返回 `None`（不登记资源）。
    /// final 类仍然登记资源，但通知为空
    pub fn match_class(
        &self,
        class: &ClassMetadata,
        provider: &dyn ClassMetadataProvider,
    ) -> Option<MatchOutcome> {
        let matching: Vec<(&String, &Arc<dyn Pointcut>)> = self
            .pointcuts
            .iter()
            .filter(|(_, pointcut)| pointcut.matches_class(class))
            .collect();

        if matching.is_empty() {
            return None;
        }

        let resources = collect_resources(class, provider);

        if class.is_final {
            tracing::trace!("Class '{}' is final, recording resources only", class.name);
            return Some(MatchOutcome {
                resources,
                advice: ClassAdviceMap::new(),
            });
        }

        let mut advice = ClassAdviceMap::new();
        for method in eligible_methods(class) {
            let ids: Vec<String> = matching
                .iter()
                .filter(|(_, pointcut)| pointcut.matches_method(method))
                .map(|(id, _)| (*id).clone())
                .collect();

            if !ids.is_empty() {
                advice.insert(method.name.clone(), ids);
            }
        }

        Some(MatchOutcome { resources, advice })
    }
}

/// 类文件和沿继承链可定位的祖先文件
///
/// 遇到没有文件或提供者不认识的祖先时停止
fn collect_resources(class: &ClassMetadata, provider: &dyn ClassMetadataProvider) -> Vec<PathBuf> {
    let mut resources = Vec::new();
    let Some(file) = class.file() else {
        return resources;
    };
    resources.push(file.to_path_buf());

    let mut parent = class.parent.clone();
    while let Some(name) = parent {
        let Some(ancestor) = provider.class(&name) else {
            break;
        };
        let Some(file) = ancestor.file() else {
            break;
        };
        if resources.iter().any(|existing| existing == file) {
            break;
        }
        resources.push(file.to_path_buf());
        parent = ancestor.parent.clone();
    }

    resources
}
