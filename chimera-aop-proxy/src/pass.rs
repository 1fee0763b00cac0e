//! 编译 pass
//!
//! 构建按顺序运行一组 [`CompilerPass`]：切点匹配、用户 pass、写入代理

use crate::compiler::BuildReport;
use crate::config::ProxyConfig;
use crate::definition::{Argument, DefinitionId, DefinitionRegistry, MethodCall};
use crate::error::{AopError, AopResult};
use crate::generator::{InterceptionGenerator, LOADER_SETTER};
use crate::matcher::AdviceMatcher;
use crate::metadata::ClassMetadataProvider;
use crate::naming;
use crate::pointcut::{PointcutMap, PointcutResolver};
use crate::promise::ProxyMatcher;
use chimera_aop::InterceptorIndex;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 切点标签上指定拦截器 ID 的属性名
pub const INTERCEPTOR_ATTRIBUTE: &str = "interceptor";

/// 构建上下文
///
/// 在所有 pass 之间共享
pub struct BuildContext<'a> {
    pub registry: &'a mut DefinitionRegistry,
    pub provider: &'a dyn ClassMetadataProvider,
    pub config: &'a ProxyConfig,
    pub matcher: ProxyMatcher,
    pub report: BuildReport,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        registry: &'a mut DefinitionRegistry,
        provider: &'a dyn ClassMetadataProvider,
        config: &'a ProxyConfig,
    ) -> Self {
        Self {
            registry,
            provider,
            config,
            matcher: ProxyMatcher::new(config.clone()),
            report: BuildReport::default(),
        }
    }

    /// 结束构建，收集资源列表
    pub fn into_report(self) -> BuildReport {
        let mut report = self.report;
        report.resources = self.registry.resources().map(|p| p.to_path_buf()).collect();
        report
    }
}

/// 编译 pass
pub trait CompilerPass {
    /// pass 名称（用于日志）
    fn name(&self) -> &str;

    /// 执行顺序，数值越小越先执行
    fn order(&self) -> i32 {
        0
    }

    fn process(&self, context: &mut BuildContext<'_>) -> AopResult<()>;
}

/// 定义被跳过的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    Synthetic,
    Factory,
    UnresolvableClass,
    NoClassMatch,
    FinalClass,
    NoMethodMatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::Synthetic => "synthetic service",
            SkipReason::Factory => "created by a factory",
            SkipReason::UnresolvableClass => "class cannot be resolved",
            SkipReason::NoClassMatch => "no pointcut matches the class",
            SkipReason::FinalClass => "class is final",
            SkipReason::NoMethodMatch => "no pointcut matches any method",
        };
        f.write_str(reason)
    }
}

enum PointcutSource {
    Explicit(PointcutMap),
    Tagged(Box<dyn PointcutResolver>),
}

/// 切点匹配 pass
///
/// 深度优先遍历所有服务定义（包括嵌套在构造参数、方法调用参数、属性、
/// 列表和映射中的内联定义），为匹配到通知的定义登记拦截生成器，
/// 最后把拦截器索引发布给加载器服务
pub struct PointcutMatchingPass {
    source: PointcutSource,
}

impl PointcutMatchingPass {
    /// 使用显式给定的切点
    pub fn new(pointcuts: PointcutMap) -> Self {
        Self {
            source: PointcutSource::Explicit(pointcuts),
        }
    }

    /// 通过标签发现切点服务，实例由 `resolver` 提供
    pub fn discover(resolver: impl PointcutResolver + 'static) -> Self {
        Self {
            source: PointcutSource::Tagged(Box::new(resolver)),
        }
    }

    fn pointcuts(&self, context: &mut BuildContext<'_>) -> AopResult<PointcutMap> {
        match &self.source {
            PointcutSource::Explicit(pointcuts) => Ok(pointcuts.clone()),
            PointcutSource::Tagged(resolver) => discover_pointcuts(context, resolver.as_ref()),
        }
    }

    fn visit(
        &self,
        context: &mut BuildContext<'_>,
        matcher: &AdviceMatcher<'_>,
        id: DefinitionId,
        visited: &mut HashSet<DefinitionId>,
        index: &mut InterceptorIndex,
    ) {
        if !visited.insert(id) {
            return;
        }

        match process_definition(context, matcher, id, index) {
            Ok(()) => context.report.proxied.push(id),
            Err(reason) => {
                tracing::trace!(
                    "Skipping definition {} ({}): {}",
                    id,
                    context.registry.definition(id).class(),
                    reason
                );
                context.report.skipped.push((id, reason));
            }
        }

        for nested in context.registry.definition(id).inline_definitions() {
            self.visit(context, matcher, nested, visited, index);
        }
    }
}

impl CompilerPass for PointcutMatchingPass {
    fn name(&self) -> &str {
        "PointcutMatchingPass"
    }

    fn order(&self) -> i32 {
        i32::MIN
    }

    fn process(&self, context: &mut BuildContext<'_>) -> AopResult<()> {
        let pointcuts = self.pointcuts(context)?;
        tracing::info!("Matching {} pointcut(s) against service definitions", pointcuts.len());

        let matcher = AdviceMatcher::new(&pointcuts);
        let mut index = InterceptorIndex::new();
        let mut visited = HashSet::new();

        let roots: Vec<DefinitionId> = context.registry.services().map(|(_, id)| id).collect();
        for root in roots {
            self.visit(context, &matcher, root, &mut visited, &mut index);
        }

        publish_index(context, &index);
        tracing::info!(
            "Pointcut matching finished: {} class(es) advised, {} definition(s) visited",
            index.len(),
            visited.len()
        );
        context.report.index = index;
        Ok(())
    }
}

fn process_definition(
    context: &mut BuildContext<'_>,
    matcher: &AdviceMatcher<'_>,
    id: DefinitionId,
    index: &mut InterceptorIndex,
) -> Result<(), SkipReason> {
    let definition = context.registry.definition(id);
    if definition.is_synthetic() {
        return Err(SkipReason::Synthetic);
    }
    if definition.factory().is_some() {
        return Err(SkipReason::Factory);
    }

    let user_class = naming::user_class(definition.class()).to_string();
    let class = context
        .provider
        .class(&user_class)
        .ok_or(SkipReason::UnresolvableClass)?;

    let outcome = matcher
        .match_class(&class, context.provider)
        .ok_or(SkipReason::NoClassMatch)?;

    for resource in &outcome.resources {
        context.registry.add_resource(resource.clone());
    }

    if class.is_final {
        return Err(SkipReason::FinalClass);
    }
    if !outcome.is_proxied() {
        return Err(SkipReason::NoMethodMatch);
    }

    tracing::debug!(
        "Definition {} ({}) advised on {} method(s)",
        id,
        user_class,
        outcome.advice.len()
    );
    index.insert(user_class, outcome.advice.clone());

    let loader = Argument::reference(context.config.loader_service.clone());
    context
        .matcher
        .get_enhanced(id)
        .add_generator(Arc::new(InterceptionGenerator::new(outcome.advice)))
        .add_method_call(MethodCall::new(LOADER_SETTER, vec![loader]));

    Ok(())
}

/// 通过标签发现切点
///
/// 标签缺少拦截器 ID 属性或切点服务无法解析时返回配置错误
fn discover_pointcuts(
    context: &mut BuildContext<'_>,
    resolver: &dyn PointcutResolver,
) -> AopResult<PointcutMap> {
    let tag = context.config.pointcut_tag.clone();
    let mut pointcuts = PointcutMap::new();
    let mut references = IndexMap::new();

    for (service_id, tags) in context.registry.find_tagged_service_ids(&tag) {
        let Some(interceptor) = tags.first().and_then(|t| t.attribute(INTERCEPTOR_ATTRIBUTE)) else {
            return Err(AopError::configuration(format!(
                "You need to set the \"{}\" attribute for the \"{}\" tag of service \"{}\"",
                INTERCEPTOR_ATTRIBUTE, tag, service_id
            )));
        };

        let pointcut = resolver.resolve(&service_id).ok_or_else(|| {
            AopError::configuration(format!("Pointcut service \"{}\" cannot be resolved", service_id))
        })?;

        tracing::debug!("  ├─ Pointcut '{}' for interceptor '{}'", service_id, interceptor);
        references.insert(interceptor.to_string(), Argument::reference(service_id.clone()));
        pointcuts.insert(interceptor.to_string(), pointcut);
    }

    let container = context.config.pointcut_container_service.clone();
    if let Some(container) = context.registry.get(&container) {
        context
            .registry
            .definition_mut(container)
            .add_argument(Argument::Map(references));
    }

    Ok(pointcuts)
}

/// 拦截器索引转换为定义参数
pub fn index_argument(index: &InterceptorIndex) -> Argument {
    Argument::Map(
        index
            .iter()
            .map(|(class, advice)| {
                let methods = advice
                    .iter()
                    .map(|(method, ids)| {
                        let ids = ids.iter().map(|id| Argument::value(id.clone())).collect();
                        (method.clone(), Argument::List(ids))
                    })
                    .collect();
                (class.clone(), Argument::Map(methods))
            })
            .collect(),
    )
}

fn publish_index(context: &mut BuildContext<'_>, index: &InterceptorIndex) {
    let service = context.config.loader_service.clone();
    match context.registry.get(&service) {
        Some(loader) => {
            context
                .registry
                .definition_mut(loader)
                .add_argument(index_argument(index));
            tracing::debug!("Published interceptor index to '{}'", service);
        }
        None => tracing::debug!("Loader service '{}' is not registered, index kept in report", service),
    }
}

/// 写入代理 pass
///
/// 必须在所有匹配 pass 之后运行
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteProxiesPass;

impl CompilerPass for WriteProxiesPass {
    fn name(&self) -> &str {
        "WriteProxiesPass"
    }

    fn order(&self) -> i32 {
        i32::MAX
    }

    fn process(&self, context: &mut BuildContext<'_>) -> AopResult<()> {
        let patches = context
            .matcher
            .write_proxy_files(context.registry, context.provider)?;
        context.report.patches.extend(patches);
        Ok(())
    }
}
