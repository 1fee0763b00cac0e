//! 代理编译器
//!
//! 驱动整个构建：切点匹配 → 用户 pass（按 order 排序）→ 写入代理文件

use crate::config::ProxyConfig;
use crate::definition::{DefinitionId, DefinitionRegistry};
use crate::error::{AopError, AopResult};
use crate::metadata::ClassMetadataProvider;
use crate::pass::{BuildContext, CompilerPass, PointcutMatchingPass, SkipReason, WriteProxiesPass};
use crate::pointcut::{PointcutMap, PointcutResolver};
use crate::promise::ProxyPatch;
use chimera_aop::InterceptorIndex;
use std::path::PathBuf;

/// 构建结果
#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    /// 用户类 -> 方法 -> 拦截器 ID
    pub index: InterceptorIndex,

    /// 构建依赖的源文件
    pub resources: Vec<PathBuf>,

    /// 匹配到通知的定义（遍历顺序）
    pub proxied: Vec<DefinitionId>,

    /// 被跳过的定义及原因
    pub skipped: Vec<(DefinitionId, SkipReason)>,

    /// 已应用到注册表的修改
    pub patches: Vec<ProxyPatch>,
}

impl BuildReport {
    pub fn is_proxied(&self, definition: DefinitionId) -> bool {
        self.patches.iter().any(|patch| patch.definition == definition)
    }

    pub fn skip_reason(&self, definition: DefinitionId) -> Option<SkipReason> {
        self.skipped
            .iter()
            .find(|(id, _)| *id == definition)
            .map(|(_, reason)| *reason)
    }

    /// 写入的代理文件数（共享同一代理的定义只计一次）
    pub fn proxy_file_count(&self) -> usize {
        let mut files: Vec<&PathBuf> = self.patches.iter().map(|patch| &patch.file).collect();
        files.sort();
        files.dedup();
        files.len()
    }

    /// 以 TOML 输出拦截器索引
    pub fn index_toml(&self) -> AopResult<String> {
        toml::to_string(&self.index)
            .map_err(|e| AopError::Config(format!("Failed to serialize interceptor index: {}", e)))
    }
}

/// 代理编译器
///
/// # 示例
///
/// ```ignore
/// let compiler = ProxyCompiler::new(ProxyConfig::new("target/aop"), pointcuts)
///     .with_pass(MyPass);
/// let report = compiler.compile(&mut registry, &provider)?;
/// ```
pub struct ProxyCompiler {
    config: ProxyConfig,
    matching: PointcutMatchingPass,
    passes: Vec<Box<dyn CompilerPass>>,
}

impl ProxyCompiler {
    /// 使用显式切点
    pub fn new(config: ProxyConfig, pointcuts: PointcutMap) -> Self {
        Self::with_matching_pass(config, PointcutMatchingPass::new(pointcuts))
    }

    /// 通过标签发现切点
    pub fn discover(config: ProxyConfig, resolver: impl PointcutResolver + 'static) -> Self {
        Self::with_matching_pass(config, PointcutMatchingPass::discover(resolver))
    }

    pub fn with_matching_pass(config: ProxyConfig, matching: PointcutMatchingPass) -> Self {
        Self {
            config,
            matching,
            passes: Vec::new(),
        }
    }

    /// 添加在匹配之后、写入之前运行的 pass
    pub fn with_pass(mut self, pass: impl CompilerPass + 'static) -> Self {
        self.add_pass(pass);
        self
    }

    pub fn add_pass(&mut self, pass: impl CompilerPass + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// 执行构建
    ///
    /// 配置错误在遍历开始前返回，不会写入任何文件
    pub fn compile(
        &self,
        registry: &mut DefinitionRegistry,
        provider: &dyn ClassMetadataProvider,
    ) -> AopResult<BuildReport> {
        tracing::info!("Building AOP proxies into {:?}", self.config.proxies_dir());
        let mut context = BuildContext::new(registry, provider, &self.config);

        self.matching.process(&mut context)?;

        // 稳定排序：相同 order 保持添加顺序
        let mut passes: Vec<&Box<dyn CompilerPass>> = self.passes.iter().collect();
        passes.sort_by_key(|pass| pass.order());
        for pass in passes {
            tracing::debug!("Running compiler pass '{}'", pass.name());
            pass.process(&mut context)?;
        }

        WriteProxiesPass.process(&mut context)?;

        let report = context.into_report();
        tracing::info!(
            "AOP build finished: {} proxied definition(s), {} proxy file(s), {} skipped",
            report.patches.len(),
            report.proxy_file_count(),
            report.skipped.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Argument, MethodCall, ServiceDefinition, Tag};
    use crate::generator::{ProxyClass, ProxyGenerator, ProxyMethod, LOADER_SETTER};
    use crate::metadata::{ClassMetadata, InMemoryClassMetadataProvider, MethodMetadata, Receiver, Visibility};
    use crate::naming;
    use crate::pointcut::{FnPointcut, Pointcut};
    use indexmap::IndexMap;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    fn service_pointcut(method_prefix: &'static str) -> Arc<dyn Pointcut> {
        Arc::new(FnPointcut::new(
            |class: &ClassMetadata| class.name.ends_with("Service"),
            move |method: &MethodMetadata| method.name.starts_with(method_prefix),
        ))
    }

    fn pointcuts() -> PointcutMap {
        let mut map: PointcutMap = IndexMap::new();
        map.insert("logging".to_string(), service_pointcut(""));
        map.insert("transaction".to_string(), service_pointcut("save"));
        map
    }

    fn provider() -> InMemoryClassMetadataProvider {
        InMemoryClassMetadataProvider::new()
            .with_class(
                ClassMetadata::new("app::UserService")
                    .with_file("/project/src/user_service.rs")
                    .with_method(MethodMetadata::constructor("new"))
                    .with_method(MethodMetadata::new("save_user").with_param("name", "String").returning("u64"))
                    .with_method(MethodMetadata::new("find_user").with_param("id", "u64"))
                    .with_method(MethodMetadata::new("helper").with_visibility(Visibility::Private))
                    .with_method(MethodMetadata::new("create").with_receiver(Receiver::Static))
                    .with_method(MethodMetadata::new("locked").final_method()),
            )
            .with_class(
                ClassMetadata::new("app::LockedService")
                    .with_file("/project/src/locked.rs")
                    .with_method(MethodMetadata::new("save"))
                    .final_class(),
            )
            .with_class(ClassMetadata::new("app::Repository").with_method(MethodMetadata::new("save")))
            .with_class(ClassMetadata::new("app::QuietService").with_method(MethodMetadata::new("ping").final_method()))
            .with_class(ClassMetadata::new("app::Holder"))
            .with_class(ClassMetadata::new("app::TestService").with_method(MethodMetadata::new("things")))
    }

    fn compiler(cache_dir: &Path) -> ProxyCompiler {
        ProxyCompiler::new(ProxyConfig::new(cache_dir), pointcuts())
    }

    fn proxy_source(registry: &DefinitionRegistry, id: DefinitionId) -> String {
        fs::read_to_string(registry.definition(id).file().unwrap()).unwrap()
    }

    struct SomeGenerator(&'static str);

    impl ProxyGenerator for SomeGenerator {
        fn generate(&self, _original: &ClassMetadata, proxy: &mut ProxyClass) -> anyhow::Result<()> {
            proxy.set_method(
                ProxyMethod::new(self.0)
                    .with_receiver(Receiver::RefMut)
                    .with_body_line(format!("self.things.push({:?}.to_string());", self.0)),
            );
            Ok(())
        }
    }

    /// 向 `test` 服务的代理追加一个方法，并在定义上登记对它的调用
    struct AppendingPass {
        name: &'static str,
        method: &'static str,
        order: i32,
    }

    impl CompilerPass for AppendingPass {
        fn name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn process(&self, context: &mut BuildContext<'_>) -> AopResult<()> {
            let id = context
                .registry
                .get("test")
                .ok_or_else(|| AopError::configuration("service 'test' is not registered"))?;
            context
                .matcher
                .get_enhanced(id)
                .add_generator(Arc::new(SomeGenerator(self.method)));
            context
                .registry
                .definition_mut(id)
                .add_method_call(MethodCall::new(self.method, vec![]));
            Ok(())
        }
    }

    #[test]
    fn test_proxies_matched_service() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let id = registry.register(
            "user_service",
            ServiceDefinition::new("app::UserService").with_file("/project/src/user_service.rs"),
        );
        let loader = registry.register(
            "aop.interceptor_loader",
            ServiceDefinition::new("chimera_aop::StaticInterceptorLoader").synthetic(),
        );

        let report = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();

        assert!(report.is_proxied(id));
        assert_eq!(report.index["app::UserService"]["save_user"], vec!["logging", "transaction"]);
        assert_eq!(report.index["app::UserService"]["find_user"], vec!["logging"]);
        assert_eq!(report.resources, vec![Path::new("/project/src/user_service.rs").to_path_buf()]);
        assert_eq!(report.skip_reason(loader), Some(SkipReason::Synthetic));

        let definition = registry.definition(id);
        assert_eq!(naming::user_class(definition.class()), "app::UserService");
        assert_eq!(
            definition.file(),
            Some(dir.path().join("proxies").join("app-UserService.rs").as_path())
        );
        assert_eq!(
            definition.method_calls(),
            &[MethodCall::new(LOADER_SETTER, vec![Argument::reference("aop.interceptor_loader")])]
        );
        assert_eq!(registry.definition(loader).arguments().len(), 1);

        let source = proxy_source(&registry, id);
        assert!(source.contains("pub fn save_user(&self, name: String) -> u64 {"));
        assert!(source.contains("pub fn find_user(&self, id: u64) {"));
        assert!(source.contains(r#"MethodRef::new("app::UserService", "save_user", &["logging", "transaction"])"#));
        assert!(source.contains("mod __aop_required;"));
        for excluded in ["fn new(", "fn helper(", "fn create(", "fn locked("] {
            assert!(!source.contains(excluded), "{} must not be overridden", excluded);
        }
    }

    #[test]
    fn test_final_class_never_proxied() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let id = registry.register(
            "locked",
            ServiceDefinition::new("app::LockedService").with_file("/project/src/locked.rs"),
        );

        let report = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();

        assert_eq!(report.skip_reason(id), Some(SkipReason::FinalClass));
        assert!(!report.index.contains_key("app::LockedService"));
        assert_eq!(report.resources, vec![Path::new("/project/src/locked.rs").to_path_buf()]);
        assert_eq!(registry.definition(id).class(), "app::LockedService");
        assert!(!dir.path().join("proxies").exists());
    }

    #[test]
    fn test_unmatched_class_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let id = registry.register("repo", ServiceDefinition::new("app::Repository").with_file("/project/src/repo.rs"));

        let report = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();

        assert_eq!(report.skip_reason(id), Some(SkipReason::NoClassMatch));
        assert!(report.index.is_empty());
        assert!(report.resources.is_empty());
        let definition = registry.definition(id);
        assert_eq!(definition.class(), "app::Repository");
        assert_eq!(definition.file(), Some(Path::new("/project/src/repo.rs")));
    }

    #[test]
    fn test_class_match_without_method_match_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let id = registry.register("quiet", ServiceDefinition::new("app::QuietService"));

        let report = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();

        assert_eq!(report.skip_reason(id), Some(SkipReason::NoMethodMatch));
        assert!(report.index.is_empty());
        assert_eq!(report.proxy_file_count(), 0);
        assert!(!dir.path().join("proxies").exists());
    }

    #[test]
    fn test_passes_merge_into_one_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let id = registry.register("test", ServiceDefinition::new("app::TestService"));

        // 添加顺序与执行顺序相反，由 order 决定
        let compiler = ProxyCompiler::new(ProxyConfig::new(dir.path()), PointcutMap::new())
            .with_pass(AppendingPass {
                name: "AnotherPass",
                method: "__ultimately_another_method",
                order: 10,
            })
            .with_pass(AppendingPass {
                name: "FirstPass",
                method: "__first_pass_method",
                order: 0,
            });

        let report = compiler.compile(&mut registry, &provider()).unwrap();
        assert_eq!(report.proxy_file_count(), 1);

        let definition = registry.definition(id);
        assert!(naming::is_proxy_class(definition.class()));
        let calls: Vec<&str> = definition.method_calls().iter().map(|c| c.method.as_str()).collect();
        assert_eq!(calls, vec!["__first_pass_method", "__ultimately_another_method"]);

        let source = proxy_source(&registry, id);
        let first = source.find("fn __first_pass_method(&mut self)").unwrap();
        let another = source.find("fn __ultimately_another_method(&mut self)").unwrap();
        assert!(first < another);
    }

    #[test]
    fn test_pointcut_and_custom_pass_share_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let id = registry.register("test", ServiceDefinition::new("app::UserService"));

        let compiler = compiler(dir.path()).with_pass(AppendingPass {
            name: "FirstPass",
            method: "__first_pass_method",
            order: 0,
        });
        let report = compiler.compile(&mut registry, &provider()).unwrap();

        assert_eq!(report.patches.len(), 1);
        let source = proxy_source(&registry, id);
        assert!(source.contains("pub fn save_user("));
        assert!(source.contains("fn __first_pass_method("));
        assert_eq!(source.matches("pub mod AopProxy_").count(), 1);
    }

    #[test]
    fn test_missing_interceptor_attribute_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let mut registry = DefinitionRegistry::new();
        registry.register("user_service", ServiceDefinition::new("app::UserService"));
        registry.register(
            "unnamed_pointcut",
            ServiceDefinition::new("app::SomePointcut").with_tag(Tag::new("aop.pointcut")),
        );

        let resolver = |_: &str| -> Option<Arc<dyn Pointcut>> { Some(service_pointcut("")) };
        let err = ProxyCompiler::discover(ProxyConfig::new(&cache_dir), resolver)
            .compile(&mut registry, &provider())
            .unwrap_err();

        assert!(matches!(err, AopError::Configuration(_)));
        assert!(!cache_dir.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(
            registry.definition(registry.get("user_service").unwrap()).class(),
            "app::UserService"
        );
    }

    #[test]
    fn test_deeply_nested_definition_is_matched() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let inner = registry.inline(ServiceDefinition::new("app::UserService"));
        let holder = registry.inline(
            ServiceDefinition::new("app::Holder").with_property("service", Argument::Definition(inner)),
        );
        let mut map = IndexMap::new();
        map.insert("holder".to_string(), Argument::Definition(holder));
        registry.register(
            "root",
            ServiceDefinition::new("app::Holder")
                .with_method_call(MethodCall::new("configure", vec![Argument::List(vec![Argument::Map(map)])])),
        );

        let report = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();

        assert!(report.is_proxied(inner));
        assert!(report.index.contains_key("app::UserService"));
        assert!(naming::is_proxy_class(registry.definition(inner).class()));
    }

    #[test]
    fn test_shared_class_keeps_user_class_in_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let a = registry.register("a", ServiceDefinition::new("app::UserService"));
        let b = registry.register("b", ServiceDefinition::new("app::UserService"));

        let report = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();

        assert_eq!(report.index.keys().collect::<Vec<_>>(), vec!["app::UserService"]);
        assert_eq!(report.proxy_file_count(), 1);
        assert_eq!(registry.definition(a).class(), registry.definition(b).class());
    }

    #[test]
    fn test_custom_pass_cannot_proxy_final_class() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let id = registry.register(
            "test",
            ServiceDefinition::new("app::LockedService").with_file("/project/src/locked.rs"),
        );

        let compiler = compiler(dir.path()).with_pass(AppendingPass {
            name: "FirstPass",
            method: "__first_pass_method",
            order: 0,
        });
        let report = compiler.compile(&mut registry, &provider()).unwrap();

        assert_eq!(registry.definition(id).class(), "app::LockedService");
        assert!(report.patches.is_empty());
        assert!(!report.is_proxied(id));
        assert!(!naming::proxy_file_path(&dir.path().join("proxies"), "app::LockedService").exists());
    }

    #[test]
    fn test_custom_pass_cannot_proxy_synthetic_definition() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let id = registry.register("test", ServiceDefinition::new("app::TestService").synthetic());

        let compiler = ProxyCompiler::new(ProxyConfig::new(dir.path()), PointcutMap::new()).with_pass(AppendingPass {
            name: "FirstPass",
            method: "__first_pass_method",
            order: 0,
        });
        let report = compiler.compile(&mut registry, &provider()).unwrap();

        assert_eq!(registry.definition(id).class(), "app::TestService");
        assert!(report.patches.is_empty());
    }

    #[test]
    fn test_rebuild_does_not_nest_proxy_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        let id = registry.register(
            "user_service",
            ServiceDefinition::new("app::UserService").with_file("/project/src/user_service.rs"),
        );

        let first = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();
        let class = registry.definition(id).class().to_string();
        let source = proxy_source(&registry, id);

        let second = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();

        assert_eq!(first.index, second.index);
        assert!(second.index.keys().all(|key| !naming::is_proxy_class(key)));
        assert_eq!(registry.definition(id).class(), class);
        assert!(source.contains("mod __aop_required;"));
        assert_eq!(proxy_source(&registry, id), source);
    }

    #[test]
    fn test_builds_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let build = || {
            let mut registry = DefinitionRegistry::new();
            let id = registry.register("user_service", ServiceDefinition::new("app::UserService"));
            let report = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();
            (report.index, proxy_source(&registry, id))
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn test_index_toml() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        registry.register("user_service", ServiceDefinition::new("app::UserService"));

        let report = compiler(dir.path()).compile(&mut registry, &provider()).unwrap();
        let toml = report.index_toml().unwrap();

        assert!(toml.contains("[\"app::UserService\"]"));
        assert!(toml.contains("save_user = [\"logging\", \"transaction\"]"));
    }
}
