//! 代理承诺（ProxyPromise）与代理注册表
//!
//! 匹配阶段的多个 pass 可以向同一个服务定义的承诺追加生成器，
//! 所有 pass 结束后由 [`ProxyMatcher::write_proxy_files`] 统一生成并写入一次

use crate::config::ProxyConfig;
use crate::definition::{DefinitionId, DefinitionRegistry, MethodCall};
use crate::error::{AopError, AopResult};
use crate::generator::{Enhancer, ProxyGenerator};
use crate::metadata::{ClassMetadata, ClassMetadataProvider};
use crate::naming;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// 一个服务定义的延迟代理生成请求
#[derive(Default, Clone)]
pub struct ProxyPromise {
    generators: Vec<Arc<dyn ProxyGenerator>>,
    method_calls: Vec<MethodCall>,
}

impl ProxyPromise {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加生成器（按追加顺序执行）
    pub fn add_generator(&mut self, generator: Arc<dyn ProxyGenerator>) -> &mut Self {
        self.generators.push(generator);
        self
    }

    /// 代理写入后追加到服务定义上的方法调用（同名调用只保留第一个）
    pub fn add_method_call(&mut self, call: MethodCall) -> &mut Self {
        if !self.method_calls.iter().any(|existing| existing.method == call.method) {
            self.method_calls.push(call);
        }
        self
    }

    pub fn generators(&self) -> &[Arc<dyn ProxyGenerator>] {
        &self.generators
    }

    pub fn method_calls(&self) -> &[MethodCall] {
        &self.method_calls
    }

    pub fn enhancer<'a>(&'a self, class: &'a ClassMetadata) -> Enhancer<'a> {
        Enhancer::new(class, &self.generators)
    }
}

impl std::fmt::Debug for ProxyPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPromise")
            .field("generators", &self.generators.len())
            .field("method_calls", &self.method_calls)
            .finish()
    }
}

/// 代理写入后对服务定义的修改
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyPatch {
    pub definition: DefinitionId,
    /// 代理完整类名
    pub class: String,
    /// 代理文件
    pub file: PathBuf,
    pub method_calls: Vec<MethodCall>,
}

impl ProxyPatch {
    /// 改写类名和文件，追加尚不存在的方法调用
    pub fn apply(&self, registry: &mut DefinitionRegistry) {
        let definition = registry.definition_mut(self.definition);
        definition.set_class(self.class.clone());
        definition.set_file(self.file.clone());
        for call in &self.method_calls {
            if !definition.has_method_call(&call.method) {
                definition.add_method_call(call.clone());
            }
        }
    }
}

/// 代理注册表
///
/// 以 [`DefinitionId`] 为键保存承诺。每个定义最多生成一次代理
#[derive(Debug)]
pub struct ProxyMatcher {
    config: ProxyConfig,
    promises: IndexMap<DefinitionId, ProxyPromise>,
    materialized: HashSet<DefinitionId>,
}

impl ProxyMatcher {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            promises: IndexMap::new(),
            materialized: HashSet::new(),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// 获取定义的承诺，不存在时创建
    ///
    /// 已经生成过代理的定义会收到警告，之后追加的内容在写入时被忽略
    pub fn get_enhanced(&mut self, definition: DefinitionId) -> &mut ProxyPromise {
        if self.materialized.contains(&definition) {
            tracing::warn!(
                "Definition {} has already been proxied, further contributions will be ignored",
                definition
            );
        }
        self.promises.entry(definition).or_default()
    }

    pub fn has_promise(&self, definition: DefinitionId) -> bool {
        self.promises.contains_key(&definition)
    }

    pub fn is_materialized(&self, definition: DefinitionId) -> bool {
        self.materialized.contains(&definition)
    }

    /// 待生成的承诺数量
    pub fn pending(&self) -> usize {
        self.promises.len()
    }

    /// 生成并写入所有待处理的代理
    ///
    /// 先渲染全部代理再写盘：生成失败或冲突时不会留下部分输出。
    /// 注册表在调用后被清空，再次调用不会写入任何文件
    pub fn write_proxy_files(
        &mut self,
        registry: &mut DefinitionRegistry,
        provider: &dyn ClassMetadataProvider,
    ) -> AopResult<Vec<ProxyPatch>> {
        let promises = std::mem::take(&mut self.promises);
        if promises.is_empty() {
            tracing::debug!("No pending proxy promises");
            return Ok(Vec::new());
        }

        let proxies_dir = self.config.proxies_dir();
        let mut files: IndexMap<PathBuf, String> = IndexMap::new();
        let mut patches = Vec::new();

        for (id, promise) in promises {
            if self.materialized.contains(&id) {
                tracing::warn!("Ignoring promise for already proxied definition {}", id);
                continue;
            }

            let definition = registry.definition(id);
            if definition.is_synthetic() || definition.factory().is_some() {
                tracing::warn!("Ignoring promise for synthetic or factory definition {}", id);
                continue;
            }

            let class_name = naming::user_class(definition.class());
            let class = provider
                .class(class_name)
                .ok_or_else(|| AopError::UnresolvableClass(class_name.to_string()))?;
            if class.is_final {
                tracing::warn!("Ignoring promise for definition {}: class {} is final", id, class.name);
                continue;
            }

            // 已指向旧代理文件的定义改为引入类声明所在的文件
            let required_file = match definition.file() {
                Some(file) if file.starts_with(&proxies_dir) => class.file(),
                file => file,
            };
            let proxy = promise.enhancer(&class).build(&self.config, required_file)?;
            let source = proxy.render(&self.config.indent);
            let path = naming::proxy_file_path(&proxies_dir, &class.name);

            match files.get(&path) {
                Some(existing) if *existing == source => {
                    tracing::debug!("Definition {} shares proxy {}", id, proxy.name());
                }
                Some(_) => {
                    return Err(AopError::ConflictingProxy {
                        class: class.name.clone(),
                        path,
                    });
                }
                None => {
                    files.insert(path.clone(), source);
                }
            }

            patches.push(ProxyPatch {
                definition: id,
                class: proxy.name().to_string(),
                file: path,
                method_calls: promise.method_calls().to_vec(),
            });
        }

        fs::create_dir_all(&proxies_dir).map_err(|e| AopError::proxy_io(&proxies_dir, e))?;
        for (path, source) in &files {
            tracing::debug!("Writing proxy file {:?}", path);
            fs::write(path, source).map_err(|e| AopError::proxy_io(path, e))?;
        }

        for patch in &patches {
            patch.apply(registry);
            self.materialized.insert(patch.definition);
        }

        tracing::info!(
            "Wrote {} proxy file(s) for {} definition(s)",
            files.len(),
            patches.len()
        );
        Ok(patches)
    }
}
