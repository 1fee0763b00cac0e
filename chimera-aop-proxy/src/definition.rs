//! 服务定义与定义注册表
//!
//! 服务定义保存在一个 arena 中，通过 [`DefinitionId`] 引用。内联定义
//! （嵌套在参数、方法调用或属性中的定义）同样分配 ID，只是不注册服务名

use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 服务定义句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId(usize);

impl DefinitionId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 定义参数
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// 字面值
    Value(String),
    /// 对其他服务的引用
    Reference(String),
    /// 内联定义
    Definition(DefinitionId),
    List(Vec<Argument>),
    Map(IndexMap<String, Argument>),
}

impl Argument {
    pub fn value(value: impl Into<String>) -> Self {
        Argument::Value(value.into())
    }

    pub fn reference(service_id: impl Into<String>) -> Self {
        Argument::Reference(service_id.into())
    }

    /// 收集直接或间接（列表、映射中）包含的内联定义
    pub fn collect_definitions(&self, out: &mut Vec<DefinitionId>) {
        match self {
            Argument::Definition(id) => out.push(*id),
            Argument::List(items) => items.iter().for_each(|item| item.collect_definitions(out)),
            Argument::Map(entries) => entries.values().for_each(|item| item.collect_definitions(out)),
            Argument::Value(_) | Argument::Reference(_) => {}
        }
    }
}

/// 构造后执行的方法调用
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Vec<Argument>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// 工厂信息
///
/// 由工厂产生的实例对容器不透明，不能被代理
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Factory {
    Service { service_id: String, method: String },
    Class { class: String, method: String },
}

/// 服务标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub attributes: IndexMap<String, String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// 服务定义
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    class: String,
    file: Option<PathBuf>,
    synthetic: bool,
    factory: Option<Factory>,
    arguments: Vec<Argument>,
    method_calls: Vec<MethodCall>,
    properties: IndexMap<String, Argument>,
    tags: Vec<Tag>,
}

impl ServiceDefinition {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            file: None,
            synthetic: false,
            factory: None,
            arguments: Vec::new(),
            method_calls: Vec::new(),
            properties: IndexMap::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_method_call(mut self, call: MethodCall) -> Self {
        self.method_calls.push(call);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Argument) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn factory(&self) -> Option<&Factory> {
        self.factory.as_ref()
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn method_calls(&self) -> &[MethodCall] {
        &self.method_calls
    }

    pub fn properties(&self) -> &IndexMap<String, Argument> {
        &self.properties
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn set_class(&mut self, class: impl Into<String>) {
        self.class = class.into();
    }

    pub fn set_file(&mut self, file: impl Into<PathBuf>) {
        self.file = Some(file.into());
    }

    pub fn add_argument(&mut self, argument: Argument) {
        self.arguments.push(argument);
    }

    pub fn add_method_call(&mut self, call: MethodCall) {
        self.method_calls.push(call);
    }

    pub fn has_method_call(&self, method: &str) -> bool {
        self.method_calls.iter().any(|call| call.method == method)
    }

    /// 嵌套在构造参数、方法调用参数和属性值中的内联定义（按出现顺序）
    pub fn inline_definitions(&self) -> Vec<DefinitionId> {
        let mut out = Vec::new();
        for argument in &self.arguments {
            argument.collect_definitions(&mut out);
        }
        for call in &self.method_calls {
            for argument in &call.arguments {
                argument.collect_definitions(&mut out);
            }
        }
        for value in self.properties.values() {
            value.collect_definitions(&mut out);
        }
        out
    }
}

/// 服务定义注册表
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: Vec<ServiceDefinition>,
    services: IndexMap<String, DefinitionId>,
    parameters: HashMap<String, String>,
    resources: IndexSet<PathBuf>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册顶层服务；同名服务会被替换为新定义
    pub fn register(&mut self, service_id: impl Into<String>, definition: ServiceDefinition) -> DefinitionId {
        let service_id = service_id.into();
        let id = self.allocate(definition);
        tracing::trace!("Registering service definition '{}' as {}", service_id, id);
        self.services.insert(service_id, id);
        id
    }

    /// 分配内联定义（不注册服务名）
    pub fn inline(&mut self, definition: ServiceDefinition) -> DefinitionId {
        self.allocate(definition)
    }

    fn allocate(&mut self, definition: ServiceDefinition) -> DefinitionId {
        self.definitions.push(definition);
        DefinitionId(self.definitions.len() - 1)
    }

    /// 获取定义
    ///
    /// # Panics
    ///
    /// ID 不是由本注册表分配时 panic
    pub fn definition(&self, id: DefinitionId) -> &ServiceDefinition {
        &self.definitions[id.0]
    }

    /// 获取可变定义
    ///
    /// # Panics
    ///
    /// ID 不是由本注册表分配时 panic
    pub fn definition_mut(&mut self, id: DefinitionId) -> &mut ServiceDefinition {
        &mut self.definitions[id.0]
    }

    /// 通过服务 ID 查找
    pub fn get(&self, service_id: &str) -> Option<DefinitionId> {
        self.services.get(service_id).copied()
    }

    pub fn contains(&self, service_id: &str) -> bool {
        self.services.contains_key(service_id)
    }

    /// 所有顶层服务（注册顺序）
    pub fn services(&self) -> impl Iterator<Item = (&str, DefinitionId)> {
        self.services.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// 查找带有指定标签的服务，返回服务 ID 和该标签的所有实例
    pub fn find_tagged_service_ids(&self, tag: &str) -> Vec<(String, Vec<Tag>)> {
        self.services
            .iter()
            .filter_map(|(service_id, id)| {
                let tags: Vec<Tag> = self
                    .definition(*id)
                    .tags()
                    .iter()
                    .filter(|t| t.name == tag)
                    .cloned()
                    .collect();
                (!tags.is_empty()).then(|| (service_id.clone(), tags))
            })
            .collect()
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// 登记构建依赖的资源文件（重复登记会被忽略）
    pub fn add_resource(&mut self, path: impl Into<PathBuf>) {
        self.resources.insert(path.into());
    }

    pub fn resources(&self) -> impl Iterator<Item = &Path> {
        self.resources.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
