//! 代理生成
//!
//! [`Enhancer`] 根据原始类构建 [`ProxyClass`] 模型，再依次交给每个
//! [`ProxyGenerator`] 修改，最后由 [`render`] 输出 Rust 源码。
//!
//! 生成的代理是一个包装结构体：持有原始服务实例，通过 `Deref`/`DerefMut`
//! 暴露未被拦截的方法，被拦截的方法以同签名的固有方法覆盖

mod interception;
mod render;

pub use interception::{InterceptionGenerator, LOADER_FIELD, LOADER_SETTER};
pub use render::{render, SourceBuilder};

use crate::config::ProxyConfig;
use crate::error::{AopError, AopResult};
use crate::metadata::{ClassMetadata, MethodMetadata, Parameter, Receiver, Visibility};
use crate::naming;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 包装结构体中保存原始实例的字段
pub const TARGET_FIELD: &str = "__aop_target";

/// 生成代码中引入原始源文件的模块名
pub const REQUIRED_MODULE: &str = "__aop_required";

/// 代理生成器
///
/// 每个生成器向同一个代理模型追加或替换成员；多个生成器按注册顺序执行
pub trait ProxyGenerator: Send + Sync {
    fn generate(&self, original: &ClassMetadata, proxy: &mut ProxyClass) -> anyhow::Result<()>;
}

/// 代理结构体的附加字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyField {
    pub name: String,
    pub ty: String,
    /// 构造时的初始值表达式
    pub init: String,
}

impl ProxyField {
    pub fn new(name: impl Into<String>, ty: impl Into<String>, init: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            init: init.into(),
        }
    }
}

/// 关联常量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConstant {
    pub name: String,
    pub ty: String,
    pub value: String,
}

impl ProxyConstant {
    pub fn new(name: impl Into<String>, ty: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            value: value.into(),
        }
    }
}

/// 代理方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyMethod {
    pub name: String,
    pub visibility: Visibility,
    pub receiver: Receiver,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub doc: Option<String>,
    pub body: Vec<String>,
}

impl ProxyMethod {
    /// 创建 `pub fn name(&self)`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            receiver: Receiver::Ref,
            parameters: Vec::new(),
            return_type: None,
            doc: None,
            body: Vec::new(),
        }
    }

    /// 复制原始方法的签名（不含方法体）
    pub fn overriding(method: &MethodMetadata) -> Self {
        Self {
            name: method.name.clone(),
            visibility: method.visibility,
            receiver: method.receiver,
            parameters: method.parameters.clone(),
            return_type: method.return_type.clone(),
            doc: None,
            body: Vec::new(),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = receiver;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(name, ty));
        self
    }

    pub fn returning(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_body_line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }
}

/// 生成中的代理模型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyClass {
    name: String,
    user_class: String,
    proxies_dir: PathBuf,
    runtime_path: String,
    target_type: String,
    required_file: Option<PathBuf>,
    fields: IndexMap<String, ProxyField>,
    constants: IndexMap<String, ProxyConstant>,
    methods: IndexMap<String, ProxyMethod>,
}

impl ProxyClass {
    pub fn new(
        name: impl Into<String>,
        user_class: impl Into<String>,
        proxies_dir: impl Into<PathBuf>,
        runtime_path: impl Into<String>,
    ) -> Self {
        let user_class = user_class.into();
        Self {
            name: name.into(),
            target_type: crate_path(&user_class),
            user_class,
            proxies_dir: proxies_dir.into(),
            runtime_path: runtime_path.into(),
            required_file: None,
            fields: IndexMap::new(),
            constants: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    /// 完整代理类名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 命名空间（不含最后一段）
    pub fn namespace(&self) -> &str {
        self.name.rsplit_once("::").map(|(ns, _)| ns).unwrap_or("")
    }

    /// 代理结构体名称
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    pub fn user_class(&self) -> &str {
        &self.user_class
    }

    pub fn proxies_dir(&self) -> &Path {
        &self.proxies_dir
    }

    /// 生成代码中运行时 crate 的路径
    pub fn runtime_path(&self) -> &str {
        &self.runtime_path
    }

    /// 被包装类型在生成代码中的路径
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn required_file(&self) -> Option<&Path> {
        self.required_file.as_deref()
    }

    /// 引入原始类所在的源文件
    ///
    /// 路径尽量相对于代理目录，无法计算时使用原路径；
    /// 目标类型随之指向引入的模块
    pub fn require_file(&mut self, file: &Path) {
        let short_name = self.user_class.rsplit("::").next().unwrap_or(&self.user_class);
        self.target_type = format!("{}::{}", REQUIRED_MODULE, short_name);
        self.required_file = Some(naming::relative_path(&self.proxies_dir, file));
    }

    /// 添加字段（同名字段被替换）
    pub fn add_field(&mut self, field: ProxyField) {
        self.fields.insert(field.name.clone(), field);
    }

    pub fn add_constant(&mut self, constant: ProxyConstant) {
        self.constants.insert(constant.name.clone(), constant);
    }

    /// 设置方法（同名方法被替换，保持原位置）
    pub fn set_method(&mut self, method: ProxyMethod) {
        self.methods.insert(method.name.clone(), method);
    }

    pub fn method(&self, name: &str) -> Option<&ProxyMethod> {
        self.methods.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &ProxyField> {
        self.fields.values()
    }

    pub fn constants(&self) -> impl Iterator<Item = &ProxyConstant> {
        self.constants.values()
    }

    pub fn methods(&self) -> impl Iterator<Item = &ProxyMethod> {
        self.methods.values()
    }

    /// 输出 Rust 源码
    pub fn render(&self, indent: &str) -> String {
        render(self, indent)
    }
}

/// 类名在生成代码中的绝对路径
fn crate_path(class: &str) -> String {
    if class.starts_with("::") || class.starts_with("crate::") {
        class.to_string()
    } else {
        format!("crate::{}", class)
    }
}

/// 代理构建器
///
/// 把原始类和一组生成器组合成一个代理模型
pub struct Enhancer<'a> {
    original: &'a ClassMetadata,
    generators: &'a [Arc<dyn ProxyGenerator>],
}

impl<'a> Enhancer<'a> {
    pub fn new(original: &'a ClassMetadata, generators: &'a [Arc<dyn ProxyGenerator>]) -> Self {
        Self {
            original,
            generators,
        }
    }

    /// 代理的完整类名
    pub fn class_name(&self, proxies_dir: &Path) -> String {
        naming::proxy_class_name(&self.original.name, proxies_dir)
    }

    /// 构建代理模型
    ///
    /// `required_file` 为服务定义声明的源文件；生成器失败时返回 [`AopError::Generator`]
    pub fn build(&self, config: &ProxyConfig, required_file: Option<&Path>) -> AopResult<ProxyClass> {
        let proxies_dir = config.proxies_dir();
        let mut proxy = ProxyClass::new(
            self.class_name(&proxies_dir),
            naming::user_class(&self.original.name),
            proxies_dir,
            config.runtime_path.clone(),
        );

        if let Some(file) = required_file {
            proxy.require_file(file);
        }

        for generator in self.generators {
            generator
                .generate(self.original, &mut proxy)
                .map_err(|e| AopError::generator(&self.original.name, e))?;
        }

        tracing::debug!(
            "Built proxy {} with {} method(s) from {} generator(s)",
            proxy.name(),
            proxy.methods.len(),
            self.generators.len()
        );

        Ok(proxy)
    }
}
