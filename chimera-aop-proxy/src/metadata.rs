//! 类元数据
//!
//! 引擎不依赖任何运行时反射，类和方法的结构由 [`ClassMetadataProvider`] 提供，
//! 实现者可以来自编译产物的符号表、静态分析或手工构造的表

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 方法可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// 生成代码中的可见性修饰符
    pub fn as_rust(&self) -> &'static str {
        match self {
            Visibility::Public => "pub ",
            Visibility::Protected => "pub(crate) ",
            Visibility::Private => "",
        }
    }
}

/// 方法接收者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// 无接收者（关联函数 / 静态方法）
    Static,
    /// `&self`
    Ref,
    /// `&mut self`
    RefMut,
    /// `self`
    Value,
}

impl Receiver {
    pub fn as_rust(&self) -> Option<&'static str> {
        match self {
            Receiver::Static => None,
            Receiver::Ref => Some("&self"),
            Receiver::RefMut => Some("&mut self"),
            Receiver::Value => Some("self"),
        }
    }
}

/// 方法参数
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    pub ty: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// 方法元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMetadata {
    pub name: String,
    pub visibility: Visibility,
    pub receiver: Receiver,
    pub is_final: bool,
    pub is_constructor: bool,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
}

impl MethodMetadata {
    /// 创建一个 `pub fn name(&self)` 方法
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            receiver: Receiver::Ref,
            is_final: false,
            is_constructor: false,
            parameters: Vec::new(),
            return_type: None,
        }
    }

    /// 创建构造函数（无接收者，返回 Self）
    pub fn constructor(name: impl Into<String>) -> Self {
        Self {
            receiver: Receiver::Static,
            is_constructor: true,
            return_type: Some("Self".to_string()),
            ..Self::new(name)
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

    pub fn final_method(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn is_static(&self) -> bool {
        self.receiver == Receiver::Static
    }
}

/// 类元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMetadata {
    /// 完整类名（`::` 分隔）
    pub name: String,

    /// 声明所在的源文件
    pub file: Option<PathBuf>,

    /// 父类名称
    pub parent: Option<String>,

    pub is_final: bool,

    /// 方法（声明顺序）
    pub methods: Vec<MethodMetadata>,
}

impl ClassMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
            parent: None,
            is_final: false,
            methods: Vec::new(),
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_method(mut self, method: MethodMetadata) -> Self {
        self.methods.push(method);
        self
    }

    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// 类名最后一段
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn method(&self, name: &str) -> Option<&MethodMetadata> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// 类元数据提供者
///
/// 未知类返回 `None`，引擎会静默跳过引用它的服务定义
pub trait ClassMetadataProvider {
    fn class(&self, name: &str) -> Option<Arc<ClassMetadata>>;
}

/// 内存中的类元数据表
#[derive(Debug, Default, Clone)]
pub struct InMemoryClassMetadataProvider {
    classes: IndexMap<String, Arc<ClassMetadata>>,
}

impl InMemoryClassMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: ClassMetadata) {
        tracing::trace!("Registering class metadata: {}", class.name);
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    pub fn with_class(mut self, class: ClassMetadata) -> Self {
        self.register(class);
        self
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassMetadataProvider for InMemoryClassMetadataProvider {
    fn class(&self, name: &str) -> Option<Arc<ClassMetadata>> {
        self.classes.get(name).cloned()
    }
}
