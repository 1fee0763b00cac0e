//! Rust 源码输出

use super::{ProxyClass, ProxyMethod, REQUIRED_MODULE, TARGET_FIELD};

/// 带缩进管理的源码构建器
#[derive(Debug, Default, Clone)]
pub struct SourceBuilder {
    content: String,
    indent_level: usize,
    indent: String,
}

impl SourceBuilder {
    pub fn new(indent: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            indent_level: 0,
            indent: indent.into(),
        }
    }

    pub fn push_line(&mut self, line: &str) {
        if !line.is_empty() {
            self.push_indent();
            self.content.push_str(line);
        }
        self.content.push('\n');
    }

    pub fn push_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.content.push_str(&self.indent);
        }
    }

    /// 输出 `header {` 并增加缩进
    pub fn open(&mut self, header: &str) {
        self.push_line(&format!("{} {{", header));
        self.indent();
    }

    /// 减少缩进并输出 `}`
    pub fn close(&mut self) {
        self.dedent();
        self.push_line("}");
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    pub fn build(self) -> String {
        self.content
    }
}

/// 输出代理的 Rust 源码
///
/// 代理的命名空间展开为嵌套模块，使结构体的完整路径与代理类名一致。
/// 输出只取决于模型内容
pub fn render(proxy: &ProxyClass, indent: &str) -> String {
    let mut out = SourceBuilder::new(indent);
    let short_name = proxy.short_name();
    let target = proxy.target_type();

    out.push_line("// @generated by chimera-aop-proxy. Do not edit.");
    out.push_line(&format!("// proxy: {}", proxy.name()));
    out.push_line(&format!("// class: {}", proxy.user_class()));
    out.push_line("");

    if let Some(file) = proxy.required_file() {
        out.push_line(&format!("#[path = {:?}]", file.to_string_lossy()));
        out.push_line(&format!("mod {};", REQUIRED_MODULE));
        out.push_line("");
    }

    let modules: Vec<&str> = proxy
        .namespace()
        .split("::")
        .filter(|segment| !segment.is_empty())
        .collect();

    for (depth, module) in modules.iter().enumerate() {
        if depth == 0 {
            out.push_line("#[allow(non_snake_case, non_camel_case_types, dead_code, clippy::all)]");
        }
        out.open(&format!("pub mod {}", module));
    }

    if proxy.required_file().is_some() {
        let supers = "super::".repeat(modules.len());
        out.push_line(&format!("use {}{};", supers, REQUIRED_MODULE));
        out.push_line("");
    }

    // 结构体
    out.open(&format!("pub struct {}", short_name));
    out.push_line(&format!("{}: {},", TARGET_FIELD, target));
    for field in proxy.fields() {
        out.push_line(&format!("{}: {},", field.name, field.ty));
    }
    out.close();
    out.push_line("");

    // 固有方法
    out.open(&format!("impl {}", short_name));
    for constant in proxy.constants() {
        out.push_line(&format!("const {}: {} = {};", constant.name, constant.ty, constant.value));
    }
    if proxy.constants().next().is_some() {
        out.push_line("");
    }

    out.push_line("/// 包装原始实例");
    out.open(&format!("pub fn __aop_wrap(target: {}) -> Self", target));
    out.open("Self");
    out.push_line(&format!("{}: target,", TARGET_FIELD));
    for field in proxy.fields() {
        out.push_line(&format!("{}: {},", field.name, field.init));
    }
    out.close();
    out.close();

    out.push_line("");
    out.push_line("/// 取回原始实例");
    out.open(&format!("pub fn __aop_into_inner(self) -> {}", target));
    out.push_line(&format!("self.{}", TARGET_FIELD));
    out.close();

    for method in proxy.methods() {
        out.push_line("");
        render_method(&mut out, method);
    }
    out.close();
    out.push_line("");

    // 构造与解引用
    out.open(&format!("impl ::std::convert::From<{}> for {}", target, short_name));
    out.open(&format!("fn from(target: {}) -> Self", target));
    out.push_line("Self::__aop_wrap(target)");
    out.close();
    out.close();
    out.push_line("");

    out.open(&format!("impl ::std::ops::Deref for {}", short_name));
    out.push_line(&format!("type Target = {};", target));
    out.push_line("");
    out.open("fn deref(&self) -> &Self::Target");
    out.push_line(&format!("&self.{}", TARGET_FIELD));
    out.close();
    out.close();
    out.push_line("");

    out.open(&format!("impl ::std::ops::DerefMut for {}", short_name));
    out.open("fn deref_mut(&mut self) -> &mut Self::Target");
    out.push_line(&format!("&mut self.{}", TARGET_FIELD));
    out.close();
    out.close();

    for _ in &modules {
        out.close();
    }

    out.build()
}

fn render_method(out: &mut SourceBuilder, method: &ProxyMethod) {
    if let Some(doc) = &method.doc {
        for line in doc.lines() {
            out.push_line(&format!("/// {}", line));
        }
    }

    let mut params: Vec<String> = method.receiver.as_rust().map(str::to_string).into_iter().collect();
    params.extend(method.parameters.iter().map(|p| format!("{}: {}", p.name, p.ty)));

    let mut signature = format!(
        "{}fn {}({})",
        method.visibility.as_rust(),
        method.name,
        params.join(", ")
    );
    if let Some(ret) = &method.return_type {
        signature.push_str(&format!(" -> {}", ret));
    }

    out.open(&signature);
    for line in &method.body {
        out.push_line(line);
    }
    out.close();
}
