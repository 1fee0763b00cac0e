//! 拦截代码生成器

use super::{ProxyClass, ProxyConstant, ProxyField, ProxyGenerator, ProxyMethod, TARGET_FIELD};
use crate::metadata::{ClassMetadata, Receiver};
use crate::resolver;
use anyhow::bail;
use chimera_aop::ClassAdviceMap;

/// 代理中保存拦截器加载器的字段
pub const LOADER_FIELD: &str = "__aop_loader";

/// 注入拦截器加载器的方法（构造后由容器调用）
pub const LOADER_SETTER: &str = "set_interceptor_loader";

/// 为通知映射中的每个方法生成拦截覆盖
///
/// 每个被拦截方法得到一个 `MethodRef` 常量（包含构建期的拦截器 ID 表）
/// 和一个同签名方法：通过加载器解析拦截器，记录参数，然后以拦截器链调用原始方法
#[derive(Debug, Clone)]
pub struct InterceptionGenerator {
    advice: ClassAdviceMap,
}

impl InterceptionGenerator {
    pub fn new(advice: ClassAdviceMap) -> Self {
        Self { advice }
    }

    pub fn advice(&self) -> &ClassAdviceMap {
        &self.advice
    }
}

/// 方法常量名
///
/// 序号保证仅大小写不同的方法名不会冲突；原始标识符去掉 `r#` 前缀
fn method_constant(index: usize, method: &str) -> String {
    let name = method.strip_prefix("r#").unwrap_or(method);
    format!("__AOP_METHOD_{}_{}", index, name.to_uppercase())
}

impl ProxyGenerator for InterceptionGenerator {
    fn generate(&self, original: &ClassMetadata, proxy: &mut ProxyClass) -> anyhow::Result<()> {
        let rt = proxy.runtime_path().to_string();
        let class = proxy.user_class().to_string();

        proxy.add_field(ProxyField::new(
            LOADER_FIELD,
            format!("::std::option::Option<::std::sync::Arc<dyn {}::InterceptorLoader>>", rt),
            "::std::option::Option::None",
        ));
        proxy.set_method(
            ProxyMethod::new(LOADER_SETTER)
                .with_receiver(Receiver::RefMut)
                .with_param("loader", format!("::std::sync::Arc<dyn {}::InterceptorLoader>", rt))
                .with_doc("注入拦截器加载器")
                .with_body_line(format!("self.{} = ::std::option::Option::Some(loader);", LOADER_FIELD)),
        );

        for (index, (name, interceptors)) in self.advice.iter().enumerate() {
            let Some(method) = original.method(name) else {
                bail!("advised method '{}' is not declared on {}", name, original.name);
            };
            if !resolver::is_eligible(method) {
                bail!("method {}::{} cannot be intercepted", original.name, name);
            }

            let constant = method_constant(index, name);
            let ids: Vec<String> = interceptors.iter().map(|id| format!("{:?}", id)).collect();
            proxy.add_constant(ProxyConstant::new(
                &constant,
                format!("{}::MethodRef", rt),
                format!(
                    "{}::MethodRef::new({:?}, {:?}, &[{}])",
                    rt,
                    class,
                    name,
                    ids.join(", ")
                ),
            ));

            let arguments: Vec<String> = method
                .parameters
                .iter()
                .map(|p| format!("{}::Argument::new({:?}, &{})", rt, p.name, p.name))
                .collect();
            let call_args: Vec<&str> = method.parameters.iter().map(|p| p.name.as_str()).collect();

            // 只有 `&self` 接收者可以在调用期间共享目标引用
            let target = if method.receiver == Receiver::Ref {
                format!(
                    "::std::option::Option::Some(&self.{} as &(dyn ::std::any::Any + Send + Sync))",
                    TARGET_FIELD
                )
            } else {
                "::std::option::Option::None".to_string()
            };

            let mut overriding = ProxyMethod::overriding(method);
            overriding.body = vec![
                format!(
                    "let __aop_interceptors = {}::resolve_interceptors(self.{}.as_deref(), &Self::{}, &self.{});",
                    rt, LOADER_FIELD, constant, TARGET_FIELD
                ),
                format!("let __aop_arguments = vec![{}];", arguments.join(", ")),
                format!("{}::invoke(", rt),
                format!("    &Self::{},", constant),
                format!("    {},", target),
                "    __aop_arguments,".to_string(),
                "    __aop_interceptors,".to_string(),
                format!("    move || self.{}.{}({}),", TARGET_FIELD, name, call_args.join(", ")),
                ")".to_string(),
            ];
            proxy.set_method(overriding);
        }

        tracing::debug!(
            "Generated {} interception override(s) for {}",
            self.advice.len(),
            class
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MethodMetadata, Visibility};

    fn class() -> ClassMetadata {
        ClassMetadata::new("app::UserService")
            .with_method(MethodMetadata::new("find").with_param("id", "u64").returning("Option<String>"))
            .with_method(
                MethodMetadata::new("rename")
                    .with_receiver(Receiver::RefMut)
                    .with_visibility(Visibility::Protected)
                    .with_param("id", "u64")
                    .with_param("name", "&str"),
            )
            .with_method(MethodMetadata::new("hidden").with_visibility(Visibility::Private))
    }

    fn advice() -> ClassAdviceMap {
        let mut advice = ClassAdviceMap::new();
        advice.insert("find".to_string(), vec!["logging".to_string(), "cache".to_string()]);
        advice.insert("rename".to_string(), vec!["logging".to_string()]);
        advice
    }

    fn generate(advice: ClassAdviceMap) -> anyhow::Result<ProxyClass> {
        let mut proxy = ProxyClass::new(
            "AopProxy_a_b::__AOP__::app::UserService",
            "app::UserService",
            "/tmp/proxies",
            "::chimera_aop",
        );
        InterceptionGenerator::new(advice).generate(&class(), &mut proxy)?;
        Ok(proxy)
    }

    #[test]
    fn test_generates_constant_table() {
        let proxy = generate(advice()).unwrap();
        let constants: Vec<&ProxyConstant> = proxy.constants().collect();

        assert_eq!(constants.len(), 2);
        assert_eq!(constants[0].name, "__AOP_METHOD_0_FIND");
        assert_eq!(
            constants[0].value,
            r#"::chimera_aop::MethodRef::new("app::UserService", "find", &["logging", "cache"])"#
        );
    }

    #[test]
    fn test_generates_overrides_and_setter() {
        let proxy = generate(advice()).unwrap();

        let names: Vec<&str> = proxy.methods().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec![LOADER_SETTER, "find", "rename"]);
        assert!(proxy.fields().any(|f| f.name == LOADER_FIELD));

        let find = proxy.method("find").unwrap();
        assert_eq!(find.return_type.as_deref(), Some("Option<String>"));
        let body = find.body.join("\n");
        assert!(body.contains("resolve_interceptors(self.__aop_loader.as_deref(), &Self::__AOP_METHOD_0_FIND"));
        assert!(body.contains(r#"::chimera_aop::Argument::new("id", &id)"#));
        assert!(body.contains("Some(&self.__aop_target as &(dyn ::std::any::Any + Send + Sync))"));
        assert!(body.contains("move || self.__aop_target.find(id)"));

        let rename = proxy.method("rename").unwrap();
        assert_eq!(rename.visibility, Visibility::Protected);
        let body = rename.body.join("\n");
        assert!(body.contains("::std::option::Option::None,"));
        assert!(body.contains("move || self.__aop_target.rename(id, name)"));
    }

    #[test]
    fn test_constant_names_are_valid_and_distinct() {
        let class = ClassMetadata::new("app::Lexer")
            .with_method(MethodMetadata::new("r#type").returning("u8"))
            .with_method(MethodMetadata::new("next"))
            .with_method(MethodMetadata::new("Next"));
        let mut advice = ClassAdviceMap::new();
        for method in ["r#type", "next", "Next"] {
            advice.insert(method.to_string(), vec!["logging".to_string()]);
        }

        let mut proxy = ProxyClass::new("AopProxy_a_b::__AOP__::app::Lexer", "app::Lexer", "/tmp/proxies", "::chimera_aop");
        InterceptionGenerator::new(advice).generate(&class, &mut proxy).unwrap();

        let names: Vec<&str> = proxy.constants().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["__AOP_METHOD_0_TYPE", "__AOP_METHOD_1_NEXT", "__AOP_METHOD_2_NEXT"]);
        assert!(proxy.method("r#type").unwrap().body.join("\n").contains("self.__aop_target.r#type()"));
    }

    #[test]
    fn test_rejects_unknown_or_ineligible_methods() {
        let mut unknown = ClassAdviceMap::new();
        unknown.insert("missing".to_string(), vec!["logging".to_string()]);
        assert!(generate(unknown).is_err());

        let mut private = ClassAdviceMap::new();
        private.insert("hidden".to_string(), vec!["logging".to_string()]);
        assert!(generate(private).is_err());
    }
}
