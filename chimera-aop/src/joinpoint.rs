//! 连接点（JoinPoint）定义
//!
//! 生成的代理方法在调用时构造 [`MethodInvocation`]，并把它交给拦截器链

use crate::MethodInterceptor;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// 方法标识
///
/// 由生成的代理代码以常量形式给出，`advice` 是构建期计算出的拦截器 ID 表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// 用户可见的类名
    pub class: &'static str,

    /// 方法名称
    pub method: &'static str,

    /// 构建期匹配到的拦截器 ID（按切点顺序）
    pub advice: &'static [&'static str],
}

impl MethodRef {
    /// 创建新的方法标识
    pub const fn new(
        class: &'static str,
        method: &'static str,
        advice: &'static [&'static str],
    ) -> Self {
        Self {
            class,
            method,
            advice,
        }
    }

    /// 获取完整的方法签名
    pub fn signature(&self) -> String {
        format!("{}::{}", self.class, self.method)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class, self.method)
    }
}

/// 调用参数
///
/// 参数值在调用前以 `Debug` 形式记录，原始值仍由目标方法消费
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    name: &'static str,
    value: String,
}

impl Argument {
    pub fn new<T: fmt::Debug + ?Sized>(name: &'static str, value: &T) -> Self {
        Self {
            name,
            value: format!("{:?}", value),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// 方法调用上下文
///
/// 携带目标实例、方法标识和调用参数，拦截器通过 [`MethodInvocation::proceed`]
/// 把调用交给链上的下一个拦截器，最后一个之后是原始方法
pub struct MethodInvocation<'a> {
    method: &'a MethodRef,
    target: Option<&'a (dyn Any + Send + Sync)>,
    arguments: &'a [Argument],
    interceptors: &'a [Arc<dyn MethodInterceptor>],
    position: usize,
    target_call: &'a mut dyn FnMut(),
    proceeded: bool,
    timestamp: Instant,
}

impl<'a> MethodInvocation<'a> {
    fn new(
        method: &'a MethodRef,
        target: Option<&'a (dyn Any + Send + Sync)>,
        arguments: &'a [Argument],
        interceptors: &'a [Arc<dyn MethodInterceptor>],
        target_call: &'a mut dyn FnMut(),
    ) -> Self {
        Self {
            method,
            target,
            arguments,
            interceptors,
            position: 0,
            target_call,
            proceeded: false,
            timestamp: Instant::now(),
        }
    }

    /// 继续执行拦截器链
    ///
    /// # Panics
    ///
    /// 原始方法只能被执行一次，链末端被再次到达时会 panic
    pub fn proceed(&mut self) {
        let interceptors = self.interceptors;
        if let Some(interceptor) = interceptors.get(self.position) {
            self.position += 1;
            interceptor.invoke(self);
            return;
        }

        if self.proceeded {
            panic!("MethodInvocation::proceed() reached {} more than once", self.method);
        }
        self.proceeded = true;
        (self.target_call)();
    }

    /// 获取方法标识
    pub fn method(&self) -> &MethodRef {
        self.method
    }

    /// 获取完整的方法签名
    pub fn signature(&self) -> String {
        self.method.signature()
    }

    /// 获取目标实例（`&mut self` 或按值接收者的方法不提供）
    pub fn target(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.target
    }

    /// 尝试以具体类型获取目标实例
    pub fn target_as<T: Any>(&self) -> Option<&T> {
        self.target?.downcast_ref::<T>()
    }

    /// 获取调用参数
    pub fn arguments(&self) -> &[Argument] {
        self.arguments
    }

    /// 按名称获取调用参数
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|argument| argument.name == name)
    }

    /// 原始方法是否已经执行
    pub fn has_proceeded(&self) -> bool {
        self.proceeded
    }

    /// 获取调用时间戳
    pub fn timestamp(&self) -> &Instant {
        &self.timestamp
    }
}

impl fmt::Debug for MethodInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("method", &self.method)
            .field("arguments", &self.arguments)
            .field("position", &self.position)
            .field("interceptors", &self.interceptors.len())
            .field("proceeded", &self.proceeded)
            .finish()
    }
}

/// 以拦截器链执行一次方法调用
///
/// 生成的代理方法把原始方法包装成 `call` 传入，返回原始方法的返回值。
///
/// # Panics
///
/// 如果某个拦截器没有调用 `proceed`，原始方法不会执行，此时没有可返回的值
pub fn invoke<R>(
    method: &MethodRef,
    target: Option<&(dyn Any + Send + Sync)>,
    arguments: Vec<Argument>,
    interceptors: Vec<Arc<dyn MethodInterceptor>>,
    call: impl FnOnce() -> R,
) -> R {
    let mut call = Some(call);
    let mut result = None;
    let mut target_call = || {
        if let Some(call) = call.take() {
            result = Some(call());
        }
    };

    MethodInvocation::new(method, target, &arguments, &interceptors, &mut target_call).proceed();

    match result {
        Some(value) => value,
        None => panic!("interceptor chain of {} did not proceed to the target method", method),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const SAVE: MethodRef = MethodRef::new("app::UserService", "save", &["first", "second"]);

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl MethodInterceptor for Recording {
        fn invoke(&self, invocation: &mut MethodInvocation<'_>) {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            invocation.proceed();
            self.log.lock().unwrap().push(format!("after:{}", self.name));
        }
    }

    struct ShortCircuit;

    impl MethodInterceptor for ShortCircuit {
        fn invoke(&self, _invocation: &mut MethodInvocation<'_>) {}
    }

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn MethodInterceptor> {
        Arc::new(Recording {
            name,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn test_method_ref_signature() {
        assert_eq!(SAVE.signature(), "app::UserService::save");
        assert_eq!(SAVE.to_string(), "app::UserService::save");
    }

    #[test]
    fn test_argument_records_debug_value() {
        let argument = Argument::new("name", "alice");
        assert_eq!(argument.name(), "name");
        assert_eq!(argument.value(), "\"alice\"");
        assert_eq!(argument.to_string(), "name=\"alice\"");
    }

    #[test]
    fn test_invoke_runs_chain_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let interceptors = vec![recording("first", &log), recording("second", &log)];

        let inner = Arc::clone(&log);
        let value = invoke(&SAVE, None, Vec::new(), interceptors, move || {
            inner.lock().unwrap().push("target".to_string());
            42
        });

        assert_eq!(value, 42);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:first", "before:second", "target", "after:second", "after:first"]
        );
    }

    #[test]
    fn test_invoke_without_interceptors_calls_target() {
        let value = invoke(&SAVE, None, Vec::new(), Vec::new(), || "done");
        assert_eq!(value, "done");
    }

    #[test]
    fn test_invocation_exposes_target_and_arguments() {
        struct Inspect;

        impl MethodInterceptor for Inspect {
            fn invoke(&self, invocation: &mut MethodInvocation<'_>) {
                assert_eq!(invocation.target_as::<String>().map(String::as_str), Some("service"));
                assert_eq!(invocation.argument("id").map(Argument::value), Some("7"));
                assert!(!invocation.has_proceeded());
                invocation.proceed();
                assert!(invocation.has_proceeded());
            }
        }

        let service = "service".to_string();
        let id = 7u32;
        let value = invoke(
            &SAVE,
            Some(&service as &(dyn Any + Send + Sync)),
            vec![Argument::new("id", &id)],
            vec![Arc::new(Inspect) as Arc<dyn MethodInterceptor>],
            || id * 2,
        );
        assert_eq!(value, 14);
    }

    #[test]
    #[should_panic(expected = "did not proceed")]
    fn test_short_circuit_panics() {
        invoke(&SAVE, None, Vec::new(), vec![Arc::new(ShortCircuit) as Arc<dyn MethodInterceptor>], || 1);
    }
}
