//! 可拦截方法集合

use crate::metadata::{ClassMetadata, MethodMetadata, Visibility};

/// 返回类中可以被代理覆盖的方法（声明顺序）
///
/// final 类没有可拦截方法；私有、final、构造函数和无接收者的关联函数都被排除
pub fn eligible_methods(class: &ClassMetadata) -> Vec<&MethodMetadata> {
    if class.is_final {
        return Vec::new();
    }

    class.methods.iter().filter(|method| is_eligible(method)).collect()
}

/// 单个方法是否可被拦截（不考虑所属类）
pub fn is_eligible(method: &MethodMetadata) -> bool {
    method.visibility != Visibility::Private
        && !method.is_final
        && !method.is_constructor
        && !method.is_static()
}
