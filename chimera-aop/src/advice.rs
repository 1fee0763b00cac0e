//! 通知映射（Advice Map）定义
//!
//! 构建期匹配的结果，也是运行时拦截器加载器消费的数据

use indexmap::IndexMap;

/// 单个类的通知映射
///
/// 方法名 -> 按切点顺序排列的拦截器 ID 列表。
/// 不会包含拦截器列表为空的方法。
pub type ClassAdviceMap = IndexMap<String, Vec<String>>;

/// 整个构建的拦截器索引
///
/// 用户可见类名（从不是代理类名）-> 该类的通知映射
pub type InterceptorIndex = IndexMap<String, ClassAdviceMap>;

/// 查找某个方法的拦截器 ID 列表
pub fn advice_for<'a>(index: &'a InterceptorIndex, class: &str, method: &str) -> Option<&'a [String]> {
    index
        .get(class)
        .and_then(|advice| advice.get(method))
        .map(|ids| ids.as_slice())
}
