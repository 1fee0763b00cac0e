//! 代理命名与路径
//!
//! 代理名称只取决于用户类名和代理目录，重复构建得到相同名称

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// 代理名称中分隔代理前缀和用户类名的标记
pub const PROXY_MARKER: &str = "__AOP__";

/// 代理名称前缀
pub const PROXY_PREFIX: &str = "AopProxy";

/// 哈希保留的十六进制位数
const HASH_LEN: usize = 16;

/// 还原用户可见的类名
///
/// 去掉最后一个 `::__AOP__::` 及其之前的部分；普通类名原样返回
pub fn user_class(class: &str) -> &str {
    let marker = format!("::{}::", PROXY_MARKER);
    match class.rfind(&marker) {
        Some(pos) => &class[pos + marker.len()..],
        None => class,
    }
}

/// 名称是否为生成的代理类名
pub fn is_proxy_class(class: &str) -> bool {
    class.contains(&format!("::{}::", PROXY_MARKER))
}

/// 截断的 SHA-256 十六进制摘要
pub fn hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

/// 代理类的完整名称
///
/// `AopProxy_<hash(代理目录)>_<hash(用户类)>::__AOP__::<用户类>`
pub fn proxy_class_name(class: &str, proxies_dir: &Path) -> String {
    let user_class = user_class(class);
    format!(
        "{}_{}_{}::{}::{}",
        PROXY_PREFIX,
        hash(&proxies_dir.to_string_lossy()),
        hash(user_class),
        PROXY_MARKER,
        user_class
    )
}

/// 文件名中使用的类名（`::` 替换为 `-`）
pub fn sanitize(class: &str) -> String {
    user_class(class).replace("::", "-")
}

/// 代理文件路径：`<代理目录>/<净化后的类名>.rs`
pub fn proxy_file_path(proxies_dir: &Path, class: &str) -> PathBuf {
    proxies_dir.join(format!("{}.rs", sanitize(class)))
}

/// 从 `from_dir` 指向 `target` 的路径
///
/// 无法计算相对路径时（例如一个是绝对路径一个是相对路径）返回 `target` 本身
pub fn relative_path(from_dir: &Path, target: &Path) -> PathBuf {
    pathdiff::diff_paths(target, from_dir).unwrap_or_else(|| target.to_path_buf())
}
