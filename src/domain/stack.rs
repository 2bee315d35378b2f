//! Compose 栈领域模型

use std::path::{Path, PathBuf};

use serde::Serialize;

/// 一个待部署的 compose 栈
///
/// 由目录遍历发现的 compose 文件及其推导出的栈名
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StackFile {
    /// compose 文件绝对路径
    pub path: PathBuf,
    /// 栈名
    pub name: String,
}

impl StackFile {
    /// 从发现的文件构造栈定义
    ///
    /// `root` 是栈定义搜索根目录（如 `<clone_dir>/docker`）
    pub fn from_path(root: &Path, path: PathBuf) -> Self {
        let name = derive_stack_name(root, &path);
        Self { path, name }
    }
}

/// 推导栈名
///
/// 规则：使用父目录名；文件直接位于搜索根目录时改用文件名去掉扩展名。
/// `docker/my-app/docker-compose.yml` → `my-app`，`docker/foo.yml` → `foo`
pub fn derive_stack_name(root: &Path, file: &Path) -> String {
    let parent = file.parent();
    let in_root = parent.map(|p| p == root).unwrap_or(true);

    if in_root {
        file.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "stack".to_string())
    } else {
        parent
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "stack".to_string())
    }
}

/// 判断路径是否是 compose 定义文件
pub fn is_compose_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}
