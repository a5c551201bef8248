//! 数据集目录与病例枚举.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 获取 `$HOME/dataset/...` 路径. 无法获取 home 目录时返回 `None`.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 获取输入目录.
///
/// 1. 若环境变量 `$PELVIS_INPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/pelvis/input`.
pub fn input_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("PELVIS_INPUT_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(["pelvis", "input"]),
    }
}

/// 获取输出目录.
///
/// 1. 若环境变量 `$PELVIS_OUTPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/pelvis/output`.
pub fn output_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("PELVIS_OUTPUT_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(["pelvis", "output"]),
    }
}

/// 一个待处理的病例: nifti 文件或 DICOM 切片目录.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    /// 病例名, 即去掉扩展名的文件名或目录名.
    pub name: String,

    /// 病例路径.
    pub path: PathBuf,
}

/// 去掉 `.nii` 或 `.nii.gz` 后缀. 不是 nifti 文件名时返回 `None`.
pub fn nifti_stem(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(".nii.gz")
        .or_else(|| file_name.strip_suffix(".nii"))
        .filter(|s| !s.is_empty())
}

/// 枚举 `dir` 下所有病例, 按照名字排序. 其它文件被忽略.
pub fn list_cases<P: AsRef<Path>>(dir: P) -> io::Result<Vec<Case>> {
    let mut cases = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let name = if path.is_dir() {
            file_name.to_string()
        } else if let Some(stem) = nifti_stem(file_name) {
            stem.to_string()
        } else {
            continue;
        };
        cases.push(Case { name, path });
    }
    cases.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(cases)
}
