//! 批处理工具依赖的通用组件.

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 获取阈值搜索的线程数.
///
/// 1. 若环境变量 `$PELVIS_WORKERS` 是正整数, 则返回其值;
/// 2. 否则, 返回可并行核心数.
pub fn workers_from_env() -> usize {
    std::env::var("PELVIS_WORKERS")
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(cpus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpus() {
        assert!(cpus() >= 1);
        assert!(workers_from_env() >= 1);
    }
}
