//! 连通分量计数与最大分量提取.

use crate::config::Connectivity;
use crate::morph_3d::{self, component_sizes, Labeled};
use crate::{BinaryMask, BoneError, BoneResult};
use log::debug;

/// 标记 `mask` 的连通分量, 返回标记结果. 分量个数即 `Labeled::count`.
#[inline]
pub fn count_components(mask: &BinaryMask, connectivity: Connectivity) -> Labeled {
    morph_3d::label(mask, connectivity)
}

/// 提取 `mask` 中体素个数最多的连通分量 (骨架).
///
/// 结果保留原掩码中的体素值 (而不是标签编号), 并在最后进行一次闭运算.
/// 若有多个分量体素个数相同, 选择编号最小者.
///
/// # 错误
///
/// 全背景掩码返回 [`BoneError::EmptyMask`].
pub fn largest_component(mask: &BinaryMask, connectivity: Connectivity) -> BoneResult<BinaryMask> {
    let labeled = count_components(mask, connectivity);
    if labeled.count == 0 {
        return Err(BoneError::EmptyMask);
    }

    let sizes = component_sizes(&labeled);
    let (best, best_size) = sizes
        .iter()
        .enumerate()
        .skip(1)
        .fold((0, 0), |acc, (l, &n)| if n > acc.1 { (l, n) } else { acc });
    debug!(
        "largest of {} components: label {best} with {best_size} voxels",
        labeled.count
    );

    let best = best as u32;
    let keep = labeled.labels.mapv(|l| l == best);
    Ok(mask.retain_where(keep.view()).closing())
}
