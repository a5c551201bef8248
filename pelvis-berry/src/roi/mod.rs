//! 骨盆区域 (ROI) 定位.
//!
//! 骨架的轴向密度曲线 (每个水平切片的前景体素个数) 在骨盆处形成最高峰,
//! 而骨盆上下边界附近的切片密度较低. 因此以最高峰为中心, 向两侧寻找最近的谷,
//! 再沿着密度比值向外修正, 即可得到骨盆所在的切片范围.

use crate::consts::voxel::is_foreground;
use crate::BinaryMask;
use ndarray::Axis;

mod peaks;
mod pelvis;

pub use peaks::{find_peaks, find_valleys, local_maxima};
pub use pelvis::{PelvisLocator, PelvisRoi};

/// 每个水平切片的前景体素个数, 长度为 `mask.len_z()`.
pub fn axial_density(mask: &BinaryMask) -> Vec<u64> {
    mask.data()
        .axis_iter(Axis(0))
        .map(|sli| sli.iter().filter(|&&v| is_foreground(v)).count() as u64)
        .collect()
}
