//! 3D 形态学操作.
//!
//! 结构元为 6-邻接的钻石型 (中心 + 前后上下左右). 腐蚀/膨胀按灰度形态学定义:
//! 腐蚀取邻域最小值, 膨胀取邻域最大值. 数据范围外的体素不参与计算,
//! 即腐蚀时视为前景, 膨胀时视为背景.

use crate::{BinaryMask, Idx3d};
use ndarray::{Array3, ArrayView3, ArrayViewMut2, Axis};

mod label;

pub use label::{component_sizes, label, Labeled};

/// 邻域合并方式.
#[derive(Copy, Clone, Debug)]
enum MorphOp {
    /// 取最小值.
    Erode,

    /// 取最大值.
    Dilate,
}

impl MorphOp {
    #[inline]
    fn fold(self, acc: u16, v: u16) -> u16 {
        match self {
            MorphOp::Erode => acc.min(v),
            MorphOp::Dilate => acc.max(v),
        }
    }
}

/// 索引是否落在形状为 `shape` 的数据内?
#[inline]
pub(crate) fn check(&(z0, h0, w0): &Idx3d, (z, h, w): Idx3d) -> bool {
    z0 < z && h0 < h && w0 < w
}

/// 获取 `pos` 前后上下左右六个点的坐标.
///
/// 在数据范围外的坐标会被过滤掉, 不会出现在迭代器中.
#[inline]
pub(crate) fn diamond_neighbours((z, h, w): Idx3d, shape: Idx3d) -> impl Iterator<Item = Idx3d> {
    [
        (z.wrapping_sub(1), h, w),
        (z.saturating_add(1), h, w),
        (z, h.wrapping_sub(1), w),
        (z, h.saturating_add(1), w),
        (z, h, w.wrapping_sub(1)),
        (z, h, w.saturating_add(1)),
    ]
    .into_iter()
    .filter(move |p| check(p, shape))
}

/// 获取 `pos` 周围 3x3x3 立方体内其余 26 个点的坐标.
///
/// 在数据范围外的坐标会被过滤掉, 不会出现在迭代器中.
pub(crate) fn cube_neighbours((z, h, w): Idx3d, shape: Idx3d) -> impl Iterator<Item = Idx3d> {
    const D: [usize; 3] = [usize::MAX, 0, 1]; // -1, 0, +1 (wrapping)
    D.into_iter()
        .flat_map(|dz| D.into_iter().map(move |dh| (dz, dh)))
        .flat_map(|(dz, dh)| D.into_iter().map(move |dw| (dz, dh, dw)))
        .filter(|&d| d != (0, 0, 0))
        .map(move |(dz, dh, dw)| {
            (
                z.wrapping_add(dz),
                h.wrapping_add(dh),
                w.wrapping_add(dw),
            )
        })
        .filter(move |p| check(p, shape))
}

/// 计算第 `z` 层水平切片的形态学结果, 写入 `out`.
fn morph_slice(src: &ArrayView3<u16>, z: usize, mut out: ArrayViewMut2<u16>, op: MorphOp) {
    let shape = src.dim();
    for ((h, w), slot) in out.indexed_iter_mut() {
        let pos = (z, h, w);
        *slot = diamond_neighbours(pos, shape).fold(src[pos], |acc, p| op.fold(acc, src[p]));
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

        /// 借助 `rayon`, 并行地计算每个水平切片.
        fn morph(src: ArrayView3<u16>, op: MorphOp) -> Array3<u16> {
            let mut out = Array3::<u16>::zeros(src.dim());
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(z, sli)| morph_slice(&src, z, sli, op));
            out
        }
    } else {
        /// 依次计算每个水平切片.
        fn morph(src: ArrayView3<u16>, op: MorphOp) -> Array3<u16> {
            let mut out = Array3::<u16>::zeros(src.dim());
            out.axis_iter_mut(Axis(0))
                .enumerate()
                .for_each(|(z, sli)| morph_slice(&src, z, sli, op));
            out
        }
    }
}

/// 形态学实现块
impl BinaryMask {
    /// 3D 腐蚀.
    #[inline]
    pub fn erode(&self) -> Self {
        Self::new(morph(self.data(), MorphOp::Erode))
    }

    /// 3D 膨胀.
    #[inline]
    pub fn dilate(&self) -> Self {
        Self::new(morph(self.data(), MorphOp::Dilate))
    }

    /// 开运算 (先腐蚀后膨胀). 去除细小噪声.
    #[inline]
    pub fn opening(&self) -> Self {
        self.erode().dilate()
    }

    /// 闭运算 (先膨胀后腐蚀). 填补骨骼内部的细小缝隙.
    #[inline]
    pub fn closing(&self) -> Self {
        self.dilate().erode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::voxel::FOREGROUND;
    use ndarray::s;

    fn cube(shape: Idx3d, z: std::ops::Range<usize>, h: std::ops::Range<usize>, w: std::ops::Range<usize>) -> BinaryMask {
        let mut m = BinaryMask::zeros(shape);
        m.data_mut().slice_mut(s![z, h, w]).fill(FOREGROUND);
        m
    }

    #[test]
    fn test_neighbours() {
        assert_eq!(diamond_neighbours((0, 0, 0), (3, 3, 3)).count(), 3);
        assert_eq!(diamond_neighbours((1, 1, 1), (3, 3, 3)).count(), 6);
        assert_eq!(cube_neighbours((1, 1, 1), (3, 3, 3)).count(), 26);
        assert_eq!(cube_neighbours((0, 0, 0), (3, 3, 3)).count(), 7);
        assert_eq!(cube_neighbours((0, 0, 0), (1, 1, 1)).count(), 0);
    }

    #[test]
    fn test_erode_dilate_single_voxel() {
        let m = cube((5, 5, 5), 2..3, 2..3, 2..3);
        assert!(m.erode().is_background());
        assert_eq!(m.dilate().count_foreground(), 7);

        // 单体素噪声被开运算去除.
        assert!(m.opening().is_background());
    }

    #[test]
    fn test_erode_cube() {
        let m = cube((7, 7, 7), 1..6, 1..6, 1..6);
        let e = m.erode();
        assert_eq!(e.count_foreground(), 27);
        assert_eq!(e[(3, 3, 3)], FOREGROUND);
        assert_eq!(e[(1, 3, 3)], 0);
    }

    /// 数据范围外的体素在腐蚀时被视为前景.
    #[test]
    fn test_erode_border() {
        let m = cube((3, 3, 3), 0..3, 0..3, 0..3);
        assert_eq!(m.erode(), m);
        assert_eq!(m.dilate(), m);
    }

    /// 远离边界的长方体在闭运算下保持不变.
    #[test]
    fn test_closing_keeps_cuboid() {
        let m = cube((10, 10, 12), 2..6, 3..7, 2..9);
        assert_eq!(m.closing(), m);
    }

    /// 闭运算填补一体素宽的缝隙.
    #[test]
    fn test_closing_fills_gap() {
        let mut m = cube((9, 9, 9), 2..7, 2..7, 2..7);
        m.data_mut()[(4, 4, 4)] = 0;
        let c = m.closing();
        assert_eq!(c[(4, 4, 4)], FOREGROUND);
        assert!(c.is_binary());
    }
}
