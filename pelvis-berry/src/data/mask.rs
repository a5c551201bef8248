//! 二值掩码与轴向范围.

use crate::consts::voxel::*;
use crate::Idx3d;
use ndarray::{s, Array3, ArrayView3, ArrayViewMut3, Axis, Zip};
use std::ops::{Index, Range};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 与扫描同形状的 3D 二值掩码, 按照 `(z, h, w)` 组织.
///
/// 体素值只应为 [`BACKGROUND`] 或 [`FOREGROUND`]. 所有判断均以 "非零即前景" 进行,
/// 因此从磁盘读入的掩码即使被缩放过也能正常工作.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    data: Array3<u16>,
}

impl Index<Idx3d> for BinaryMask {
    type Output = u16;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl BinaryMask {
    /// 直接由数据构建.
    #[inline]
    pub fn new(data: Array3<u16>) -> Self {
        Self { data }
    }

    /// 创建全背景掩码.
    #[inline]
    pub fn zeros(shape: Idx3d) -> Self {
        Self::new(Array3::from_elem(shape, BACKGROUND))
    }

    /// 将满足 `low < v <= high` 的体素标记为前景, 其余为背景.
    ///
    /// 不做任何形态学处理. `high <= low` 时返回全背景掩码.
    pub fn from_window(volume: ArrayView3<f32>, low: i32, high: i32) -> Self {
        let (low, high) = (low as f32, high as f32);
        Self::new(volume.mapv(|v| {
            if low < v && v <= high {
                FOREGROUND
            } else {
                BACKGROUND
            }
        }))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, u16> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, u16> {
        self.data.view_mut()
    }

    /// 取出底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<u16> {
        self.data
    }

    /// 数据形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 前景体素个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|&&v| is_foreground(v)).count()
    }

    /// 是否为全背景?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }

    /// 是否只包含 [`BACKGROUND`] 与 [`FOREGROUND`] 两种值?
    #[inline]
    pub fn is_binary(&self) -> bool {
        self.data
            .iter()
            .all(|&v| v == BACKGROUND || v == FOREGROUND)
    }

    /// 逐体素保留 `self` 中 `keep` 为 `true` 的值, 其余置为背景.
    pub fn retain_where(&self, keep: ArrayView3<bool>) -> Self {
        let mut data = self.data.clone();
        Zip::from(&mut data).and(&keep).for_each(|v, &k| {
            if !k {
                *v = BACKGROUND;
            }
        });
        Self::new(data)
    }

    /// 按轴向范围 `bounds.lower..bounds.upper` 裁剪, 返回新的掩码.
    ///
    /// 若范围越界则程序 panic.
    pub fn crop_axial(&self, bounds: AxialBounds) -> Self {
        Self::new(self.data.slice(s![bounds.range(), .., ..]).to_owned())
    }
}

/// 骨盆所在的轴向切片范围, 满足 `lower < upper`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxialBounds {
    lower: usize,
    upper: usize,
}

impl AxialBounds {
    /// 构建范围. 若 `lower >= upper` 则返回 `None`.
    #[inline]
    pub fn new(lower: usize, upper: usize) -> Option<Self> {
        (lower < upper).then_some(Self { lower, upper })
    }

    /// 下界切片索引.
    #[inline]
    pub fn lower(&self) -> usize {
        self.lower
    }

    /// 上界切片索引.
    #[inline]
    pub fn upper(&self) -> usize {
        self.upper
    }

    /// 半开区间 `lower..upper`.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.lower..self.upper
    }

    /// 范围内的切片个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.upper - self.lower
    }

    /// 范围是否落在 `[0, depth)` 内?
    #[inline]
    pub fn fits(&self, depth: usize) -> bool {
        self.upper < depth
    }
}
