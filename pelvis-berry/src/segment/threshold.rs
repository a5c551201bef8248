//! 基于强度窗口的骨骼分割.

use crate::BinaryMask;
use log::warn;
use ndarray::ArrayView3;

/// 对 `volume` 进行阈值分割, 返回清理后的二值掩码.
///
/// 满足 `low < v <= high` 的体素被标记为前景. 随后依次进行开运算
/// (去除细小噪声) 和闭运算 (填补骨骼内部的细小缝隙).
///
/// `high <= low` 时窗口退化, 直接返回全背景掩码 (不会报错).
/// 该函数不依赖任何共享状态, 可以在多个线程中同时调用.
pub fn segment(volume: ArrayView3<f32>, low: i32, high: i32) -> BinaryMask {
    if high <= low {
        warn!("degenerate threshold window ({low}, {high}], segmentation is empty");
        return BinaryMask::zeros(volume.dim());
    }
    BinaryMask::from_window(volume, low, high)
        .opening()
        .closing()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::voxel::FOREGROUND;
    use ndarray::{s, Array3};

    /// 一个 5x5x5 的高亮立方体, 外加一个孤立的高亮噪声体素.
    fn phantom() -> Array3<f32> {
        let mut v = Array3::<f32>::from_elem((9, 9, 9), -50.0);
        v.slice_mut(s![2..7, 2..7, 2..7]).fill(700.0);
        v[(0, 8, 0)] = 700.0;
        v
    }

    #[test]
    fn test_segment_values() {
        let m = segment(phantom().view(), 200, 1300);
        assert!(m.is_binary());
        assert_eq!(m[(4, 4, 4)], FOREGROUND);

        // 孤立噪声被开运算去除.
        assert_eq!(m[(0, 8, 0)], 0);
        assert!(m.count_foreground() <= 125);
    }

    #[test]
    fn test_segment_degenerate_window() {
        let v = phantom();
        assert!(!segment(v.view(), 200, 1300).is_background());
        assert!(segment(v.view(), 200, 200).is_background());
        assert!(segment(v.view(), 1300, 200).is_background());
    }

    #[test]
    fn test_segment_window_excludes_bright() {
        // 上阈值以上的体素不属于前景.
        assert!(segment(phantom().view(), 200, 600).is_background());
    }
}
