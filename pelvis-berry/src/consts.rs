//! 通用常量.

/// 掩码体素值.
pub mod voxel {
    /// 掩码中背景的体素值.
    pub const BACKGROUND: u16 = 0;

    /// 掩码中前景的体素值. 它只是一个哨兵值, 并不代表任何测量值.
    pub const FOREGROUND: u16 = u16::MAX;

    /// 体素是否是前景?
    ///
    /// 任何非零值均视为前景, 这样从磁盘重新读入的
    /// (可能被缩放过的) 掩码也能被正确处理.
    #[inline]
    pub const fn is_foreground(v: u16) -> bool {
        v != BACKGROUND
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(v: u16) -> bool {
        v == BACKGROUND
    }
}

/// 阈值搜索的默认参数.
pub mod scan {
    /// 候选下阈值的起点 (包含).
    pub const LOW: i32 = 150;

    /// 候选下阈值的终点 (不包含).
    pub const HIGH: i32 = 510;

    /// 相邻候选下阈值的间隔.
    pub const STEP: i32 = 10;

    /// 骨骼前景的上阈值.
    pub const INTENSITY_CAP: i32 = 1300;
}

/// 骨盆 ROI 定位的默认标定参数.
pub mod roi {
    /// 相邻密度峰之间的最小切片间距.
    pub const PEAK_DISTANCE: usize = 150;

    /// 相邻密度谷之间的最小切片间距.
    pub const VALLEY_DISTANCE: usize = 200;

    /// 谷稳定性精化时使用的相邻候选密度比.
    pub const STABILITY_RATIO: f64 = 1.5;
}

/// 直方图诊断图的默认参数.
pub mod plot {
    /// 直方图横轴下限.
    pub const HIST_LOW: i32 = 100;

    /// 直方图横轴上限 (不包含).
    pub const HIST_HIGH: i32 = 1500;

    /// 直方图纵轴截断值.
    pub const HIST_COUNT_CAP: u64 = 40_000;

    /// 标记阈值时向两侧各延伸的 bin 个数.
    pub const MARK_HALF_WIDTH: usize = 3;
}
