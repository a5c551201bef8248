//! 管线配置.
//!
//! 所有组件共享同一份只读的 [`BoneConfig`]. 若要修改参数, 应该创建新的实例.

use crate::consts::{roi, scan};
use crate::{BoneError, BoneResult};
use std::num::NonZeroUsize;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 连通性规则.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// 前后上下左右 6-邻接 (钻石型).
    Face6,

    /// 3x3x3 立方体内的 26-邻接.
    Full26,
}

/// 候选阈值个数不能被线程数整除时, 对余数部分的处理方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RemainderPolicy {
    /// 丢弃最后一个完整分块之后的候选.
    Drop,

    /// 前 `len % n` 个分块各多分配一个候选, 保证所有候选都被计算.
    Redistribute,
}

/// 阈值搜索与骨盆定位的全部参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoneConfig {
    /// 候选下阈值起点 (包含).
    scan_low: i32,

    /// 候选下阈值终点 (不包含).
    scan_high: i32,

    /// 候选下阈值步长.
    step: i32,

    /// 前景上阈值.
    intensity_cap: i32,

    /// 工作线程数. `None` 代表使用全部可用核心.
    workers: Option<NonZeroUsize>,

    /// 余数候选处理方式.
    remainder: RemainderPolicy,

    /// 连通分量的邻接规则.
    connectivity: Connectivity,

    /// 是否保留每个候选阈值的掩码.
    retain_masks: bool,

    /// 密度峰最小间距 (切片).
    peak_distance: usize,

    /// 密度谷最小间距 (切片).
    valley_distance: usize,

    /// 谷稳定性精化的密度比.
    stability_ratio: f64,
}

impl Default for BoneConfig {
    fn default() -> Self {
        Self {
            scan_low: scan::LOW,
            scan_high: scan::HIGH,
            step: scan::STEP,
            intensity_cap: scan::INTENSITY_CAP,
            workers: None,
            remainder: RemainderPolicy::Redistribute,
            connectivity: Connectivity::Full26,
            retain_masks: false,
            peak_distance: roi::PEAK_DISTANCE,
            valley_distance: roi::VALLEY_DISTANCE,
            stability_ratio: roi::STABILITY_RATIO,
        }
    }
}

impl BoneConfig {
    /// 设置候选下阈值范围 `[low, high)` 与步长.
    pub fn with_scan_range(mut self, low: i32, high: i32, step: i32) -> Self {
        (self.scan_low, self.scan_high, self.step) = (low, high, step);
        self
    }

    /// 设置前景上阈值.
    pub fn with_intensity_cap(mut self, cap: i32) -> Self {
        self.intensity_cap = cap;
        self
    }

    /// 设置工作线程数. `0` 代表使用全部可用核心.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = NonZeroUsize::new(workers);
        self
    }

    /// 设置余数候选处理方式.
    pub fn with_remainder(mut self, remainder: RemainderPolicy) -> Self {
        self.remainder = remainder;
        self
    }

    /// 设置连通性规则.
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// 设置是否保留所有候选掩码.
    pub fn with_retained_masks(mut self, retain: bool) -> Self {
        self.retain_masks = retain;
        self
    }

    /// 设置骨盆定位的标定参数.
    pub fn with_roi_calibration(
        mut self,
        peak_distance: usize,
        valley_distance: usize,
        stability_ratio: f64,
    ) -> Self {
        self.peak_distance = peak_distance;
        self.valley_distance = valley_distance;
        self.stability_ratio = stability_ratio;
        self
    }

    /// 检查参数是否合法.
    pub fn validate(&self) -> BoneResult<()> {
        if self.step <= 0 {
            return Err(BoneError::InvalidConfig("step must be positive"));
        }
        if self.scan_high <= self.scan_low {
            return Err(BoneError::InvalidConfig("empty threshold range"));
        }
        if self.peak_distance == 0 || self.valley_distance == 0 {
            return Err(BoneError::InvalidConfig("separations must be positive"));
        }
        if !(self.stability_ratio.is_finite() && self.stability_ratio > 0.0) {
            return Err(BoneError::InvalidConfig("stability ratio must be positive"));
        }
        Ok(())
    }

    /// 候选下阈值起点.
    #[inline]
    pub fn scan_low(&self) -> i32 {
        self.scan_low
    }

    /// 候选下阈值终点 (不包含).
    #[inline]
    pub fn scan_high(&self) -> i32 {
        self.scan_high
    }

    /// 候选下阈值步长.
    #[inline]
    pub fn step(&self) -> i32 {
        self.step
    }

    /// 前景上阈值.
    #[inline]
    pub fn intensity_cap(&self) -> i32 {
        self.intensity_cap
    }

    /// 实际使用的工作线程数.
    pub fn workers(&self) -> usize {
        self.workers.map_or_else(available_workers, NonZeroUsize::get)
    }

    /// 余数候选处理方式.
    #[inline]
    pub fn remainder(&self) -> RemainderPolicy {
        self.remainder
    }

    /// 连通性规则.
    #[inline]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// 是否保留所有候选掩码.
    #[inline]
    pub fn retain_masks(&self) -> bool {
        self.retain_masks
    }

    /// 密度峰最小间距.
    #[inline]
    pub fn peak_distance(&self) -> usize {
        self.peak_distance
    }

    /// 密度谷最小间距.
    #[inline]
    pub fn valley_distance(&self) -> usize {
        self.valley_distance
    }

    /// 谷稳定性精化的密度比.
    #[inline]
    pub fn stability_ratio(&self) -> f64 {
        self.stability_ratio
    }

    /// 按顺序生成所有候选下阈值.
    pub fn candidates(&self) -> Vec<i32> {
        debug_assert!(self.step > 0);
        (self.scan_low..self.scan_high)
            .step_by(self.step as usize)
            .collect()
    }
}

/// 获得可并行核心数.
fn available_workers() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}
