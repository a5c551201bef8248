//! 体素值线性 rescale.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 线性 rescale 参数. `value = raw * slope + intercept`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RescaleParams {
    /// 斜率.
    pub slope: f32,

    /// 截距.
    pub intercept: f32,
}

impl Default for RescaleParams {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RescaleParams {
    /// 恒等变换.
    pub const IDENTITY: Self = Self {
        slope: 1.0,
        intercept: 0.0,
    };

    /// 构建参数. 按照 nifti 惯例, `slope` 为 0 或非有限值时视为不缩放.
    pub fn new(slope: f32, intercept: f32) -> Self {
        if slope == 0.0 || !slope.is_finite() || !intercept.is_finite() {
            Self::IDENTITY
        } else {
            Self { slope, intercept }
        }
    }

    /// 是否为恒等变换?
    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// 对单个原始值应用变换.
    #[inline]
    pub fn apply(&self, raw: f32) -> f32 {
        raw * self.slope + self.intercept
    }
}

/// rescale 的生命周期. 参数只读取一次, 最多应用一次.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RescaleState {
    /// 数据仍为原始值, 等待应用参数.
    Pending(RescaleParams),

    /// 参数已被应用 (由本库或由文件读取器).
    Applied(RescaleParams),
}

impl RescaleState {
    /// 对应的参数.
    #[inline]
    pub fn params(&self) -> RescaleParams {
        match *self {
            RescaleState::Pending(p) | RescaleState::Applied(p) => p,
        }
    }

    /// 是否已应用?
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, RescaleState::Applied(_))
    }
}
