//! 骨盆轴向范围定位.

use super::{axial_density, find_peaks, find_valleys};
use crate::{AxialBounds, BinaryMask, BoneConfig, BoneError, BoneResult, Side};
use log::debug;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

/// 定位结果.
#[derive(Debug, Clone, PartialEq)]
pub struct PelvisRoi {
    /// 骨盆所在的轴向范围.
    pub bounds: AxialBounds,

    /// 最高峰所在切片.
    pub x1: usize,

    /// 次高峰所在切片. 只用于调试输出.
    pub x2: Option<usize>,

    /// 所有谷所在切片, 按照密度降序排列.
    pub valleys: Vec<usize>,
}

/// 根据骨架的轴向密度曲线定位骨盆.
#[derive(Debug, Clone, Copy)]
pub struct PelvisLocator {
    peak_distance: usize,
    valley_distance: usize,
    ratio: f64,
}

impl PelvisLocator {
    /// 以 `config` 中的标定参数创建定位器.
    pub fn new(config: &BoneConfig) -> Self {
        Self {
            peak_distance: config.peak_distance(),
            valley_distance: config.valley_distance(),
            ratio: config.stability_ratio(),
        }
    }

    /// 定位骨架掩码 `mask` 中的骨盆范围.
    #[inline]
    pub fn locate(&self, mask: &BinaryMask) -> BoneResult<AxialBounds> {
        let profile: Vec<f64> = axial_density(mask).into_iter().map(|c| c as f64).collect();
        Ok(self.locate_in_profile(&profile)?.bounds)
    }

    /// 在密度曲线 `profile` 上定位骨盆.
    ///
    /// # 错误
    ///
    /// 曲线没有峰, 或者最高峰某一侧没有谷时, 返回 [`BoneError::BoundsNotFound`].
    pub fn locate_in_profile(&self, profile: &[f64]) -> BoneResult<PelvisRoi> {
        let mut peaks = find_peaks(profile, self.peak_distance);
        peaks.sort_by_key(|&p| Reverse(OrderedFloat(profile[p])));
        let Some(&x1) = peaks.first() else {
            return Err(BoneError::BoundsNotFound(Side::Lower));
        };
        let x2 = peaks.get(1).copied();

        let mut valleys = find_valleys(profile, self.valley_distance);
        valleys.sort_by_key(|&v| Reverse(OrderedFloat(profile[v])));
        debug!("density peaks {peaks:?}, valleys {valleys:?}");

        // 由近及远.
        let mut below: Vec<usize> = valleys.iter().copied().filter(|&v| v < x1).collect();
        below.sort_unstable_by(|a, b| b.cmp(a));
        let mut above: Vec<usize> = valleys.iter().copied().filter(|&v| v > x1).collect();
        above.sort_unstable();

        let mut lower = *below.first().ok_or(BoneError::BoundsNotFound(Side::Lower))?;
        let mut upper = *above.first().ok_or(BoneError::BoundsNotFound(Side::Upper))?;

        for w in above.windows(2) {
            if profile[w[0]] / profile[w[1]] > self.ratio {
                upper = w[1];
            }
        }
        for w in below.windows(2) {
            if profile[w[0]] / profile[w[1]] < self.ratio {
                lower = w[1];
            }
        }
        debug!("pelvis bounds [{lower}, {upper}) around peak {x1}");

        let bounds = AxialBounds::new(lower, upper).ok_or(BoneError::BoundsNotFound(Side::Upper))?;
        Ok(PelvisRoi {
            bounds,
            x1,
            x2,
            valleys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::voxel::FOREGROUND;
    use ndarray::s;

    /// 经过 `knots` 的分段线性曲线, 长度为最后一个节点横坐标加一.
    fn profile(knots: &[(usize, f64)]) -> Vec<f64> {
        let len = knots.last().map_or(0, |k| k.0 + 1);
        let mut out = vec![0.0; len];
        for w in knots.windows(2) {
            let ((x0, y0), (x1, y1)) = (w[0], w[1]);
            for x in x0..=x1 {
                out[x] = y0 + (y1 - y0) * (x - x0) as f64 / (x1 - x0) as f64;
            }
        }
        out
    }

    fn locator() -> PelvisLocator {
        PelvisLocator::new(&BoneConfig::default())
    }

    #[test]
    fn test_locate_deep_valley() {
        let p = profile(&[
            (0, 400.0),
            (100, 200.0),
            (200, 1000.0),
            (300, 50.0),
            (450, 700.0),
            (699, 100.0),
        ]);
        let roi = locator().locate_in_profile(&p).unwrap();
        assert_eq!(roi.x1, 200);
        assert_eq!(roi.x2, Some(450));
        assert_eq!(roi.valleys, vec![100, 300]);
        assert_eq!(roi.bounds, AxialBounds::new(100, 300).unwrap());
        assert!(roi.bounds.lower() < roi.x1 && roi.x1 < roi.bounds.upper());
    }

    #[test]
    fn test_refine_upper() {
        let p = profile(&[
            (0, 500.0),
            (50, 200.0),
            (200, 1000.0),
            (350, 300.0),
            (470, 600.0),
            (600, 100.0),
            (800, 400.0),
        ]);
        let roi = locator().locate_in_profile(&p).unwrap();
        assert_eq!(roi.bounds, AxialBounds::new(50, 600).unwrap());
    }

    #[test]
    fn test_refine_lower() {
        let knots = [
            (0, 400.0),
            (200, 180.0),
            (330, 500.0),
            (450, 200.0),
            (600, 1000.0),
            (800, 100.0),
            (999, 300.0),
        ];
        let roi = locator().locate_in_profile(&profile(&knots)).unwrap();
        assert_eq!(roi.bounds, AxialBounds::new(200, 800).unwrap());

        // 远处的谷足够深时, 下界不再移动.
        let mut knots = knots;
        knots[1].1 = 100.0;
        let roi = locator().locate_in_profile(&profile(&knots)).unwrap();
        assert_eq!(roi.bounds, AxialBounds::new(450, 800).unwrap());
    }

    #[test]
    fn test_bounds_not_found() {
        let p = profile(&[(0, 100.0), (100, 50.0), (300, 1000.0), (499, 0.0)]);
        assert!(matches!(
            locator().locate_in_profile(&p),
            Err(BoneError::BoundsNotFound(Side::Upper))
        ));

        let flat = vec![3.0; 50];
        assert!(matches!(
            locator().locate_in_profile(&flat),
            Err(BoneError::BoundsNotFound(_))
        ));
    }

    /// 掩码太短, 最高峰上方没有谷.
    #[test]
    fn test_locate_mask() {
        let mut m = BinaryMask::zeros((20, 4, 4));
        m.data_mut().slice_mut(s![5..15, .., ..]).fill(FOREGROUND);
        m.data_mut().slice_mut(s![10, 0, ..]).fill(0);
        assert!(matches!(locator().locate(&m), Err(BoneError::BoundsNotFound(_))));
    }
}
