//! 调试输出: 强度直方图与轴向密度曲线, 以 PNG 图片保存.
//!
//! 这些输出只是为了方便人工检查. 管线会记录它们的错误, 但不会因此失败.

use crate::consts::plot::*;
use crate::{BoneError, BoneResult};
use image::{Rgb, RgbImage};
use ndarray::ArrayView3;
use std::ops::Range;
use std::path::Path;

/// 图片高度 (像素).
const HEIGHT: u32 = 400;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BAR: Rgb<u8> = Rgb([70, 110, 170]);
const MARK: Rgb<u8> = Rgb([220, 30, 30]);
const LINE: Rgb<u8> = Rgb([30, 30, 30]);

/// 宽度为 1 的整数强度直方图, 覆盖 `[low, high)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    low: i32,
    counts: Vec<u64>,
}

impl Histogram {
    /// 统计 `intensities` 中落在 `[low, high)` 内的体素. 强度向下取整后归入对应的箱.
    pub fn from_intensities<'a, I>(intensities: I, low: i32, high: i32) -> Self
    where
        I: IntoIterator<Item = &'a f32>,
    {
        let len = (high - low).max(0) as usize;
        let mut counts = vec![0u64; len];
        for &v in intensities {
            let bin = v.floor() as i64 - i64::from(low);
            if (0..len as i64).contains(&bin) {
                counts[bin as usize] += 1;
            }
        }
        Self { low, counts }
    }

    /// 第一个箱对应的强度.
    #[inline]
    pub fn low(&self) -> i32 {
        self.low
    }

    /// 每个箱的计数.
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// 强度 `v` 的计数. 范围外返回 0.
    pub fn count(&self, v: i32) -> u64 {
        usize::try_from(v - self.low)
            .ok()
            .and_then(|i| self.counts.get(i).copied())
            .unwrap_or(0)
    }
}

/// 在 `x` 列从底部画一条高度为 `h` 的竖线.
fn draw_bar(img: &mut RgbImage, x: u32, h: u32, color: Rgb<u8>) {
    for y in HEIGHT - h.min(HEIGHT)..HEIGHT {
        img.put_pixel(x, y, color);
    }
}

/// 绘制 `intensities` 在 `[100, 1500)` 内的直方图, 并将 `marked` 中每个阈值附近
/// 的箱标记为红色. 计数超过 40000 的箱被截断.
pub fn plot_histogram<P: AsRef<Path>>(
    intensities: ArrayView3<f32>,
    marked: &[i32],
    path: P,
) -> BoneResult<()> {
    let hist = Histogram::from_intensities(intensities.iter(), HIST_LOW, HIST_HIGH);
    let mut img = RgbImage::from_pixel(hist.counts().len() as u32, HEIGHT, WHITE);

    let half = MARK_HALF_WIDTH as i32;
    for (x, &c) in hist.counts().iter().enumerate() {
        let v = hist.low() + x as i32;
        let color = if marked.iter().any(|&t| (t - half..t + half).contains(&v)) {
            MARK
        } else {
            BAR
        };
        // 非空的箱至少占一个像素.
        let h = (c.min(HIST_COUNT_CAP) * u64::from(HEIGHT)).div_ceil(HIST_COUNT_CAP) as u32;
        draw_bar(&mut img, x as u32, h, color);
    }
    img.save(path)?;
    Ok(())
}

/// 绘制 `values[range]` 的折线图. 纵轴按照该范围内的最大值归一化.
pub fn plot_profile<P: AsRef<Path>>(values: &[f64], range: Range<usize>, path: P) -> BoneResult<()> {
    let range = range.start.min(values.len())..range.end.min(values.len());
    let seg = &values[range];
    if seg.is_empty() {
        return Err(BoneError::InvalidConfig("empty profile range"));
    }

    let max = seg.iter().copied().fold(0.0, f64::max);
    let scale = if max > 0.0 { f64::from(HEIGHT - 1) / max } else { 0.0 };
    let to_y = |v: f64| HEIGHT - 1 - (v.max(0.0) * scale).round() as u32;

    let mut img = RgbImage::from_pixel(seg.len() as u32, HEIGHT, WHITE);
    let mut prev = to_y(seg[0]);
    for (x, &v) in seg.iter().enumerate() {
        let y = to_y(v);
        for yy in prev.min(y)..=prev.max(y) {
            img.put_pixel(x as u32, yy, LINE);
        }
        prev = y;
    }
    img.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_histogram_bins() {
        let v = [99.9, 100.0, 100.7, 101.0, 1499.5, 1500.0, -3.0];
        let h = Histogram::from_intensities(v.iter(), 100, 1500);
        assert_eq!(h.counts().len(), 1400);
        assert_eq!(h.count(100), 2);
        assert_eq!(h.count(101), 1);
        assert_eq!(h.count(1499), 1);
        assert_eq!(h.count(1500), 0);
        assert_eq!(h.count(99), 0);
        assert_eq!(h.counts().iter().sum::<u64>(), 4);
    }

    #[test]
    fn test_plot_histogram() {
        let mut v = Array3::<f32>::zeros((4, 8, 8));
        v.iter_mut().enumerate().for_each(|(i, x)| *x = 150.0 + i as f32);
        let path = std::env::temp_dir().join("pelvis_berry_test_histogram.png");
        plot_histogram(v.view(), &[200], &path).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (1400, HEIGHT));
        // 阈值 200 所在的箱为红色.
        assert_eq!(*img.get_pixel(100, HEIGHT - 1), MARK);
        assert_eq!(*img.get_pixel(60, HEIGHT - 1), BAR);
        // 空箱保持空白.
        assert_eq!(*img.get_pixel(10, HEIGHT - 1), WHITE);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_plot_profile() {
        let values: Vec<f64> = (0..50).map(|i| (i % 10) as f64).collect();
        let path = std::env::temp_dir().join("pelvis_berry_test_density.png");
        plot_profile(&values, 10..40, &path).unwrap();
        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (30, HEIGHT));
        assert_eq!(*img.get_pixel(0, HEIGHT - 1), LINE);
        let _ = std::fs::remove_file(path);

        assert!(plot_profile(&values, 60..70, "unused.png").is_err());
    }
}
