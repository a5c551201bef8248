//! 完整处理管线: 读取扫描, 搜索阈值, 提取骨架, 定位并裁剪骨盆.

use crate::diagnostics::{plot_histogram, plot_profile};
use crate::roi::{axial_density, PelvisLocator};
use crate::segment::{largest_component, ThresholdScanner};
use crate::{AxialBounds, BoneConfig, BoneResult, BoneScan, Idx3d};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// 最优阈值分割结果的文件名.
pub const SEGMENTATION_FILE: &str = "out_seg.nii.gz";

/// 裁剪后的骨架文件名.
pub const SKELETON_FILE: &str = "out_largestCC.nii.gz";

/// 强度直方图文件名.
pub const HISTOGRAM_FILE: &str = "histogram.png";

/// 轴向密度曲线文件名.
pub const DENSITY_FILE: &str = "density.png";

/// 一次成功运行的摘要.
#[derive(Debug, Clone)]
pub struct PelvisReport {
    /// 被选中的下阈值.
    pub threshold: i32,

    /// 连通分量曲线所有极小值对应的下阈值.
    pub dips: Vec<i32>,

    /// 骨盆轴向范围.
    pub bounds: AxialBounds,

    /// 骨架 (裁剪前) 的前景体素个数.
    pub skeleton_voxels: usize,

    /// 裁剪后骨架的形状.
    pub cropped_shape: Idx3d,

    /// 所有成功写出的文件.
    pub outputs: Vec<PathBuf>,
}

/// 骨盆提取管线.
#[derive(Debug, Clone)]
pub struct PelvisPipeline {
    config: BoneConfig,
    diagnostics: bool,
}

impl PelvisPipeline {
    /// 以 `config` 创建管线. 默认输出调试图片.
    pub fn new(config: BoneConfig) -> BoneResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            diagnostics: true,
        })
    }

    /// 是否输出直方图与密度曲线.
    #[inline]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// 管线配置.
    #[inline]
    pub fn config(&self) -> &BoneConfig {
        &self.config
    }

    /// 读取 `input` (nifti 文件或 DICOM 目录) 并处理, 结果写入 `out_dir`.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, out_dir: Q) -> BoneResult<PelvisReport> {
        let mut scan = BoneScan::open(input.as_ref())?;
        debug!("loaded {:?} with shape {:?}", input.as_ref(), scan.shape());
        self.run_scan(&mut scan, out_dir)
    }

    /// 处理已读取的扫描, 结果写入 `out_dir`.
    ///
    /// 扫描会被就地 rescale (至多一次).
    pub fn run_scan<Q: AsRef<Path>>(&self, scan: &mut BoneScan, out_dir: Q) -> BoneResult<PelvisReport> {
        let out_dir = out_dir.as_ref();
        fs::create_dir_all(out_dir)?;
        let mut outputs = vec![];

        if scan.rescale() {
            debug!("rescaled with {:?}", scan.rescale_state().params());
        }
        match scan.nonzero_z_bounds() {
            Some((first, last)) => debug!("nonzero slices: [{first}, {last}]"),
            None => debug!("scan is all zero"),
        }

        let scanned = ThresholdScanner::new(&self.config).scan(scan.data())?;
        let threshold = scanned.threshold();
        let dips = scanned.dip_thresholds();
        info!("optimal threshold {threshold} (dips at {dips:?})");

        let seg_path = out_dir.join(SEGMENTATION_FILE);
        scan.save_mask(&scanned.mask, None, &seg_path)?;
        outputs.push(seg_path);

        if self.diagnostics {
            let path = out_dir.join(HISTOGRAM_FILE);
            match plot_histogram(scan.data(), &dips, &path) {
                Ok(()) => outputs.push(path),
                Err(e) => warn!("failed to plot histogram: {e}"),
            }
        }

        let skeleton = largest_component(&scanned.mask, self.config.connectivity())?;
        let skeleton_voxels = skeleton.count_foreground();
        drop(scanned);

        let bounds = PelvisLocator::new(&self.config).locate(&skeleton)?;
        info!(
            "pelvis slices [{}, {}) of {}",
            bounds.lower(),
            bounds.upper(),
            skeleton.len_z()
        );

        if self.diagnostics {
            let path = out_dir.join(DENSITY_FILE);
            let profile: Vec<f64> = axial_density(&skeleton).into_iter().map(|c| c as f64).collect();
            match plot_profile(&profile, bounds.range(), &path) {
                Ok(()) => outputs.push(path),
                Err(e) => warn!("failed to plot density profile: {e}"),
            }
        }

        let cropped = skeleton.crop_axial(bounds);
        let skeleton_path = out_dir.join(SKELETON_FILE);
        scan.save_mask(&cropped, Some(bounds), &skeleton_path)?;
        outputs.push(skeleton_path);

        Ok(PelvisReport {
            threshold,
            dips,
            bounds,
            skeleton_voxels,
            cropped_shape: cropped.shape(),
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{open_mask, BoneError, RescaleParams};
    use ndarray::{s, Array3};

    fn out_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pelvis_berry_pipeline_{name}"));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_invalid_config() {
        let cfg = BoneConfig::default().with_scan_range(500, 150, 10);
        assert!(matches!(PelvisPipeline::new(cfg), Err(BoneError::InvalidConfig(_))));
    }

    #[test]
    fn test_no_threshold() {
        let mut scan = BoneScan::from_array(Array3::zeros((6, 6, 6)), [1.0; 3], RescaleParams::IDENTITY).unwrap();
        let dir = out_dir("zero");
        let p = PelvisPipeline::new(BoneConfig::default().with_workers(2)).unwrap();
        assert!(matches!(p.run_scan(&mut scan, &dir), Err(BoneError::NoThresholdFound)));
        assert!(!dir.join(SEGMENTATION_FILE).exists());
    }

    /// 立方体太短, 密度曲线没有谷. 但分割结果已经写出.
    #[test]
    fn test_bounds_not_found() {
        let mut v = Array3::<f32>::from_elem((9, 9, 24), -100.0);
        v.slice_mut(s![2..7, 2..7, 2..7]).fill(1000.0);
        v.slice_mut(s![3..6, 3..6, 7..10]).fill(210.0);
        v.slice_mut(s![2..7, 2..7, 10..15]).fill(1000.0);
        v.slice_mut(s![3..6, 3..6, 19..22]).fill(200.0);
        let mut scan = BoneScan::from_array(v, [1.0; 3], RescaleParams::IDENTITY).unwrap();

        let dir = out_dir("short");
        let p = PelvisPipeline::new(BoneConfig::default().with_workers(3)).unwrap();
        assert!(matches!(p.run_scan(&mut scan, &dir), Err(BoneError::BoundsNotFound(_))));
        assert!(dir.join(SEGMENTATION_FILE).exists());
        assert!(dir.join(HISTOGRAM_FILE).exists());
        assert!(!dir.join(SKELETON_FILE).exists());
        let _ = fs::remove_dir_all(dir);
    }

    /// 沿 z 轴的骨柱, 截面边长依次为 8, 4, 10, 4, 8. 边长为 10 的一段通过
    /// 强度 210 的细桥连接一个立方体, 旁边还有一个强度 200 的小立方体,
    /// 使得阈值曲线在 200 处取得极小值.
    fn column_phantom() -> Array3<f32> {
        let mut v = Array3::<f32>::from_elem((40, 14, 32), -100.0);
        let mut square = |z: std::ops::Range<usize>, side: usize| {
            let (h0, w0) = (7 - side / 2, 6 - side / 2);
            v.slice_mut(s![z, h0..h0 + side, w0..w0 + side]).fill(1000.0);
        };
        square(2..8, 8);
        square(8..14, 4);
        square(14..26, 10);
        square(26..32, 4);
        square(32..38, 8);
        v.slice_mut(s![18..21, 6..9, 11..14]).fill(210.0);
        v.slice_mut(s![17..22, 5..10, 14..19]).fill(1000.0);
        v.slice_mut(s![18..21, 6..9, 24..27]).fill(200.0);
        v
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let _ = simple_logger::init_with_level(log::Level::Debug);
        let mut scan = BoneScan::from_array(column_phantom(), [2.0, 0.8, 0.8], RescaleParams::IDENTITY).unwrap();
        let dir = out_dir("column");
        let cfg = BoneConfig::default()
            .with_workers(4)
            .with_roi_calibration(8, 12, 1.5);
        let report = PelvisPipeline::new(cfg).unwrap().run_scan(&mut scan, &dir).unwrap();

        assert_eq!(report.threshold, 200);
        assert_eq!(report.dips, vec![200]);
        let b = report.bounds;
        assert!((8..14).contains(&b.lower()), "{b:?}");
        assert!((26..32).contains(&b.upper()), "{b:?}");
        assert_eq!(report.cropped_shape, (b.len(), 14, 32));
        assert!(report.skeleton_voxels > 0);
        assert_eq!(report.outputs.len(), 4);

        let skeleton = open_mask(dir.join(SKELETON_FILE)).unwrap();
        assert_eq!(skeleton.shape(), report.cropped_shape);
        assert!(skeleton.is_binary());
        assert!(!skeleton.is_background());
        let _ = fs::remove_dir_all(dir);
    }
}
