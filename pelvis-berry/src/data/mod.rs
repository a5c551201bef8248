use std::ops::Index;
use std::path::Path;

use log::debug;
use ndarray::{Array3, ArrayView3, Axis};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::{BoneError, BoneResult, Idx3d};

mod dicom;
mod mask;
mod rescale;

pub use mask::{AxialBounds, BinaryMask};
pub use rescale::{RescaleParams, RescaleState};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 3D CT 扫描, 包括方向信息 (nifti header), 体素值和 rescale 状态.
/// 体素值以 `f32` 保存, 按照 `(z, h, w)` 组织.
///
/// header 同时承担 "方向变换" 的角色: 保存结果时以它为参考 header,
/// 从而保留原扫描的 affine.
#[derive(Debug, Clone)]
pub struct BoneScan {
    header: BoxedHeader,
    data: Array3<f32>,
    rescale: RescaleState,
}

impl Index<Idx3d> for BoneScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl BoneScan {
    /// 打开 3D 扫描. `path` 为目录时按照 DICOM 切片目录读取, 否则按照 nifti 文件读取.
    pub fn open<P: AsRef<Path>>(path: P) -> BoneResult<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::open_dicom_dir(path)
        } else {
            Self::open_nifti(path)
        }
    }

    /// 打开 nifti 格式的 3D 扫描.
    ///
    /// nifti 读取器在转换数据时已经应用了 header 中的 `scl_slope` / `scl_inter`,
    /// 因此返回值的 rescale 状态为 [`RescaleState::Applied`].
    pub fn open_nifti<P: AsRef<Path>>(path: P) -> BoneResult<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());
        let params = RescaleParams::new(header.scl_slope, header.scl_inter);

        // [W, H, z] -> [z, H, W].
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        let data = Array3::<f32>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
            .map_err(|_| BoneError::EmptyVolume)?;

        Self::checked(header, data, RescaleState::Applied(params))
    }

    /// 打开 DICOM 单切片文件目录, 按照病人坐标 (或实例编号) 顺序堆叠.
    ///
    /// 返回值尚未 rescale, 需要调用 [`Self::rescale`].
    pub fn open_dicom_dir<P: AsRef<Path>>(dir: P) -> BoneResult<Self> {
        let stack = dicom::stack_directory(dir.as_ref())?;
        debug!(
            "stacked {} DICOM slices, rescale = {:?}",
            stack.data.len_of(Axis(0)),
            stack.rescale
        );
        Self::from_array_with_affine(stack.data, stack.srows, stack.rescale)
    }

    /// 根据裸数据直接创建扫描, 数据尚未 rescale.
    ///
    /// `data` 按照 `(z, h, w)` 组织, `pix_dim` 按照 `[z, h, w]` 给出体素分辨率 (毫米).
    pub fn from_array(data: Array3<f32>, pix_dim: [f32; 3], rescale: RescaleParams) -> BoneResult<Self> {
        let [pz, ph, pw] = pix_dim;
        let srows = [
            [pw, 0.0, 0.0, 0.0],
            [0.0, ph, 0.0, 0.0],
            [0.0, 0.0, pz, 0.0],
        ];
        Self::from_array_with_affine(data, srows, rescale)
    }

    /// 根据裸数据与 sform 创建扫描, 数据尚未 rescale.
    ///
    /// `srows` 为 affine 的前三行, 作用于 `(w, h, z, 1)`. 体素分辨率取各列的模长.
    ///
    /// # 错误
    ///
    /// 1. 任一维度为空时返回 [`BoneError::EmptyVolume`].
    /// 2. 任一维度超出 nifti header 的表示范围 (`u16`) 时返回 [`BoneError::DimensionTooLarge`].
    pub fn from_array_with_affine(
        data: Array3<f32>,
        srows: [[f32; 4]; 3],
        rescale: RescaleParams,
    ) -> BoneResult<Self> {
        let (z, h, w) = data.dim();
        let dim = |n: usize| u16::try_from(n).map_err(|_| BoneError::DimensionTooLarge(n));
        let norm = |col: usize| srows.iter().map(|r| r[col] * r[col]).sum::<f32>().sqrt();

        let mut header = Box::<NiftiHeader>::default();
        header.dim = [3, dim(w)?, dim(h)?, dim(z)?, 1, 1, 1, 1];
        header.pixdim = [1.0, norm(0), norm(1), norm(2), 1.0, 1.0, 1.0, 1.0];
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        header.sform_code = 1;
        let [x, y, z] = srows;
        header.srow_x = x;
        header.srow_y = y;
        header.srow_z = z;

        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        Self::checked(header, data, RescaleState::Pending(rescale))
    }

    /// 保证数据在所有维度上非空.
    fn checked(header: BoxedHeader, data: Array3<f32>, rescale: RescaleState) -> BoneResult<Self> {
        if data.shape().iter().any(|&n| n == 0) {
            return Err(BoneError::EmptyVolume);
        }
        Ok(Self {
            header,
            data,
            rescale,
        })
    }

    /// 获取 header (方向信息).
    #[inline]
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// 数据形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 获取单个体素分辨率 `[z, h, w]`, 以毫米为单位.
    #[inline]
    pub fn pix_dim(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header.pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 体素到世界坐标的 4x4 affine 矩阵, 作用于 `(w, h, z, 1)`.
    ///
    /// 存在 sform 时直接使用; 否则退化为仅由体素分辨率构成的对角阵.
    pub fn affine(&self) -> [[f32; 4]; 4] {
        let h = &self.header;
        if h.sform_code > 0 {
            [h.srow_x, h.srow_y, h.srow_z, [0.0, 0.0, 0.0, 1.0]]
        } else {
            let [_, pw, ph, pz, ..] = h.pixdim;
            [
                [pw, 0.0, 0.0, 0.0],
                [0.0, ph, 0.0, 0.0],
                [0.0, 0.0, pz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ]
        }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// rescale 状态.
    #[inline]
    pub fn rescale_state(&self) -> RescaleState {
        self.rescale
    }

    /// 应用 rescale 参数. 参数最多应用一次: 若已经应用过则什么也不做并返回 `false`.
    pub fn rescale(&mut self) -> bool {
        let RescaleState::Pending(params) = self.rescale else {
            return false;
        };
        if !params.is_identity() {
            self.data.mapv_inplace(|raw| params.apply(raw));
        }
        self.rescale = RescaleState::Applied(params);
        true
    }

    /// 第一个和最后一个包含非零体素的水平切片索引. 全零扫描返回 `None`.
    pub fn nonzero_z_bounds(&self) -> Option<(usize, usize)> {
        let mut it = self
            .data
            .axis_iter(Axis(0))
            .enumerate()
            .filter_map(|(z, sli)| sli.iter().any(|&v| v != 0.0).then_some(z));
        let first = it.next()?;
        Some((first, it.last().unwrap_or(first)))
    }

    /// 以本扫描的 header 为参考, 将掩码保存为 nifti 文件.
    ///
    /// 若 `crop` 给出了轴向范围, 则 `mask` 被视为从该范围裁剪所得,
    /// header 中 sform 的平移量会相应移动到 `crop.lower()` 切片.
    /// 缩放字段被重置为恒等变换, 以保证前景哨兵值被原样写入.
    pub fn save_mask<P: AsRef<Path>>(
        &self,
        mask: &BinaryMask,
        crop: Option<AxialBounds>,
        path: P,
    ) -> BoneResult<()> {
        let mut header = (*self.header).clone();
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        if let Some(b) = crop.filter(|_| header.sform_code > 0) {
            let lower = b.lower() as f32;
            for row in [&mut header.srow_x, &mut header.srow_y, &mut header.srow_z] {
                row[3] += row[2] * lower;
            }
        }

        // [z, H, W] -> [W, H, z].
        let data = mask.data().permuted_axes([2, 1, 0]);
        WriterOptions::new(path.as_ref())
            .reference_header(&header)
            .write_nifti(&data)?;
        Ok(())
    }
}

/// 读取 nifti 格式的掩码文件.
pub fn open_mask<P: AsRef<Path>>(path: P) -> BoneResult<BinaryMask> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let shape = get_shape_from_header(obj.header());

    // [W, H, z] -> [z, H, W]
    let data = obj
        .into_volume()
        .into_ndarray::<u16>()?
        .permuted_axes([2, 1, 0].as_slice());
    debug_assert!(data.is_standard_layout());

    let data = Array3::<u16>::from_shape_vec(shape, data.into_raw_vec())
        .map_err(|_| BoneError::EmptyVolume)?;
    Ok(BinaryMask::new(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::voxel::FOREGROUND;
    use ndarray::s;
    use std::collections::BTreeSet;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("pelvis-berry-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_rescale_applied_once() {
        let data = Array3::from_elem((2, 3, 4), 1000.0f32);
        let mut scan =
            BoneScan::from_array(data, [1.0, 0.7, 0.7], RescaleParams::new(1.0, -1024.0)).unwrap();
        assert!(scan.rescale());
        assert_eq!(scan[(0, 0, 0)], -24.0);

        // 第二次调用不会再次生效.
        assert!(!scan.rescale());
        assert_eq!(scan[(1, 2, 3)], -24.0);
        assert!(scan.rescale_state().is_applied());
    }

    #[test]
    fn test_empty_volume() {
        let data = Array3::<f32>::zeros((0, 3, 4));
        assert!(matches!(
            BoneScan::from_array(data, [1.0; 3], RescaleParams::IDENTITY),
            Err(BoneError::EmptyVolume)
        ));
    }

    #[test]
    fn test_nonzero_z_bounds() {
        let mut data = Array3::<f32>::zeros((8, 3, 3));
        let scan = BoneScan::from_array(data.clone(), [1.0; 3], RescaleParams::IDENTITY).unwrap();
        assert_eq!(scan.nonzero_z_bounds(), None);

        data[(2, 1, 1)] = 5.0;
        data[(6, 0, 2)] = -3.0;
        let scan = BoneScan::from_array(data, [1.0; 3], RescaleParams::IDENTITY).unwrap();
        assert_eq!(scan.nonzero_z_bounds(), Some((2, 6)));
    }

    #[test]
    fn test_affine_from_pix_dim() {
        let scan =
            BoneScan::from_array(Array3::zeros((2, 2, 2)), [2.5, 0.5, 0.75], RescaleParams::IDENTITY)
                .unwrap();
        let a = scan.affine();
        assert_eq!(a[0][0], 0.75);
        assert_eq!(a[1][1], 0.5);
        assert_eq!(a[2][2], 2.5);
        assert_eq!(scan.pix_dim(), [2.5, 0.5, 0.75]);
    }

    /// 旋转并平移的 sform 原样保留, 体素分辨率取列模长.
    #[test]
    fn test_affine_preserved() {
        let srows = [
            [0.0, -0.5, 0.0, 120.0],
            [0.75, 0.0, 0.0, -40.0],
            [0.0, 0.0, 2.5, 7.5],
        ];
        let scan =
            BoneScan::from_array_with_affine(Array3::zeros((2, 3, 4)), srows, RescaleParams::IDENTITY)
                .unwrap();
        let a = scan.affine();
        assert_eq!(a[..3], srows);
        assert_eq!(a[3], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(scan.pix_dim(), [2.5, 0.5, 0.75]);
        assert_eq!(scan.header().dim[1..4], [4, 3, 2]);
    }

    #[test]
    fn test_dimension_too_large() {
        let data = Array3::<f32>::zeros((1, 1, 70_000));
        assert!(matches!(
            BoneScan::from_array(data, [1.0; 3], RescaleParams::IDENTITY),
            Err(BoneError::DimensionTooLarge(70_000))
        ));
    }

    /// 保存后重新读取, 前景体素集合不变.
    #[test]
    fn test_mask_round_trip() {
        let scan =
            BoneScan::from_array(Array3::zeros((5, 4, 6)), [1.0; 3], RescaleParams::IDENTITY)
                .unwrap();
        let mut mask = BinaryMask::zeros((5, 4, 6));
        mask.data_mut().slice_mut(s![1..3, 1..3, 2..5]).fill(FOREGROUND);
        mask.data_mut()[(4, 3, 0)] = FOREGROUND;

        let path = temp_path("round-trip.nii.gz");
        scan.save_mask(&mask, None, &path).unwrap();
        let loaded = open_mask(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let nonzero = |m: &BinaryMask| -> BTreeSet<Idx3d> {
            m.data()
                .indexed_iter()
                .filter_map(|(p, &v)| (v != 0).then_some(p))
                .collect()
        };
        assert_eq!(loaded.shape(), mask.shape());
        assert_eq!(nonzero(&loaded), nonzero(&mask));
    }
}
