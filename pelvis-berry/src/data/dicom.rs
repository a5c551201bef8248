//! 将 DICOM 单切片文件目录堆叠为 3D 扫描.

use super::RescaleParams;
use crate::{BoneError, BoneResult};
use dicom::core::Tag;
use dicom::object::{open_file, FileDicomObject, InMemDicomObject};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use dicom_dictionary_std::tags;
use log::warn;
use ndarray::{Array2, Array3};
use std::fs;
use std::path::{Path, PathBuf};

type DicomFile = FileDicomObject<InMemDicomObject>;

type Vec3 = [f64; 3];

/// 堆叠结果, 按照 `(z, h, w)` 组织.
pub(super) struct DicomStack {
    pub data: Array3<f32>,

    /// nifti sform 的三行 (RAS 坐标系), 作用于 `(w, h, z, 1)`.
    pub srows: [[f32; 4]; 3],

    /// 尚未应用的 rescale 参数. 各切片参数不一致时已经逐切片应用, 此处为恒等变换.
    pub rescale: RescaleParams,
}

/// 收集 `dir` 下所有扩展名为 `dcm` 的文件, 按照文件名排序.
fn dcm_paths(dir: &Path) -> BoneResult<Vec<PathBuf>> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
        })
        .collect();
    if paths.is_empty() {
        return Err(BoneError::Dicom(format!(
            "no .dcm file under `{}`",
            dir.display()
        )));
    }
    paths.sort();
    Ok(paths)
}

fn float_tag(obj: &DicomFile, tag: Tag) -> Option<f64> {
    obj.element(tag).ok().and_then(|e| e.to_float64().ok())
}

fn multi_float_tag(obj: &DicomFile, tag: Tag) -> Option<Vec<f64>> {
    obj.element(tag).ok().and_then(|e| e.to_multi_float64().ok())
}

fn position(obj: &DicomFile) -> Option<Vec3> {
    multi_float_tag(obj, tags::IMAGE_POSITION_PATIENT).and_then(|v| (v.len() >= 3).then(|| [v[0], v[1], v[2]]))
}

/// 行方向与列方向余弦. 缺失时为轴对齐方向.
fn orientation(obj: &DicomFile) -> (Vec3, Vec3) {
    multi_float_tag(obj, tags::IMAGE_ORIENTATION_PATIENT)
        .filter(|v| v.len() >= 6)
        .map_or(([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), |v| {
            ([v[0], v[1], v[2]], [v[3], v[4], v[5]])
        })
}

fn rescale_of(obj: &DicomFile) -> RescaleParams {
    RescaleParams::new(
        float_tag(obj, tags::RESCALE_SLOPE).unwrap_or(1.0) as f32,
        float_tag(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0) as f32,
    )
}

#[inline]
fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot(a: Vec3, b: Vec3) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// 按照切片顺序重排 `objects`.
///
/// 所有切片都有病人坐标时, 按照其在切片法向上的投影排序; 否则所有切片都有实例编号时,
/// 按照实例编号排序; 否则保持文件名顺序.
fn sort_slices(objects: Vec<DicomFile>, normal: Vec3) -> Vec<DicomFile> {
    let by_position = || {
        objects
            .iter()
            .map(|o| position(o).map(|p| dot(p, normal)))
            .collect::<Option<Vec<_>>>()
    };
    let by_instance = || {
        objects
            .iter()
            .map(|o| {
                o.element(tags::INSTANCE_NUMBER)
                    .ok()
                    .and_then(|e| e.to_int::<i32>().ok())
                    .map(f64::from)
            })
            .collect::<Option<Vec<_>>>()
    };
    let Some(keys) = by_position().or_else(by_instance) else {
        warn!("DICOM slices carry neither position nor instance number, using file name order");
        return objects;
    };

    let mut keyed: Vec<_> = keys.into_iter().zip(objects).collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, o)| o).collect()
}

/// 解码单张切片为 `(h, w)` 原始值数组. 不应用 modality LUT.
fn decode_slice(obj: &DicomFile) -> BoneResult<Array2<f32>> {
    let pixel_data = obj
        .decode_pixel_data()
        .map_err(|e| BoneError::Dicom(e.to_string()))?;
    let (h, w) = (pixel_data.rows() as usize, pixel_data.columns() as usize);
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let mut raw = pixel_data
        .to_vec_with_options::<f32>(&options)
        .map_err(|e| BoneError::Dicom(e.to_string()))?;
    if raw.len() < h * w {
        return Err(BoneError::InconsistentSlices);
    }
    // 多帧文件只取第一帧.
    raw.truncate(h * w);
    Array2::from_shape_vec((h, w), raw).map_err(|_| BoneError::InconsistentSlices)
}

/// 由第一张切片的病人坐标, 方向余弦, 像素间距与相邻切片位移构建 sform.
///
/// DICOM 使用 LPS 坐标系, nifti 使用 RAS 坐标系, 因此前两行取反.
fn sform(objects: &[DicomFile], row: Vec3, col: Vec3, normal: Vec3) -> [[f32; 4]; 3] {
    let first = &objects[0];
    let [ph, pw] = multi_float_tag(first, tags::PIXEL_SPACING)
        .filter(|v| v.len() >= 2)
        .map_or([1.0, 1.0], |v| [v[0], v[1]]);
    let origin = position(first).unwrap_or([0.0; 3]);
    let step = match objects.get(1).and_then(position) {
        Some(next) if next != origin => [next[0] - origin[0], next[1] - origin[1], next[2] - origin[2]],
        _ => {
            let t = float_tag(first, tags::SLICE_THICKNESS).unwrap_or(1.0);
            normal.map(|n| n * t)
        }
    };

    let mut srows = [[0.0f32; 4]; 3];
    for (axis, srow) in srows.iter_mut().enumerate() {
        let sign = if axis < 2 { -1.0 } else { 1.0 };
        *srow = [
            (sign * row[axis] * pw) as f32,
            (sign * col[axis] * ph) as f32,
            (sign * step[axis]) as f32,
            (sign * origin[axis]) as f32,
        ];
    }
    srows
}

/// 读取并堆叠 `dir` 下的所有 DICOM 切片.
pub(super) fn stack_directory(dir: &Path) -> BoneResult<DicomStack> {
    let objects = dcm_paths(dir)?
        .iter()
        .map(|p| open_file(p).map_err(|e| BoneError::Dicom(e.to_string())))
        .collect::<BoneResult<Vec<DicomFile>>>()?;

    let (row, col) = orientation(&objects[0]);
    let normal = cross(row, col);
    let objects = sort_slices(objects, normal);

    let slices = objects
        .iter()
        .map(decode_slice)
        .collect::<BoneResult<Vec<_>>>()?;
    let (h, w) = slices[0].dim();
    if slices.iter().any(|s| s.dim() != (h, w)) {
        return Err(BoneError::InconsistentSlices);
    }

    let params: Vec<_> = objects.iter().map(rescale_of).collect();
    let uniform = params.iter().all(|p| *p == params[0]);
    if !uniform {
        warn!("rescale parameters differ between DICOM slices, applying them per slice");
    }

    let mut data = Array3::<f32>::zeros((slices.len(), h, w));
    for ((mut dst, src), p) in data.outer_iter_mut().zip(slices.iter()).zip(&params) {
        if uniform {
            dst.assign(src);
        } else {
            dst.zip_mut_with(src, |d, &s| *d = p.apply(s));
        }
    }

    Ok(DicomStack {
        data,
        srows: sform(&objects, row, col, normal),
        rescale: if uniform { params[0] } else { RescaleParams::IDENTITY },
    })
}
