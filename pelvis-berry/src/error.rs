//! 运行时错误.

use std::fmt;
use thiserror::Error;

/// 相对于主密度峰的方向.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Side {
    /// 切片索引更小的一侧.
    Lower,

    /// 切片索引更大的一侧.
    Upper,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Lower => f.write_str("lower"),
            Side::Upper => f.write_str("upper"),
        }
    }
}

/// 分割 / 定位管线的运行时错误.
#[derive(Debug, Error)]
pub enum BoneError {
    /// 连通分量曲线不存在内部严格局部极小值, 无法选出阈值.
    #[error("component-count curve has no interior local minimum")]
    NoThresholdFound,

    /// 在全背景掩码上提取最大连通分量.
    #[error("mask contains no foreground voxel")]
    EmptyMask,

    /// 主密度峰的某一侧不存在谷候选.
    #[error("no valley candidate on the {0} side of the primary density peak")]
    BoundsNotFound(Side),

    /// 某个阈值搜索线程 panic. 参数为其负责的分块索引.
    #[error("threshold worker for chunk {0} panicked")]
    WorkerPanicked(usize),

    /// 配置参数不合法.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// 扫描在某个维度上为空.
    #[error("volume is empty along at least one axis")]
    EmptyVolume,

    /// 某个维度的体素个数超出 nifti header 的表示范围.
    #[error("dimension of {0} voxels does not fit in a nifti header")]
    DimensionTooLarge(usize),

    /// DICOM 切片尺寸不一致.
    #[error("DICOM slices have inconsistent dimensions")]
    InconsistentSlices,

    /// nifti 读写错误.
    #[error("nifti error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// DICOM 读取或解码错误.
    #[error("DICOM error: {0}")]
    Dicom(String),

    /// 文件系统错误.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 诊断图像写入错误.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// 管线运行时结果.
pub type BoneResult<T> = Result<T, BoneError>;
