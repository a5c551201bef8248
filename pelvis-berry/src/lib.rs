#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 从 3D CT 扫描中分割骨骼, 并沿轴向定位骨盆区域.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 流程
//!
//! 1. 读取扫描 (nifti 文件或 DICOM 切片目录), 按需进行线性 rescale.
//!   实现位于 `pelvis-berry/src/data`.
//! 2. 在 `[150, 510)` 范围内以固定步长搜索下阈值. 每个候选阈值都会生成一份经过
//!   开/闭运算清理的二值掩码, 并统计其连通分量个数. 搜索被分块分发到多个线程.
//!   取分量个数曲线的第一个严格局部极小值作为最优阈值.
//!   实现位于 `pelvis-berry/src/segment`.
//! 3. 从最优掩码中提取体素最多的连通分量, 即骨架.
//! 4. 统计骨架每个水平切片的前景体素个数 (轴向密度), 借助峰/谷分析得到骨盆所在的
//!   切片范围. 实现位于 `pelvis-berry/src/roi`.
//! 5. 按该范围裁剪骨架并保存. 直方图与密度曲线可以额外输出为 PNG 以便调试.
//!
//! # 注意
//!
//! 1. 所有 3D 数据均按照 `(z, h, w)` 组织, 轴向 (相邻切片方向) 为 `Axis(0)`.
//! 2. 管线是 "全有或全无" 的: 任何一步失败都会以 [`BoneError`] 直接返回,
//!   不会尝试局部恢复.

/// 三维索引, 按照 `(z, h, w)` 组织.
pub type Idx3d = (usize, usize, usize);

/// 3D 扫描与掩码的基础数据结构.
mod data;

pub use data::{open_mask, AxialBounds, BinaryMask, BoneScan, RescaleParams, RescaleState};

pub mod config;
pub mod consts;
pub mod diagnostics;
mod error;
pub mod morph_3d;
pub mod pipeline;
pub mod prelude;
pub mod roi;
pub mod segment;

pub use config::BoneConfig;
pub use error::{BoneError, BoneResult, Side};
