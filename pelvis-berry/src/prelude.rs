//! 🦴欢迎光临🦴
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::{open_mask, AxialBounds, BinaryMask, BoneScan, RescaleParams, RescaleState};
pub use crate::{BoneError, BoneResult, Side};

pub use crate::config::{BoneConfig, Connectivity, RemainderPolicy};
pub use crate::consts::voxel::{BACKGROUND, FOREGROUND};

pub use crate::pipeline::{PelvisPipeline, PelvisReport};
pub use crate::roi::{axial_density, PelvisLocator, PelvisRoi};
pub use crate::segment::{largest_component, segment, ThresholdScan, ThresholdScanner};
