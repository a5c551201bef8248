//! 骨骼分割: 阈值分割, 连通分量统计, 以及并行的最优阈值搜索.

mod components;
mod scanner;
mod threshold;

pub use components::{count_components, largest_component};
pub use scanner::{find_dips, first_dip, partition, ThresholdScan, ThresholdScanner};
pub use threshold::segment;
