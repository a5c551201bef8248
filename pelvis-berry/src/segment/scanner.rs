//! 并行阈值搜索.
//!
//! 候选下阈值被切分为若干连续分块, 每个分块由一个独立线程处理. 线程之间不共享任何
//! 可变状态: 每个线程只读取扫描的不可变视图, 并返回自己的 [`ChunkOutcome`].
//! 所有线程结束后 (同步屏障), 结果按照分块索引 (而非完成顺序) 拼接,
//! 从而保证分量个数曲线的顺序与候选阈值顺序一致.

use super::{count_components, segment};
use crate::config::{Connectivity, RemainderPolicy};
use crate::{BinaryMask, BoneConfig, BoneError, BoneResult};
use itertools::Itertools;
use log::{debug, warn};
use ndarray::ArrayView3;
use std::ops::Range;
use std::thread;

/// 一次阈值搜索的结果.
#[derive(Debug, Clone)]
pub struct ThresholdScan {
    /// 实际被计算的候选下阈值, 按升序排列.
    pub thresholds: Vec<i32>,

    /// 与 `thresholds` 一一对应的连通分量个数.
    pub curve: Vec<usize>,

    /// 曲线所有严格内部局部极小值的下标, 按升序排列.
    pub dips: Vec<usize>,

    /// 被选中的下标, 即 `dips[0]`.
    pub selected: usize,

    /// 被选中的掩码.
    pub mask: BinaryMask,

    /// 所有候选掩码. 仅在配置要求保留时非空.
    pub masks: Vec<BinaryMask>,
}

impl ThresholdScan {
    /// 被选中的下阈值.
    #[inline]
    pub fn threshold(&self) -> i32 {
        self.thresholds[self.selected]
    }

    /// 所有极小值对应的下阈值.
    pub fn dip_thresholds(&self) -> Vec<i32> {
        self.dips.iter().map(|&i| self.thresholds[i]).collect()
    }
}

/// 单个分块的计算结果.
struct ChunkOutcome {
    counts: Vec<usize>,
    masks: Vec<BinaryMask>,
}

/// 将 `len` 个候选切分为至多 `workers` 个连续分块, 返回每个分块的下标范围.
///
/// 分块大小为 `len / workers`. 余数部分按照 `policy` 处理:
/// [`RemainderPolicy::Drop`] 直接丢弃最后一个完整分块之后的候选;
/// [`RemainderPolicy::Redistribute`] 让前 `len % workers` 个分块各多分一个候选,
/// 且分块个数不超过 `len`.
pub fn partition(len: usize, workers: usize, policy: RemainderPolicy) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    match policy {
        RemainderPolicy::Drop => {
            let size = len / workers;
            if size == 0 {
                return vec![];
            }
            (0..workers).map(|i| i * size..(i + 1) * size).collect()
        }
        RemainderPolicy::Redistribute => {
            let n = workers.min(len);
            if n == 0 {
                return vec![];
            }
            let (size, rem) = (len / n, len % n);
            let mut start = 0;
            (0..n)
                .map(|i| {
                    let end = start + size + usize::from(i < rem);
                    let r = start..end;
                    start = end;
                    r
                })
                .collect()
        }
    }
}

/// 找到 `curve` 中所有严格内部局部极小值的下标, 按升序排列.
///
/// 下标 `i` (`1 <= i <= len - 2`) 满足 `curve[i] < curve[i - 1]` 且
/// `curve[i] < curve[i + 1]` 时入选.
pub fn find_dips(curve: &[usize]) -> Vec<usize> {
    curve
        .iter()
        .tuple_windows()
        .enumerate()
        .filter_map(|(i, (l, m, r))| (m < l && m < r).then_some(i + 1))
        .collect()
}

/// 第一个 (下标最小的) 极小值. 不存在时返回 [`BoneError::NoThresholdFound`].
#[inline]
pub fn first_dip(curve: &[usize]) -> BoneResult<usize> {
    find_dips(curve)
        .first()
        .copied()
        .ok_or(BoneError::NoThresholdFound)
}

/// 处理一个分块内的所有候选.
fn run_chunk(
    volume: ArrayView3<f32>,
    lows: &[i32],
    cap: i32,
    connectivity: Connectivity,
    retain: bool,
) -> ChunkOutcome {
    let mut counts = Vec::with_capacity(lows.len());
    let mut masks = Vec::with_capacity(if retain { lows.len() } else { 0 });
    for &low in lows {
        let mask = segment(volume, low, cap);
        counts.push(count_components(&mask, connectivity).count);
        if retain {
            masks.push(mask);
        }
    }
    ChunkOutcome { counts, masks }
}

/// 为每个分块启动一个线程执行 `job(分块索引, 分块范围)`, 等待全部线程结束后按照分块顺序
/// 返回结果.
///
/// 任一线程 panic 时返回 [`BoneError::WorkerPanicked`], 参数为按顺序第一个 panic 的分块索引.
fn fan_out<T, F>(chunks: &[Range<usize>], job: F) -> BoneResult<Vec<T>>
where
    T: Send,
    F: Fn(usize, Range<usize>) -> T + Sync,
{
    let job = &job;
    thread::scope(|s| {
        let handles: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let r = r.clone();
                s.spawn(move || job(i, r))
            })
            .collect();
        debug!("dispatched {} workers, joining", handles.len());

        // 先等待所有线程结束, 再检查结果.
        let joined: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
        joined
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.map_err(|_| BoneError::WorkerPanicked(i)))
            .collect()
    })
}

/// 并行阈值搜索器.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdScanner<'a> {
    config: &'a BoneConfig,
}

impl<'a> ThresholdScanner<'a> {
    /// 以 `config` 为参数创建搜索器.
    #[inline]
    pub fn new(config: &'a BoneConfig) -> Self {
        Self { config }
    }

    /// 在 `volume` 上进行阈值搜索, 选出连通分量曲线第一个极小值对应的掩码.
    ///
    /// # 错误
    ///
    /// 1. 配置不合法时返回 [`BoneError::InvalidConfig`], 不启动任何线程.
    /// 2. 曲线不存在极小值时返回 [`BoneError::NoThresholdFound`].
    /// 3. 任一线程 panic 时返回 [`BoneError::WorkerPanicked`], 其余结果全部丢弃.
    pub fn scan(&self, volume: ArrayView3<f32>) -> BoneResult<ThresholdScan> {
        let cfg = self.config;
        cfg.validate()?;
        let candidates = cfg.candidates();
        let (cap, connectivity, retain) = (cfg.intensity_cap(), cfg.connectivity(), cfg.retain_masks());

        let chunks = partition(candidates.len(), cfg.workers(), cfg.remainder());
        let dispatched = chunks.last().map_or(0, |r| r.end);
        if dispatched < candidates.len() {
            warn!(
                "{} threshold candidates dropped by chunk partition",
                candidates.len() - dispatched
            );
        }
        debug!(
            "partitioned {} candidates into {} chunks",
            candidates.len(),
            chunks.len()
        );

        let outcomes = fan_out(&chunks, |_, r| {
            run_chunk(volume, &candidates[r], cap, connectivity, retain)
        })?;

        let mut curve = Vec::with_capacity(dispatched);
        let mut masks = Vec::with_capacity(if retain { dispatched } else { 0 });
        for ChunkOutcome { counts, masks: m } in outcomes {
            curve.extend(counts);
            masks.extend(m);
        }
        let thresholds = candidates[..dispatched].to_vec();
        debug_assert_eq!(curve.len(), thresholds.len());
        debug!("aggregated component curve: {curve:?}");

        let dips = find_dips(&curve);
        let Some(&selected) = dips.first() else {
            debug!("no dip in component curve");
            return Err(BoneError::NoThresholdFound);
        };
        let mask = match masks.get(selected) {
            Some(m) => m.clone(),
            None => segment(volume, thresholds[selected], cap),
        };
        debug!(
            "selected threshold {} (dip {selected} of {:?})",
            thresholds[selected], dips
        );

        Ok(ThresholdScan {
            thresholds,
            curve,
            dips,
            selected,
            mask,
            masks,
        })
    }
}
