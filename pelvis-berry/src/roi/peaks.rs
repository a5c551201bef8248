//! 一维曲线的峰值检测.

use ordered_float::OrderedFloat;

/// 找到 `values` 中所有的局部极大值, 按升序返回下标.
///
/// 平台形的极大值取平台中点 (向下取整). 首尾两个样本永远不是峰.
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut peaks = vec![];
    if n < 3 {
        return peaks;
    }

    let last = n - 1;
    let mut i = 1;
    while i < last {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < last && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// 找到 `values` 中所有的峰, 且任意两个峰的间距不小于 `distance`.
///
/// 从最高的峰开始依次处理: 仍然保留的峰会抑制所有与之距离小于 `distance` 的其它峰.
/// 高度相同时下标靠后者优先. 返回值按下标升序排列.
pub fn find_peaks(values: &[f64], distance: usize) -> Vec<usize> {
    let peaks = local_maxima(values);
    if distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by_key(|&k| OrderedFloat(values[peaks[k]]));

    let mut keep = vec![true; peaks.len()];
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in j + 1..peaks.len() {
            if peaks[k] - peaks[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

/// 找到 `values` 中所有的谷 (即 `-values` 的峰), 间距不小于 `distance`.
#[inline]
pub fn find_valleys(values: &[f64], distance: usize) -> Vec<usize> {
    let negated: Vec<f64> = values.iter().map(|v| -v).collect();
    find_peaks(&negated, distance)
}
