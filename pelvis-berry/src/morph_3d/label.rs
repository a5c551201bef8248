//! 3D 连通分量标记.

use super::{cube_neighbours, diamond_neighbours};
use crate::config::Connectivity;
use crate::consts::voxel::is_foreground;
use crate::{BinaryMask, Idx3d};
use ndarray::Array3;
use std::collections::VecDeque;

/// 标记结果. 背景标签为 0, 前景分量标签为 `1..=count`.
#[derive(Debug, Clone)]
pub struct Labeled {
    /// 与掩码同形状的标签数组.
    pub labels: Array3<u32>,

    /// 分量个数.
    pub count: usize,
}

/// 按照 `connectivity` 规则标记 `mask` 的所有前景连通分量.
///
/// 两个体素 `p1` 和 `p2` 属于同一个分量, 当且仅当存在一条从 `p1` 到 `p2`
/// 的相邻路径, 且路径上的所有体素都是前景. 分量按照其第一个体素的行优先顺序编号.
pub fn label(mask: &BinaryMask, connectivity: Connectivity) -> Labeled {
    let data = mask.data();
    let shape = data.dim();
    let mut labels = Array3::<u32>::zeros(shape);
    let mut count = 0u32;
    let mut bfs_q: VecDeque<Idx3d> = VecDeque::with_capacity(64);

    for (pos, &v) in data.indexed_iter() {
        if !is_foreground(v) || labels[pos] != 0 {
            continue;
        }
        count += 1;
        labels[pos] = count;
        bfs_q.push_back(pos);

        while let Some(cur) = bfs_q.pop_front() {
            // 入队时即打标签, 保证每个体素最多入队一次.
            let mut visit = |p: Idx3d| {
                if is_foreground(data[p]) && labels[p] == 0 {
                    labels[p] = count;
                    bfs_q.push_back(p);
                }
            };
            match connectivity {
                Connectivity::Face6 => diamond_neighbours(cur, shape).for_each(&mut visit),
                Connectivity::Full26 => cube_neighbours(cur, shape).for_each(&mut visit),
            }
        }
    }

    Labeled {
        labels,
        count: count as usize,
    }
}

/// 统计每个标签的体素个数. 返回值长度为 `count + 1`, 下标 0 为背景.
pub fn component_sizes(labeled: &Labeled) -> Vec<usize> {
    let mut sizes = vec![0usize; labeled.count + 1];
    for &l in labeled.labels.iter() {
        sizes[l as usize] += 1;
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::voxel::FOREGROUND;
    use ndarray::s;

    #[test]
    fn test_label_empty() {
        let l = label(&BinaryMask::zeros((3, 3, 3)), Connectivity::Full26);
        assert_eq!(l.count, 0);
        assert_eq!(component_sizes(&l), vec![27]);
    }

    #[test]
    fn test_label_two_blocks() {
        let mut m = BinaryMask::zeros((4, 6, 10));
        m.data_mut().slice_mut(s![0..2, 0..2, 0..2]).fill(FOREGROUND);
        m.data_mut().slice_mut(s![1..4, 2..6, 5..10]).fill(FOREGROUND);
        let l = label(&m, Connectivity::Face6);
        assert_eq!(l.count, 2);
        assert_eq!(l.labels[(0, 0, 0)], 1);
        assert_eq!(l.labels[(3, 5, 9)], 2);
        assert_eq!(component_sizes(&l)[1..], [8, 60]);
    }

    /// 仅对角相邻的体素: 26-邻接下连通, 6-邻接下不连通.
    #[test]
    fn test_label_connectivity() {
        let mut m = BinaryMask::zeros((3, 3, 3));
        m.data_mut()[(0, 0, 0)] = FOREGROUND;
        m.data_mut()[(1, 1, 1)] = FOREGROUND;
        m.data_mut()[(2, 2, 2)] = FOREGROUND;
        assert_eq!(label(&m, Connectivity::Face6).count, 3);
        assert_eq!(label(&m, Connectivity::Full26).count, 1);
    }

    /// U 形结构只有一个分量.
    #[test]
    fn test_label_u_shape() {
        let mut m = BinaryMask::zeros((1, 5, 5));
        m.data_mut().slice_mut(s![0, .., 0]).fill(FOREGROUND);
        m.data_mut().slice_mut(s![0, .., 4]).fill(FOREGROUND);
        m.data_mut().slice_mut(s![0, 4, ..]).fill(FOREGROUND);
        let l = label(&m, Connectivity::Face6);
        assert_eq!(l.count, 1);
        assert_eq!(component_sizes(&l)[1], 13);
    }
}
