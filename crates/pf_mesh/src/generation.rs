// crates/pf_mesh/src/generation.rs

//! 测试 / 演示用小网格生成器
//!
//! 提供一维链式网格及其分区版本。单元为单位截面的长方体，
//! x 方向排列，足以覆盖扩散 / 对流离散与分区耦合的全部路径。

use crate::connectivity::{FvMesh, MeshBuilder};
use crate::patch::{BoundaryFaceSpec, PatchSpec};
use glam::DVec3;
use pf_foundation::{PfResult, Scalar};

/// 一维链式网格
///
/// `n` 个单元沿 x 方向排列，单元宽 `dx`，截面积 1。
/// 两个常规边界 patch：`left`（x=0 处）与 `right`（x=n·dx 处）。
///
/// # Panics
/// - `n == 0` 或 `dx <= 0`
pub fn line_mesh(n: usize, dx: Scalar) -> PfResult<FvMesh> {
    assert!(n > 0, "单元数必须大于 0");
    assert!(dx > 0.0, "单元宽度必须为正");

    let centres: Vec<DVec3> = (0..n)
        .map(|i| DVec3::new((i as Scalar + 0.5) * dx, 0.0, 0.0))
        .collect();

    let mut builder = MeshBuilder::new(n)
        .cell_volumes(vec![dx; n])
        .cell_centres(centres);

    for f in 0..n - 1 {
        let x = (f as Scalar + 1.0) * dx;
        builder = builder.internal_face(f, f + 1, DVec3::X, DVec3::new(x, 0.0, 0.0));
    }

    builder
        .patch(PatchSpec::regular(
            "left",
            vec![BoundaryFaceSpec {
                cell: 0,
                area: -DVec3::X,
                centre: DVec3::ZERO,
            }],
        ))
        .patch(PatchSpec::regular(
            "right",
            vec![BoundaryFaceSpec {
                cell: n - 1,
                area: DVec3::X,
                centre: DVec3::new(n as Scalar * dx, 0.0, 0.0),
            }],
        ))
        .build()
}

/// 一维链式网格的分区版本
///
/// 将 `n_total` 个单元沿 x 方向连续均分为 `n_ranks` 块，返回
/// 第 `rank` 块的局部网格。相邻块之间生成配对的 processor patch，
/// 其 delta 系数为两侧单元中心的全距离（与整体网格的内部面一致），
/// 通信标签由分区对唯一确定，两侧自然一致。
///
/// # Panics
/// - `rank >= n_ranks`、`n_ranks == 0`、或单元数不能均分
pub fn line_mesh_partition(
    n_total: usize,
    dx: Scalar,
    rank: usize,
    n_ranks: usize,
) -> PfResult<FvMesh> {
    assert!(n_ranks > 0, "分区数必须大于 0");
    assert!(rank < n_ranks, "rank 越界");
    assert!(
        n_total % n_ranks == 0,
        "单元数 {n_total} 不能被分区数 {n_ranks} 均分"
    );

    let n_local = n_total / n_ranks;
    let global_start = rank * n_local;

    let centres: Vec<DVec3> = (0..n_local)
        .map(|i| DVec3::new(((global_start + i) as Scalar + 0.5) * dx, 0.0, 0.0))
        .collect();

    let mut builder = MeshBuilder::new(n_local)
        .cell_volumes(vec![dx; n_local])
        .cell_centres(centres);

    for f in 0..n_local - 1 {
        let x = ((global_start + f) as Scalar + 1.0) * dx;
        builder = builder.internal_face(f, f + 1, DVec3::X, DVec3::new(x, 0.0, 0.0));
    }

    // 左端：物理边界或面向 rank-1 的 processor patch
    let left_x = global_start as Scalar * dx;
    let left_face = BoundaryFaceSpec {
        cell: 0,
        area: -DVec3::X,
        centre: DVec3::new(left_x, 0.0, 0.0),
    };
    builder = if rank == 0 {
        builder.patch(PatchSpec::regular("left", vec![left_face]))
    } else {
        let peer = rank - 1;
        builder.patch(PatchSpec::processor(
            format!("processor_{rank}_to_{peer}"),
            vec![left_face],
            peer,
            pair_tag(peer, rank),
            vec![1.0 / dx],
        ))
    };

    // 右端：物理边界或面向 rank+1 的 processor patch
    let right_x = (global_start + n_local) as Scalar * dx;
    let right_face = BoundaryFaceSpec {
        cell: n_local - 1,
        area: DVec3::X,
        centre: DVec3::new(right_x, 0.0, 0.0),
    };
    builder = if rank == n_ranks - 1 {
        builder.patch(PatchSpec::regular("right", vec![right_face]))
    } else {
        let peer = rank + 1;
        builder.patch(PatchSpec::processor(
            format!("processor_{rank}_to_{peer}"),
            vec![right_face],
            peer,
            pair_tag(rank, peer),
            vec![1.0 / dx],
        ))
    };

    builder.build()
}

/// 分区对的确定性通信标签
#[inline]
fn pair_tag(lo: usize, hi: usize) -> u32 {
    debug_assert!(lo < hi);
    (lo * 65536 + hi) as u32
}
