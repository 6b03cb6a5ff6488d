// crates/pf_fvm/tests/partitioned_exchange.rs
//!
//! 分区耦合边界端到端测试
//!
//! 两个单单元分区经配对 processor patch 连接，组装扩散项并求解，
//! 结果必须与等价的单分区两单元情形一致（场景：两端定值 0 / 10，
//! 单分区解 [2.5, 7.5]）。线性求解器在每次矩阵-向量乘法中经界面
//! 交换当前迭代向量，点积做全局归约。

use pf_fvm::boundary::BoundaryCondition;
use pf_fvm::comm::CommWorld;
use pf_fvm::linalg::{SolverControls, SolverKind};
use pf_fvm::schemes::{laplacian, LaplacianScheme};
use pf_fvm::VolField;
use pf_mesh::generation::{line_mesh, line_mesh_partition};
use std::sync::Arc;
use std::thread;

fn tight_pcg() -> SolverControls {
    SolverControls::new(SolverKind::Pcg, 1e-12, 500)
}

/// 每个分区的条件：物理端定值，耦合端 processor
fn partition_conditions(rank: usize) -> Vec<BoundaryCondition<f64>> {
    if rank == 0 {
        // patch 顺序: [left(物理), processor]
        vec![
            BoundaryCondition::fixed_value_uniform(0.0, 1),
            BoundaryCondition::processor(1),
        ]
    } else {
        // patch 顺序: [processor, right(物理)]
        vec![
            BoundaryCondition::processor(1),
            BoundaryCondition::fixed_value_uniform(10.0, 1),
        ]
    }
}

#[test]
fn two_partition_diffusion_matches_monolithic() {
    // 单分区参考解
    let serial_ctx = pf_fvm::comm::CommContext::serial();
    let whole = Arc::new(line_mesh(2, 1.0).unwrap());
    let mut reference = VolField::uniform(
        "T",
        whole,
        0.0,
        vec![
            BoundaryCondition::fixed_value_uniform(0.0, 1),
            BoundaryCondition::fixed_value_uniform(10.0, 1),
        ],
    )
    .unwrap();
    reference.begin_outer_iteration();
    reference
        .update_boundary_conditions(&serial_ctx)
        .unwrap();
    let mut eqn = laplacian(1.0, &reference, LaplacianScheme::Orthogonal);
    eqn.solve(&mut reference, &tight_pcg(), &serial_ctx).unwrap();
    let expected: Vec<f64> = reference.internal().to_vec();
    assert!((expected[0] - 2.5).abs() < 1e-10);
    assert!((expected[1] - 7.5).abs() < 1e-10);

    // 两分区求解
    let contexts = CommWorld::create(2);
    let handles: Vec<_> = contexts
        .into_iter()
        .map(|ctx| {
            thread::spawn(move || {
                let rank = ctx.rank();
                let mesh = Arc::new(line_mesh_partition(2, 1.0, rank, 2).unwrap());
                let mut t = VolField::uniform(
                    "T",
                    Arc::clone(&mesh),
                    0.0,
                    partition_conditions(rank),
                )
                .unwrap();

                t.begin_outer_iteration();
                t.update_boundary_conditions(&ctx).unwrap();

                let mut eqn = laplacian(1.0, &t, LaplacianScheme::Orthogonal);
                let perf = eqn.solve(&mut t, &tight_pcg(), &ctx).unwrap();
                assert!(perf[0].converged, "rank {rank} 求解应收敛: {:?}", perf[0]);

                // 求解后的残差应在容差内
                let res = eqn.residual(&t, &ctx).unwrap();
                assert!(res[0] < 1e-9, "rank {rank} 残差过大: {}", res[0]);

                let proc_patch = mesh
                    .patches()
                    .iter()
                    .position(|p| p.is_coupled())
                    .expect("应有 processor patch");
                (rank, t.internal()[0], t.patch_values(proc_patch)[0])
            })
        })
        .collect();

    let mut results: Vec<(usize, f64, f64)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort_by_key(|r| r.0);

    // 与单分区解一致
    assert!(
        (results[0].1 - expected[0]).abs() < 1e-9,
        "rank0 解应为 {}, 实际 {}",
        expected[0],
        results[0].1
    );
    assert!(
        (results[1].1 - expected[1]).abs() < 1e-9,
        "rank1 解应为 {}, 实际 {}",
        expected[1],
        results[1].1
    );

    // 耦合面值两侧一致，等于界面处的线性分布值 5.0
    assert!((results[0].2 - 5.0).abs() < 1e-9, "rank0 耦合面值: {}", results[0].2);
    assert!((results[1].2 - 5.0).abs() < 1e-9, "rank1 耦合面值: {}", results[1].2);
}

#[test]
fn four_cell_two_partition_profile_matches() {
    // 4 单元均分两分区，与整体网格解逐单元比对
    let serial_ctx = pf_fvm::comm::CommContext::serial();
    let whole = Arc::new(line_mesh(4, 1.0).unwrap());
    let mut reference = VolField::uniform(
        "T",
        whole,
        0.0,
        vec![
            BoundaryCondition::fixed_value_uniform(0.0, 1),
            BoundaryCondition::fixed_value_uniform(8.0, 1),
        ],
    )
    .unwrap();
    reference.begin_outer_iteration();
    reference
        .update_boundary_conditions(&serial_ctx)
        .unwrap();
    let mut eqn = laplacian(1.0, &reference, LaplacianScheme::Orthogonal);
    eqn.solve(&mut reference, &tight_pcg(), &serial_ctx).unwrap();
    let expected: Vec<f64> = reference.internal().to_vec();

    let contexts = CommWorld::create(2);
    let handles: Vec<_> = contexts
        .into_iter()
        .map(|ctx| {
            thread::spawn(move || {
                let rank = ctx.rank();
                let mesh = Arc::new(line_mesh_partition(4, 1.0, rank, 2).unwrap());
                let conditions = if rank == 0 {
                    vec![
                        BoundaryCondition::fixed_value_uniform(0.0, 1),
                        BoundaryCondition::processor(1),
                    ]
                } else {
                    vec![
                        BoundaryCondition::processor(1),
                        BoundaryCondition::fixed_value_uniform(8.0, 1),
                    ]
                };
                let mut t =
                    VolField::uniform("T", Arc::clone(&mesh), 0.0, conditions).unwrap();

                t.begin_outer_iteration();
                t.update_boundary_conditions(&ctx).unwrap();

                let mut eqn = laplacian(1.0, &t, LaplacianScheme::Orthogonal);
                eqn.solve(&mut t, &tight_pcg(), &ctx).unwrap();
                (rank, t.internal().to_vec())
            })
        })
        .collect();

    let mut results: Vec<(usize, Vec<f64>)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort_by_key(|r| r.0);

    let combined: Vec<f64> = results
        .iter()
        .flat_map(|(_, v)| v.iter().copied())
        .collect();
    assert_eq!(combined.len(), 4);
    for c in 0..4 {
        assert!(
            (combined[c] - expected[c]).abs() < 1e-9,
            "单元 {c}: 分区解 {} vs 整体解 {}",
            combined[c],
            expected[c]
        );
    }
}
