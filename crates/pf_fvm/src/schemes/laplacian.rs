// crates/pf_fvm/src/schemes/laplacian.rs

//! 扩散（拉普拉斯）格式
//!
//! 面面积向量按"过松弛"方式分解 `S_f = E_f + T_f`，其中
//! `E_f = S_f²/(S_f·d)·d` 与单元中心连线共线：
//!
//! - E 部分隐式进入矩阵（正交网格上 |E| = |S_f|，即标准五点格式），
//!   保持隐式部分对角占优
//! - T 部分（非正交修正）作为显式延迟项进入右端项，梯度取自
//!   本次组装的同一 Green-Gauss 快照
//!
//! 边界贡献经边界条件的法向梯度系数契约进入：
//! `iC = γ|S_f|·gic`, `bC = −γ|S_f|·gbc`。

use crate::fields::{SurfaceScalarField, VolField};
use crate::matrix::FvMatrix;
use crate::schemes::gradient::component_gradients;
use crate::schemes::LaplacianScheme;
use pf_foundation::{FieldValue, Scalar, VSMALL};

/// 均匀扩散系数的拉普拉斯项
pub fn laplacian<T: FieldValue>(
    gamma: Scalar,
    psi: &VolField<T>,
    scheme: LaplacianScheme,
) -> FvMatrix<T> {
    assemble(psi, scheme, |_| gamma, |_, _| gamma)
}

/// 逐面扩散系数的拉普拉斯项
pub fn laplacian_field<T: FieldValue>(
    gamma: &SurfaceScalarField,
    psi: &VolField<T>,
    scheme: LaplacianScheme,
) -> FvMatrix<T> {
    assemble(
        psi,
        scheme,
        |f| gamma.internal()[f],
        |p, local| gamma.boundary(p)[local],
    )
}

fn assemble<T: FieldValue>(
    psi: &VolField<T>,
    scheme: LaplacianScheme,
    gamma_internal: impl Fn(usize) -> Scalar,
    gamma_boundary: impl Fn(usize, usize) -> Scalar,
) -> FvMatrix<T> {
    let mesh = psi.mesh_arc();
    let mut m = FvMatrix::for_field(psi);

    // 隐式正交部分
    for f in 0..mesh.n_internal_faces() {
        let sf = mesh.face_area(f);
        let d = mesh.cell_to_cell()[f];
        let e_coeff = sf.length_squared() / sf.dot(d).max(VSMALL);

        let coeff = gamma_internal(f) * e_coeff;
        let o = mesh.owner(f);
        let nb = mesh.neighbour(f);
        m.upper_mut()[f] += coeff;
        m.diag_mut()[o] -= coeff;
        m.diag_mut()[nb] -= coeff;
    }

    // 边界贡献
    for (pi, patch) in mesh.patches().iter().enumerate() {
        let cond = psi.condition(pi);
        let gic = cond.gradient_internal_coeffs(&patch.delta_coeffs);
        let gbc = cond.gradient_boundary_coeffs(&patch.delta_coeffs);
        let g: Vec<Scalar> = (0..patch.size())
            .map(|local| {
                gamma_boundary(pi, local) * mesh.face_area_mag(patch.global_face(local))
            })
            .collect();

        let ic = m.internal_coeffs_mut(pi);
        for local in 0..g.len() {
            ic[local] = ic[local] + gic[local] * g[local];
        }
        let bc = m.boundary_coeffs_mut(pi);
        for local in 0..g.len() {
            bc[local] = bc[local] + gbc[local] * (-g[local]);
        }
    }

    // 非正交显式修正（延迟项），与隐式部分共用几何分解
    if scheme == LaplacianScheme::Corrected {
        let w = mesh.weights();
        for cmpt in 0..T::N_COMPONENTS {
            let grads = component_gradients(psi, cmpt);
            for f in 0..mesh.n_internal_faces() {
                let sf = mesh.face_area(f);
                let d = mesh.cell_to_cell()[f];
                let e_coeff = sf.length_squared() / sf.dot(d).max(VSMALL);
                let t = sf - d * e_coeff;
                if t.length_squared() < VSMALL {
                    continue; // 正交面无修正
                }

                let o = mesh.owner(f);
                let nb = mesh.neighbour(f);
                let grad_f = grads[o] * w[f] + grads[nb] * (1.0 - w[f]);
                let corr = gamma_internal(f) * t.dot(grad_f);

                let source = m.source_mut();
                let so = source[o].component(cmpt) - corr;
                source[o].set_component(cmpt, so);
                let sn = source[nb].component(cmpt) + corr;
                source[nb].set_component(cmpt, sn);
            }
        }
    }

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryCondition;
    use pf_mesh::generation::line_mesh;
    use std::sync::Arc;

    fn neumann_field(n: usize) -> VolField<Scalar> {
        let mesh = Arc::new(line_mesh(n, 1.0).unwrap());
        VolField::new(
            "T",
            mesh,
            |c| c as Scalar,
            vec![
                BoundaryCondition::zero_gradient(1),
                BoundaryCondition::zero_gradient(1),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_symmetry_and_conservation_under_neumann() {
        // 均匀正交网格 + 全零通量边界:
        // 上下三角相等（矩阵保持对称存储），右端项总和为零
        let psi = neumann_field(5);
        let m = laplacian(1.0, &psi, LaplacianScheme::Corrected);

        assert!(m.is_symmetric(), "纯扩散矩阵必须对称");
        for f in 0..4 {
            assert!((m.upper()[f] - m.lower()[f]).abs() < 1e-15);
        }

        let total: Scalar = m.source().iter().sum();
        assert!(total.abs() < 1e-12, "零通量边界下源项总和应为零: {total}");

        // 零梯度边界不产生边界系数
        for p in 0..2 {
            assert_eq!(m.internal_coeffs(p)[0], 0.0);
            assert_eq!(m.boundary_coeffs(p)[0], 0.0);
        }
    }

    #[test]
    fn test_row_sums_vanish_in_interior() {
        // 拉普拉斯行和为零（常数场无扩散通量）
        let psi = neumann_field(4);
        let m = laplacian(2.5, &psi, LaplacianScheme::Orthogonal);

        let mesh = psi.mesh();
        let mut row_sum = m.diag().to_vec();
        for f in 0..mesh.n_internal_faces() {
            row_sum[mesh.owner(f)] += m.upper()[f];
            row_sum[mesh.neighbour(f)] += m.lower()[f];
        }
        for (c, s) in row_sum.iter().enumerate() {
            assert!(s.abs() < 1e-12, "单元 {c} 行和应为零: {s}");
        }
    }

    #[test]
    fn test_dirichlet_boundary_coefficients() {
        let mesh = Arc::new(line_mesh(2, 1.0).unwrap());
        let psi = VolField::uniform(
            "T",
            mesh,
            0.0,
            vec![
                BoundaryCondition::fixed_value_uniform(0.0, 1),
                BoundaryCondition::fixed_value_uniform(10.0, 1),
            ],
        )
        .unwrap();

        let m = laplacian(1.0, &psi, LaplacianScheme::Orthogonal);
        // 边界 delta 系数 = 2: iC = γ|S|·(−Δ) = −2, bC = −γ|S|·Δ·v
        assert!((m.internal_coeffs(0)[0] + 2.0).abs() < 1e-14);
        assert!((m.boundary_coeffs(0)[0] - 0.0).abs() < 1e-14);
        assert!((m.internal_coeffs(1)[0] + 2.0).abs() < 1e-14);
        assert!((m.boundary_coeffs(1)[0] + 20.0).abs() < 1e-14);
    }

    #[test]
    fn test_orthogonal_mesh_has_no_correction() {
        // 正交网格上 Corrected 与 Orthogonal 结果一致
        let psi = neumann_field(4);
        let a = laplacian(1.0, &psi, LaplacianScheme::Orthogonal);
        let b = laplacian(1.0, &psi, LaplacianScheme::Corrected);
        for c in 0..4 {
            assert!((a.source()[c] - b.source()[c]).abs() < 1e-13);
            assert!((a.diag()[c] - b.diag()[c]).abs() < 1e-15);
        }
    }

    #[test]
    fn test_face_coefficient_scales_with_gamma() {
        let psi = neumann_field(3);
        let m1 = laplacian(1.0, &psi, LaplacianScheme::Orthogonal);
        let m4 = laplacian(4.0, &psi, LaplacianScheme::Orthogonal);
        for f in 0..2 {
            assert!((m4.upper()[f] - 4.0 * m1.upper()[f]).abs() < 1e-13);
        }
    }
}
