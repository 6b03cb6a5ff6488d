// crates/pf_fvm/src/schemes/divergence.rs

//! 对流（散度）格式
//!
//! 消费一个面通量场与被输运场，按所选格式产出矩阵系数：
//!
//! - 上风：施主单元由局部通量符号选择，零通量平局按"通量 ≥ 0 ⇒
//!   owner 为施主"解决（一致而非任意，保证跨运行可复现）
//! - 线性：网格线性权重的中心插值
//! - 线性上风：隐式一阶上风 + 显式二阶重构修正；两部分取自同一
//!   梯度快照，保证一次组装内的一致性
//!
//! 对流矩阵非对称（下三角独立物化）。

use crate::fields::{SurfaceScalarField, VolField};
use crate::matrix::FvMatrix;
use crate::schemes::gradient::component_gradients;
use crate::schemes::DivScheme;
use pf_foundation::FieldValue;

/// 对流项的矩阵贡献
pub fn div<T: FieldValue>(
    flux: &SurfaceScalarField,
    psi: &VolField<T>,
    scheme: DivScheme,
) -> FvMatrix<T> {
    let mesh = psi.mesh_arc();
    let mut m = FvMatrix::for_field(psi);

    // 内部面：施主权重
    for f in 0..mesh.n_internal_faces() {
        let ff = flux.internal()[f];
        let w = match scheme {
            // 零通量平局归 owner
            DivScheme::Upwind | DivScheme::LinearUpwind => {
                if ff >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            DivScheme::Linear => mesh.weights()[f],
        };

        let o = mesh.owner(f);
        let nb = mesh.neighbour(f);
        let lower_c = -w * ff;
        let upper_c = ff + lower_c;

        m.lower_mut()[f] += lower_c;
        m.upper_mut()[f] += upper_c;
        m.diag_mut()[o] -= lower_c;
        m.diag_mut()[nb] -= upper_c;
    }

    // 边界：面值系数契约
    for (pi, patch) in mesh.patches().iter().enumerate() {
        let cond = psi.condition(pi);
        let vic = cond.value_internal_coeffs(&patch.weights);
        let vbc = cond.value_boundary_coeffs(&patch.delta_coeffs, &patch.weights);

        let ic = m.internal_coeffs_mut(pi);
        for local in 0..patch.size() {
            let ff = flux.boundary(pi)[local];
            ic[local] = ic[local] + vic[local] * ff;
        }
        let bc = m.boundary_coeffs_mut(pi);
        for local in 0..patch.size() {
            let ff = flux.boundary(pi)[local];
            bc[local] = bc[local] + vbc[local] * (-ff);
        }
    }

    // 线性上风：显式二阶重构修正（延迟修正），
    // 隐式与显式部分取自同一梯度快照
    if scheme == DivScheme::LinearUpwind {
        for cmpt in 0..T::N_COMPONENTS {
            let grads = component_gradients(psi, cmpt);
            for f in 0..mesh.n_internal_faces() {
                let ff = flux.internal()[f];
                let o = mesh.owner(f);
                let nb = mesh.neighbour(f);
                let donor = if ff >= 0.0 { o } else { nb };
                let r = mesh.face_centre(f) - mesh.cell_centres()[donor];
                let corr = ff * grads[donor].dot(r);

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

/// 对流项的显式求值（算子作用于已知场，不产生矩阵贡献）
///
/// 内部面取线性插值，边界面取当前边界面值。
pub fn div_explicit<T: FieldValue>(flux: &SurfaceScalarField, psi: &VolField<T>) -> Vec<T> {
    let mesh = psi.mesh();
    let mut acc = vec![T::zero(); mesh.n_cells()];

    let w = mesh.weights();
    for f in 0..mesh.n_internal_faces() {
        let ff = flux.internal()[f];
        let o = mesh.owner(f);
        let nb = mesh.neighbour(f);
        let phi_f = psi.internal()[o] * w[f] + psi.internal()[nb] * (1.0 - w[f]);
        acc[o] = acc[o] + phi_f * ff;
        acc[nb] = acc[nb] - phi_f * ff;
    }

    for (pi, patch) in mesh.patches().iter().enumerate() {
        let values = psi.patch_values(pi);
        for (local, &cell) in patch.face_cells.iter().enumerate() {
            acc[cell] = acc[cell] + values[local] * flux.boundary(pi)[local];
        }
    }

    let vols = mesh.cell_volumes();
    for (a, &v) in acc.iter_mut().zip(vols.iter()) {
        *a = *a * (1.0 / v);
    }
    acc
}
