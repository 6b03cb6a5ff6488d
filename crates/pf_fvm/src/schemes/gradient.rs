// crates/pf_fvm/src/schemes/gradient.rs

//! Green-Gauss 梯度
//!
//! 用 Green 定理把体积分化为面积分：
//! ∇φ ≈ (1/V) Σ_f φ_f·S_f
//!
//! 内部面按网格线性权重插值，边界面取当前边界面值（因此边界条件
//! 修正过的场在线性分布下梯度精确）。延迟修正格式（线性上风、
//! 非正交修正）逐分量消费这里的梯度快照。

use crate::fields::VolField;
use glam::{DMat3, DVec3};
use pf_foundation::{FieldValue, Scalar};

/// 场第 `cmpt` 个分量的单元梯度
pub fn component_gradients<T: FieldValue>(psi: &VolField<T>, cmpt: usize) -> Vec<DVec3> {
    let mesh = psi.mesh();
    let mut grad = vec![DVec3::ZERO; mesh.n_cells()];

    let w = mesh.weights();
    for f in 0..mesh.n_internal_faces() {
        let o = mesh.owner(f);
        let nb = mesh.neighbour(f);
        let phi_f = psi.internal()[o].component(cmpt) * w[f]
            + psi.internal()[nb].component(cmpt) * (1.0 - w[f]);
        let contrib = mesh.face_area(f) * phi_f;
        grad[o] += contrib;
        grad[nb] -= contrib;
    }

    for (pi, patch) in mesh.patches().iter().enumerate() {
        let values = psi.patch_values(pi);
        for (local, &cell) in patch.face_cells.iter().enumerate() {
            let sf = mesh.face_area(patch.global_face(local));
            grad[cell] += sf * values[local].component(cmpt);
        }
    }

    let vols = mesh.cell_volumes();
    for (g, &v) in grad.iter_mut().zip(vols.iter()) {
        *g /= v;
    }
    grad
}

/// 标量场梯度
#[inline]
pub fn grad_scalar(psi: &VolField<Scalar>) -> Vec<DVec3> {
    component_gradients(psi, 0)
}

/// 向量场梯度张量，(∇U)ᵢⱼ = ∂Uⱼ/∂xᵢ
pub fn grad_vector(psi: &VolField<DVec3>) -> Vec<DMat3> {
    let gx = component_gradients(psi, 0);
    let gy = component_gradients(psi, 1);
    let gz = component_gradients(psi, 2);
    (0..psi.n_cells())
        .map(|c| DMat3::from_cols(gx[c], gy[c], gz[c]))
        .collect()
}
