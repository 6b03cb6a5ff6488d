// crates/pf_fvm/src/schemes/source.rs

//! 源项格式
//!
//! 矩阵表示 `A·ψ − b`、全部项之和为零的约定下：
//!
//! - [`sp`]: 隐式源 `c·ψ`，贡献对角 `V·c`
//! - [`su`]: 显式源 `s`，贡献右端项 `−V·s`
//! - [`su_sp`]: 按符号切换：系数非负时隐式（增强对角占优），
//!   为负时显式（以当前场值冻结）

use crate::fields::VolField;
use crate::matrix::FvMatrix;
use pf_foundation::{FieldValue, Scalar};

/// 隐式源项 `c·ψ`
///
/// # Panics
/// - `coeff` 长度与单元数不符
pub fn sp<T: FieldValue>(coeff: &[Scalar], psi: &VolField<T>) -> FvMatrix<T> {
    assert_eq!(coeff.len(), psi.n_cells(), "隐式源系数长度与单元数不符");
    let mut m = FvMatrix::for_field(psi);
    let vols = psi.mesh().cell_volumes().to_vec();
    for c in 0..psi.n_cells() {
        m.diag_mut()[c] += vols[c] * coeff[c];
    }
    m
}

/// 显式源项 `s`
///
/// # Panics
/// - `values` 长度与单元数不符
pub fn su<T: FieldValue>(values: &[T], psi: &VolField<T>) -> FvMatrix<T> {
    assert_eq!(values.len(), psi.n_cells(), "显式源长度与单元数不符");
    let mut m = FvMatrix::for_field(psi);
    let vols = psi.mesh().cell_volumes().to_vec();
    for c in 0..psi.n_cells() {
        let source = m.source_mut();
        source[c] = source[c] - values[c] * vols[c];
    }
    m
}

/// 符号切换源项 `c·ψ`
///
/// 系数非负时按 [`sp`] 隐式化，为负时以当前场值显式冻结。
pub fn su_sp<T: FieldValue>(coeff: &[Scalar], psi: &VolField<T>) -> FvMatrix<T> {
    assert_eq!(coeff.len(), psi.n_cells(), "源系数长度与单元数不符");
    let mut m = FvMatrix::for_field(psi);
    let vols = psi.mesh().cell_volumes().to_vec();
    for c in 0..psi.n_cells() {
        if coeff[c] >= 0.0 {
            m.diag_mut()[c] += vols[c] * coeff[c];
        } else {
            let source = m.source_mut();
            source[c] = source[c] - psi.internal()[c] * (vols[c] * coeff[c]);
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

    fn field() -> VolField<Scalar> {
        let mesh = Arc::new(line_mesh(2, 0.5).unwrap());
        VolField::uniform(
            "T",
            mesh,
            3.0,
            vec![
                BoundaryCondition::zero_gradient(1),
                BoundaryCondition::zero_gradient(1),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_sp_scales_with_volume() {
        let psi = field();
        let m = sp(&[2.0, 4.0], &psi);
        // V = 0.5
        assert!((m.diag()[0] - 1.0).abs() < 1e-14);
        assert!((m.diag()[1] - 2.0).abs() < 1e-14);
        assert!(m.source().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_su_sign_convention() {
        let psi = field();
        let m = su(&[6.0, -2.0], &psi);
        // source = -V·s
        assert!((m.source()[0] + 3.0).abs() < 1e-14);
        assert!((m.source()[1] - 1.0).abs() < 1e-14);
        assert!(m.diag().iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_su_sp_switches_on_sign() {
        let psi = field(); // ψ = 3
        let m = su_sp(&[2.0, -2.0], &psi);
        // 单元 0: 隐式 diag = 0.5·2 = 1
        assert!((m.diag()[0] - 1.0).abs() < 1e-14);
        assert!(m.source()[0].abs() < 1e-14);
        // 单元 1: 显式 source = -V·c·ψ = -0.5·(-2)·3 = 3
        assert!(m.diag()[1].abs() < 1e-14);
        assert!((m.source()[1] - 3.0).abs() < 1e-14);
    }

    #[test]
    fn test_implicit_explicit_equivalence_at_solution() {
        // 在 ψ 当前值处，隐式与显式表示的 A·ψ − b 相同
        let psi = field();
        let imp = sp(&[1.5, 1.5], &psi);
        let exp = su_sp(&[-1.5, -1.5], &psi);
        for c in 0..2 {
            let imp_residual = imp.diag()[c] * psi.internal()[c] - imp.source()[c];
            let exp_residual = exp.diag()[c] * psi.internal()[c] - exp.source()[c];
            assert!(
                (imp_residual + exp_residual).abs() < 1e-13,
                "±c 的源项在当前场值处应互为相反数"
            );
        }
    }
}
