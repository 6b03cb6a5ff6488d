// crates/pf_fvm/src/schemes/ddt.rs

//! 时间导数格式
//!
//! - Euler: 一阶隐式, `(ψⁿ⁺¹ − ψⁿ)·V/Δt`
//! - Backward: 二阶向后差分, `(1.5ψⁿ⁺¹ − 2ψⁿ + 0.5ψⁿ⁻¹)·V/Δt`
//!
//! Backward 在只有一层历史时经旧时间链的回退语义自动退化
//! （ψⁿ⁻¹ 取 ψⁿ），首个时间步与 Euler 一致地稳定。
//! 时间步长假定恒定。

use crate::fields::VolField;
use crate::matrix::FvMatrix;
use crate::schemes::DdtScheme;
use pf_foundation::{FieldValue, Scalar};

/// 时间导数项的矩阵贡献
///
/// # Panics
/// - `dt <= 0`
pub fn ddt<T: FieldValue>(psi: &VolField<T>, dt: Scalar, scheme: DdtScheme) -> FvMatrix<T> {
    assert!(dt > 0.0, "时间步长必须为正: {dt}");

    let mut m = FvMatrix::for_field(psi);
    let vols = psi.mesh().cell_volumes().to_vec();
    let r_dt = 1.0 / dt;

    match scheme {
        DdtScheme::Euler => {
            let old = psi.old_time(0);
            for c in 0..psi.n_cells() {
                let coeff = vols[c] * r_dt;
                m.diag_mut()[c] += coeff;
                let source = m.source_mut();
                source[c] = source[c] + old[c] * coeff;
            }
        }
        DdtScheme::Backward => {
            for c in 0..psi.n_cells() {
                let coeff = vols[c] * r_dt;
                let old0 = psi.old_time(0)[c];
                let old1 = psi.old_time(1)[c];
                m.diag_mut()[c] += 1.5 * coeff;
                let source = m.source_mut();
                source[c] = source[c] + (old0 * 2.0 - old1 * 0.5) * coeff;
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

    fn field_with_history() -> VolField<Scalar> {
        let mesh = Arc::new(line_mesh(2, 1.0).unwrap());
        let mut f = VolField::uniform(
            "T",
            mesh,
            1.0,
            vec![
                BoundaryCondition::zero_gradient(1),
                BoundaryCondition::zero_gradient(1),
            ],
        )
        .unwrap();
        f.store_old_time(); // ψⁿ⁻¹ = 1
        f.set_internal(vec![2.0, 2.0]).unwrap();
        f.store_old_time(); // ψⁿ = 2
        f.set_internal(vec![3.0, 3.0]).unwrap();
        f
    }

    #[test]
    fn test_euler_coefficients() {
        let f = field_with_history();
        let m = ddt(&f, 0.5, DdtScheme::Euler);
        // V/Δt = 1/0.5 = 2
        for c in 0..2 {
            assert!((m.diag()[c] - 2.0).abs() < 1e-14);
            assert!((m.source()[c] - 2.0 * 2.0).abs() < 1e-14, "b = ψⁿ·V/Δt");
        }
    }

    #[test]
    fn test_backward_coefficients() {
        let f = field_with_history();
        let m = ddt(&f, 0.5, DdtScheme::Backward);
        // diag = 1.5·V/Δt = 3; b = (2·2 − 0.5·1)·2 = 7
        for c in 0..2 {
            assert!((m.diag()[c] - 3.0).abs() < 1e-14);
            assert!((m.source()[c] - 7.0).abs() < 1e-14);
        }
    }

    #[test]
    fn test_backward_first_step_fallback() {
        let mesh = Arc::new(line_mesh(2, 1.0).unwrap());
        let mut f = VolField::uniform(
            "T",
            mesh,
            2.0,
            vec![
                BoundaryCondition::zero_gradient(1),
                BoundaryCondition::zero_gradient(1),
            ],
        )
        .unwrap();
        f.store_old_time(); // 只有一层历史

        let m = ddt(&f, 1.0, DdtScheme::Backward);
        // ψⁿ⁻¹ 回退为 ψⁿ = 2: b = (2·2 − 0.5·2)·1 = 3, diag = 1.5
        for c in 0..2 {
            assert!((m.diag()[c] - 1.5).abs() < 1e-14);
            assert!((m.source()[c] - 3.0).abs() < 1e-14);
        }
        // 稳态一致性: ψ = ψⁿ 时 A·ψ = b
        assert!((m.diag()[0] * 2.0 - m.source()[0]).abs() < 1e-14);
    }

    #[test]
    fn test_steady_state_consistency() {
        // ψ 不变时时间导数项的残差为零
        let mesh = Arc::new(line_mesh(2, 1.0).unwrap());
        let mut f = VolField::uniform(
            "T",
            mesh,
            5.0,
            vec![
                BoundaryCondition::zero_gradient(1),
                BoundaryCondition::zero_gradient(1),
            ],
        )
        .unwrap();
        f.store_old_time();
        f.store_old_time();

        for scheme in [DdtScheme::Euler, DdtScheme::Backward] {
            let m = ddt(&f, 0.1, scheme);
            for c in 0..2 {
                assert!(
                    (m.diag()[c] * 5.0 - m.source()[c]).abs() < 1e-10,
                    "{scheme:?} 稳态残差应为零"
                );
            }
        }
    }
}
