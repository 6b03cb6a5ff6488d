// crates/pf_fvm/src/linalg/bicgstab.rs

//! 双共轭梯度稳定法求解器
//!
//! 适用于含对流项的非对称系统。对角（Jacobi）预条件。
//! 影子残差 r₀ 在整个迭代过程中保持不变，双正交化条件依赖于此。

use crate::comm::CommContext;
use crate::linalg::ldu::LduSystem;
use crate::linalg::{converged, SolverControls, SolverPerformance};
use pf_foundation::{PfResult, Scalar, SMALL, VSMALL};

/// 双共轭梯度稳定法求解器
pub struct BiCgStabSolver {
    controls: SolverControls,
}

impl BiCgStabSolver {
    /// 创建求解器
    pub fn new(controls: SolverControls) -> Self {
        Self { controls }
    }

    /// 求解 A·x = b（x 传入初始猜测，传出解）
    pub fn solve(
        &mut self,
        sys: &LduSystem<'_>,
        x: &mut [Scalar],
        label: &str,
        ctx: &CommContext,
    ) -> PfResult<SolverPerformance> {
        let n = sys.n_cells;
        debug_assert_eq!(x.len(), n);

        let norm_factor = sys.norm_factor(x, ctx)?;

        let precond = |v: Scalar, d: Scalar| v / if d.abs() > VSMALL { d } else { SMALL };

        // r = b - A·x
        let mut r = vec![0.0; n];
        sys.matvec(x, &mut r, ctx)?;
        for c in 0..n {
            r[c] = sys.source[c] - r[c];
        }
        // 影子残差，迭代中不再修改
        let r0 = r.clone();

        let initial_residual = sys.gsum_mag(&r, ctx) / norm_factor;
        let mut final_residual = initial_residual;
        let mut n_iterations = 0;

        if initial_residual < self.controls.tolerance {
            return Ok(self.performance(label, initial_residual, final_residual, 0, true));
        }

        let mut p = vec![0.0; n];
        let mut v = vec![0.0; n];
        let mut p_hat = vec![0.0; n];
        let mut s_hat = vec![0.0; n];
        let mut t = vec![0.0; n];

        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;

        while n_iterations < self.controls.max_iterations {
            let rho = sys.gdot(&r0, &r, ctx);
            if rho.abs() < VSMALL {
                break; // 双正交化破坏
            }

            if n_iterations == 0 {
                p.copy_from_slice(&r);
            } else {
                let beta = (rho / rho_old) * (alpha / omega);
                for c in 0..n {
                    p[c] = r[c] + beta * (p[c] - omega * v[c]);
                }
            }

            for c in 0..n {
                p_hat[c] = precond(p[c], sys.diag[c]);
            }
            sys.matvec(&p_hat, &mut v, ctx)?;

            let denom = sys.gdot(&r0, &v, ctx);
            if denom.abs() < VSMALL {
                break;
            }
            alpha = rho / denom;

            // s = r - alpha·v（就地复用 r）
            for c in 0..n {
                r[c] -= alpha * v[c];
            }

            // 提前收敛检查：s 已足够小则只做半步更新
            let s_norm = sys.gsum_mag(&r, ctx) / norm_factor;
            if converged(s_norm, initial_residual, &self.controls) {
                for c in 0..n {
                    x[c] += alpha * p_hat[c];
                }
                n_iterations += 1;
                final_residual = s_norm;
                break;
            }

            for c in 0..n {
                s_hat[c] = precond(r[c], sys.diag[c]);
            }
            sys.matvec(&s_hat, &mut t, ctx)?;

            let tt = sys.gdot(&t, &t, ctx);
            if tt.abs() < VSMALL {
                break;
            }
            omega = sys.gdot(&t, &r, ctx) / tt;
            if omega.abs() < VSMALL {
                break;
            }

            for c in 0..n {
                x[c] += alpha * p_hat[c] + omega * s_hat[c];
                r[c] -= omega * t[c];
            }

            rho_old = rho;
            n_iterations += 1;
            final_residual = sys.gsum_mag(&r, ctx) / norm_factor;

            if converged(final_residual, initial_residual, &self.controls) {
                break;
            }
        }

        let ok = converged(final_residual, initial_residual, &self.controls);
        Ok(self.performance(label, initial_residual, final_residual, n_iterations, ok))
    }

    fn performance(
        &self,
        label: &str,
        initial_residual: Scalar,
        final_residual: Scalar,
        n_iterations: usize,
        converged: bool,
    ) -> SolverPerformance {
        SolverPerformance {
            solver: "BiCGStab",
            field: label.to_string(),
            initial_residual,
            final_residual,
            n_iterations,
            converged,
        }
    }
}

// ============================================================
// 测试
// ============================================================
