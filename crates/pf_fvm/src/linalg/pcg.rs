// crates/pf_fvm/src/linalg/pcg.rs

//! 对角预条件共轭梯度求解器
//!
//! 适用于对称（正定或经参考值钉定消除奇异性的）系统，
//! 如纯扩散与压力修正类方程。
//!
//! 残差按归一化因子折算（见 [`LduSystem::norm_factor`]），
//! 收敛判据为绝对容差或相对初始残差。每次迭代的两次全局点积
//! 都是跨分区同步点。

use crate::comm::CommContext;
use crate::linalg::ldu::LduSystem;
use crate::linalg::vector_ops::axpy;
use crate::linalg::{converged, SolverControls, SolverPerformance};
use pf_foundation::{PfResult, Scalar, SMALL, VSMALL};

/// 对角预条件共轭梯度求解器
pub struct PcgSolver {
    controls: SolverControls,
}

impl PcgSolver {
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

        // r = b - A·x
        let mut r = vec![0.0; n];
        sys.matvec(x, &mut r, ctx)?;
        for c in 0..n {
            r[c] = sys.source[c] - r[c];
        }

        let initial_residual = sys.gsum_mag(&r, ctx) / norm_factor;
        let mut final_residual = initial_residual;
        let mut n_iterations = 0;

        if initial_residual < self.controls.tolerance {
            return Ok(self.performance(label, initial_residual, final_residual, 0, true));
        }

        let mut p = vec![0.0; n];
        let mut q = vec![0.0; n];
        let mut z = vec![0.0; n];
        let mut rho_old = 0.0;

        while n_iterations < self.controls.max_iterations {
            // Jacobi 预条件 z = r / D
            for c in 0..n {
                let d = sys.diag[c];
                z[c] = r[c] / if d.abs() > VSMALL { d } else { SMALL };
            }

            let rho = sys.gdot(&r, &z, ctx);
            if rho.abs() < VSMALL {
                break; // 停滞
            }

            if n_iterations == 0 {
                p.copy_from_slice(&z);
            } else {
                let beta = rho / rho_old;
                for c in 0..n {
                    p[c] = z[c] + beta * p[c];
                }
            }

            sys.matvec(&p, &mut q, ctx)?;
            let denom = sys.gdot(&p, &q, ctx);
            if denom.abs() < VSMALL {
                break; // 方向失效
            }
            let alpha = rho / denom;

            axpy(alpha, &p, x);
            axpy(-alpha, &q, &mut r);

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
            solver: "PCG",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::SolverKind;

    /// 一维泊松式三对角 SPD 系统
    fn tridiag(n: usize) -> (Vec<usize>, Vec<usize>, Vec<Scalar>, Vec<Scalar>) {
        let owner: Vec<usize> = (0..n - 1).collect();
        let neighbour: Vec<usize> = (1..n).collect();
        let diag = vec![2.0; n];
        let off = vec![-1.0; n - 1];
        (owner, neighbour, diag, off)
    }

    #[test]
    fn test_pcg_solves_spd_system() {
        let n = 20;
        let (owner, neighbour, mut diag, off) = tridiag(n);
        // 两端 Dirichlet 强化，保证正定
        diag[0] = 3.0;
        diag[n - 1] = 3.0;

        let mut b = vec![0.0; n];
        b[n - 1] = 10.0;

        let sys = LduSystem {
            n_cells: n,
            owner: &owner,
            neighbour: &neighbour,
            diag,
            upper: off.clone(),
            lower: off,
            source: b,
            interfaces: Vec::new(),
        };

        let ctx = CommContext::serial();
        let mut x = vec![0.0; n];
        let controls = SolverControls::new(SolverKind::Pcg, 1e-12, 200);
        let perf = PcgSolver::new(controls)
            .solve(&sys, &mut x, "phi", &ctx)
            .unwrap();

        assert!(perf.converged, "PCG 应收敛: {perf:?}");
        assert!(perf.final_residual < 1e-12);

        // 验证 A·x = b
        let mut ax = vec![0.0; n];
        sys.matvec(&x, &mut ax, &ctx).unwrap();
        for c in 0..n {
            assert!((ax[c] - sys.source[c]).abs() < 1e-8, "第 {c} 行残差过大");
        }
    }

    #[test]
    fn test_pcg_sign_flip_invariance() {
        // 整体取负的系统（负定矩阵 + 负右端项）应得到相同的解
        let n = 8;
        let (owner, neighbour, mut diag, off) = tridiag(n);
        diag[0] = 3.0;
        diag[n - 1] = 3.0;
        let mut b = vec![1.0; n];
        b[0] = 2.0;

        let ctx = CommContext::serial();
        let controls = SolverControls::new(SolverKind::Pcg, 1e-12, 200);

        let pos = LduSystem {
            n_cells: n,
            owner: &owner,
            neighbour: &neighbour,
            diag: diag.clone(),
            upper: off.clone(),
            lower: off.clone(),
            source: b.clone(),
            interfaces: Vec::new(),
        };
        let mut x_pos = vec![0.0; n];
        PcgSolver::new(controls.clone())
            .solve(&pos, &mut x_pos, "phi", &ctx)
            .unwrap();

        let neg = LduSystem {
            n_cells: n,
            owner: &owner,
            neighbour: &neighbour,
            diag: diag.iter().map(|d| -d).collect(),
            upper: off.iter().map(|u| -u).collect(),
            lower: off.iter().map(|u| -u).collect(),
            source: b.iter().map(|s| -s).collect(),
            interfaces: Vec::new(),
        };
        let mut x_neg = vec![0.0; n];
        PcgSolver::new(controls)
            .solve(&neg, &mut x_neg, "phi", &ctx)
            .unwrap();

        for c in 0..n {
            assert!(
                (x_pos[c] - x_neg[c]).abs() < 1e-9,
                "符号翻转后解应一致: {} vs {}",
                x_pos[c],
                x_neg[c]
            );
        }
    }

    #[test]
    fn test_pcg_zero_initial_residual() {
        let owner = [0usize];
        let neighbour = [1usize];
        let sys = LduSystem {
            n_cells: 2,
            owner: &owner,
            neighbour: &neighbour,
            diag: vec![2.0, 2.0],
            upper: vec![-1.0],
            lower: vec![-1.0],
            source: vec![1.0, 1.0],
            interfaces: Vec::new(),
        };
        let ctx = CommContext::serial();
        // 精确解作为初值
        let mut x = vec![1.0, 1.0];
        let perf = PcgSolver::new(SolverControls::default())
            .solve(&sys, &mut x, "phi", &ctx)
            .unwrap();
        assert!(perf.converged);
        assert_eq!(perf.n_iterations, 0, "初值即解时应零迭代返回");
    }
}
