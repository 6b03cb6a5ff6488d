// crates/pf_fvm/src/linalg/ldu.rs

//! 面寻址 LDU 线性系统
//!
//! 线性求解后端消费的值对象：对角系数、按内部面编号的上 / 下三角
//! 系数（寻址直接借用网格的 owner/neighbour 数组）、右端项，以及
//! 耦合 patch 的界面描述符。
//!
//! # 界面语义
//!
//! 耦合边界（processor / cyclic）的邻侧未知量不进入本地矩阵的
//! 稀疏结构，而是在每次矩阵-向量乘法时经界面贡献进来：
//!
//! ```text
//! y[c] -= coeff[f] · x_remote[f]
//! ```
//!
//! processor 界面的 `x_remote` 在每次乘法时与对方分区交换当前迭代向量
//! （先提交全部发送再等待接收，两侧 SPMD 锁步保证配对）；cyclic 界面
//! 直接读本地配对单元。点积等归约经通信上下文做全局求和，因此每次
//! 线性迭代都隐含一次跨分区同步屏障。

use crate::comm::CommContext;
use crate::linalg::vector_ops::{dot, local_sum, sum_mag};
use pf_foundation::{PfResult, Scalar, SMALL};

/// 耦合界面类别
#[derive(Debug, Clone)]
pub enum InterfaceKind {
    /// 分区间界面：每次矩阵-向量乘法交换当前迭代向量
    Processor {
        /// 对方分区 rank
        peer: usize,
        /// 通信标签
        tag: u32,
    },
    /// 周期界面：邻侧未知量取本地配对单元
    Cyclic {
        /// 配对 patch 各面的邻接单元
        partner_cells: Vec<usize>,
    },
}

/// 单个耦合 patch 的界面描述符
#[derive(Debug, Clone)]
pub struct SolverInterface {
    /// patch 索引（诊断用）
    pub patch: usize,
    /// 界面类别
    pub kind: InterfaceKind,
    /// 各面的本地邻接单元
    pub face_cells: Vec<usize>,
    /// 界面系数（乘以邻侧值后从乘积中扣除）
    pub coeffs: Vec<Scalar>,
}

/// 面寻址 LDU 系统
///
/// `owner`/`neighbour` 借用网格连接数组；`upper[f]` 在 owner 行乘
/// neighbour 未知量，`lower[f]` 为对称位置的系数。
pub struct LduSystem<'a> {
    /// 单元数
    pub n_cells: usize,
    /// 内部面 owner
    pub owner: &'a [usize],
    /// 内部面 neighbour
    pub neighbour: &'a [usize],
    /// 对角系数
    pub diag: Vec<Scalar>,
    /// 上三角系数（owner 行 × neighbour 未知量）
    pub upper: Vec<Scalar>,
    /// 下三角系数（neighbour 行 × owner 未知量）
    pub lower: Vec<Scalar>,
    /// 右端项
    pub source: Vec<Scalar>,
    /// 耦合界面
    pub interfaces: Vec<SolverInterface>,
}

impl<'a> LduSystem<'a> {
    /// 矩阵是否对称（上下三角共享同一份系数时调用方直接传同值）
    pub fn is_symmetric(&self) -> bool {
        self.upper == self.lower
    }

    /// 矩阵-向量乘法 y = A·x（含界面贡献）
    ///
    /// processor 界面先全部提交发送，再逐一等待接收，
    /// 避免所有分区同时等待对方数据造成死锁。
    pub fn matvec(&self, x: &[Scalar], y: &mut [Scalar], ctx: &CommContext) -> PfResult<()> {
        debug_assert_eq!(x.len(), self.n_cells);
        debug_assert_eq!(y.len(), self.n_cells);

        for (yi, (&di, &xi)) in y.iter_mut().zip(self.diag.iter().zip(x.iter())) {
            *yi = di * xi;
        }

        for f in 0..self.upper.len() {
            let o = self.owner[f];
            let n = self.neighbour[f];
            y[o] += self.upper[f] * x[n];
            y[n] += self.lower[f] * x[o];
        }

        // 先提交全部发送
        for iface in &self.interfaces {
            if let InterfaceKind::Processor { peer, tag } = iface.kind {
                let outgoing: Vec<Scalar> =
                    iface.face_cells.iter().map(|&c| x[c]).collect();
                ctx.send(peer, tag, &outgoing)?;
            }
        }

        // 再消费全部界面
        for iface in &self.interfaces {
            match &iface.kind {
                InterfaceKind::Processor { peer, tag } => {
                    let remote = ctx.recv(*peer, *tag, iface.face_cells.len())?;
                    for (i, &c) in iface.face_cells.iter().enumerate() {
                        y[c] -= iface.coeffs[i] * remote[i];
                    }
                }
                InterfaceKind::Cyclic { partner_cells } => {
                    for (i, &c) in iface.face_cells.iter().enumerate() {
                        y[c] -= iface.coeffs[i] * x[partner_cells[i]];
                    }
                }
            }
        }

        Ok(())
    }

    /// 残差归一化因子
    ///
    /// `Σ|A·x − A·x̄| + Σ|b − A·x̄| + SMALL`，其中 x̄ 为解向量的全局均值。
    /// 全部分区算得同一个 x̄，因此均值向量的界面交换天然一致。
    pub fn norm_factor(&self, x: &[Scalar], ctx: &CommContext) -> PfResult<Scalar> {
        let n_global = ctx.all_reduce_sum(self.n_cells as Scalar);
        let x_avg = ctx.all_reduce_sum(local_sum(x)) / n_global.max(1.0);

        let mut ax = vec![0.0; self.n_cells];
        self.matvec(x, &mut ax, ctx)?;

        let x_ref = vec![x_avg; self.n_cells];
        let mut ax_ref = vec![0.0; self.n_cells];
        self.matvec(&x_ref, &mut ax_ref, ctx)?;

        let mut local = 0.0;
        for c in 0..self.n_cells {
            local += (ax[c] - ax_ref[c]).abs() + (self.source[c] - ax_ref[c]).abs();
        }
        Ok(ctx.all_reduce_sum(local) + SMALL)
    }

    /// 归一化残差 Σ|b − A·x| / normFactor
    pub fn residual_norm(
        &self,
        x: &[Scalar],
        norm_factor: Scalar,
        ctx: &CommContext,
    ) -> PfResult<Scalar> {
        let mut ax = vec![0.0; self.n_cells];
        self.matvec(x, &mut ax, ctx)?;
        let mut r = vec![0.0; self.n_cells];
        for c in 0..self.n_cells {
            r[c] = self.source[c] - ax[c];
        }
        Ok(ctx.all_reduce_sum(sum_mag(&r)) / norm_factor)
    }

    /// 全局点积
    #[inline]
    pub fn gdot(&self, x: &[Scalar], y: &[Scalar], ctx: &CommContext) -> Scalar {
        ctx.all_reduce_sum(dot(x, y))
    }

    /// 全局绝对值和
    #[inline]
    pub fn gsum_mag(&self, x: &[Scalar], ctx: &CommContext) -> Scalar {
        ctx.all_reduce_sum(sum_mag(x))
    }
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 两单元系统: [2 -1; -1 2]
    fn two_cell_system<'a>(owner: &'a [usize], neighbour: &'a [usize]) -> LduSystem<'a> {
        LduSystem {
            n_cells: 2,
            owner,
            neighbour,
            diag: vec![2.0, 2.0],
            upper: vec![-1.0],
            lower: vec![-1.0],
            source: vec![1.0, 0.0],
            interfaces: Vec::new(),
        }
    }

    #[test]
    fn test_matvec() {
        let owner = [0usize];
        let neighbour = [1usize];
        let sys = two_cell_system(&owner, &neighbour);
        let ctx = CommContext::serial();

        let x = vec![1.0, 2.0];
        let mut y = vec![0.0; 2];
        sys.matvec(&x, &mut y, &ctx).unwrap();
        // y0 = 2*1 - 1*2 = 0; y1 = -1*1 + 2*2 = 3
        assert!((y[0] - 0.0).abs() < 1e-14);
        assert!((y[1] - 3.0).abs() < 1e-14);
    }

    #[test]
    fn test_cyclic_interface_contribution() {
        let owner: [usize; 0] = [];
        let neighbour: [usize; 0] = [];
        // 单个单元，通过 cyclic 界面连接自身（退化但可检验符号）
        let sys = LduSystem {
            n_cells: 1,
            owner: &owner,
            neighbour: &neighbour,
            diag: vec![3.0],
            upper: vec![],
            lower: vec![],
            source: vec![0.0],
            interfaces: vec![SolverInterface {
                patch: 0,
                kind: InterfaceKind::Cyclic {
                    partner_cells: vec![0],
                },
                face_cells: vec![0],
                coeffs: vec![-1.0],
            }],
        };
        let ctx = CommContext::serial();
        let mut y = vec![0.0];
        sys.matvec(&[2.0], &mut y, &ctx).unwrap();
        // y = 3*2 - (-1)*2 = 8
        assert!((y[0] - 8.0).abs() < 1e-14);
    }

    #[test]
    fn test_residual_norm_zero_at_solution() {
        let owner = [0usize];
        let neighbour = [1usize];
        let sys = two_cell_system(&owner, &neighbour);
        let ctx = CommContext::serial();

        // 精确解 [2/3, 1/3]
        let x = vec![2.0 / 3.0, 1.0 / 3.0];
        let nf = sys.norm_factor(&x, &ctx).unwrap();
        let res = sys.residual_norm(&x, nf, &ctx).unwrap();
        assert!(res < 1e-12, "解处残差应为 0, 实际 {res}");
    }
}
