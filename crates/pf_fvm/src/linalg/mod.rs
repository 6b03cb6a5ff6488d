// crates/pf_fvm/src/linalg/mod.rs

//! 线性求解后端
//!
//! 消费 [`LduSystem`]（对角 + 面寻址上下三角 + 右端项 + 耦合界面描述符），
//! 产出更新后的解向量与收敛诊断。
//!
//! # 求解器
//!
//! - [`PcgSolver`]: 对角预条件共轭梯度，适用于对称系统（纯扩散 / 压力类）
//! - [`BiCgStabSolver`]: 双共轭梯度稳定法，适用于含对流的非对称系统
//!
//! 选择与容差由 [`SolverControls`] 配置（serde 结构体）。
//! 数值不收敛不是错误：以 [`SolverPerformance::converged`] 与
//! `tracing::warn!` 形式报告，运行继续。

pub mod bicgstab;
pub mod ldu;
pub mod pcg;
pub mod vector_ops;

pub use bicgstab::BiCgStabSolver;
pub use ldu::{InterfaceKind, LduSystem, SolverInterface};
pub use pcg::PcgSolver;

use crate::comm::CommContext;
use pf_foundation::{PfResult, Scalar};
use serde::{Deserialize, Serialize};

/// 求解器类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    /// 对角预条件共轭梯度（对称系统）
    Pcg,
    /// 双共轭梯度稳定法（非对称系统）
    BiCgStab,
}

/// 求解器控制参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverControls {
    /// 求解器类别
    pub solver: SolverKind,
    /// 绝对收敛容差（归一化残差）
    pub tolerance: Scalar,
    /// 相对收敛容差（相对初始归一化残差；0 表示不启用）
    pub rel_tol: Scalar,
    /// 最大迭代次数
    pub max_iterations: usize,
}

impl Default for SolverControls {
    fn default() -> Self {
        Self {
            solver: SolverKind::Pcg,
            tolerance: 1e-10,
            rel_tol: 0.0,
            max_iterations: 1000,
        }
    }
}

impl SolverControls {
    /// 创建控制参数
    pub fn new(solver: SolverKind, tolerance: Scalar, max_iterations: usize) -> Self {
        Self {
            solver,
            tolerance,
            rel_tol: 0.0,
            max_iterations,
        }
    }

    /// 设置相对容差
    pub fn with_rel_tol(mut self, rel_tol: Scalar) -> Self {
        self.rel_tol = rel_tol;
        self
    }
}

/// 求解性能诊断
#[derive(Debug, Clone)]
pub struct SolverPerformance {
    /// 求解器名称
    pub solver: &'static str,
    /// 被求解量标识（场名 + 分量）
    pub field: String,
    /// 初始归一化残差
    pub initial_residual: Scalar,
    /// 最终归一化残差
    pub final_residual: Scalar,
    /// 迭代次数
    pub n_iterations: usize,
    /// 是否达到收敛判据
    pub converged: bool,
}

impl SolverPerformance {
    /// 按收敛情况输出诊断日志（不收敛为警告而非错误）
    pub fn log(&self) {
        if self.converged {
            tracing::info!(
                solver = self.solver,
                field = %self.field,
                initial_residual = self.initial_residual,
                final_residual = self.final_residual,
                iterations = self.n_iterations,
                "线性求解完成"
            );
        } else {
            tracing::warn!(
                solver = self.solver,
                field = %self.field,
                initial_residual = self.initial_residual,
                final_residual = self.final_residual,
                iterations = self.n_iterations,
                "线性求解未达容差，继续执行"
            );
        }
    }
}

/// 收敛判据：绝对容差或相对初始残差
#[inline]
pub(crate) fn converged(
    residual: Scalar,
    initial: Scalar,
    controls: &SolverControls,
) -> bool {
    residual < controls.tolerance
        || (controls.rel_tol > 0.0 && residual < controls.rel_tol * initial)
}

/// 按控制参数派发求解
///
/// `label` 进入性能结构体的 `field` 字段（通常为 "场名[分量]"）。
pub fn solve_system(
    system: &LduSystem<'_>,
    x: &mut [Scalar],
    controls: &SolverControls,
    label: &str,
    ctx: &CommContext,
) -> PfResult<SolverPerformance> {
    match controls.solver {
        SolverKind::Pcg => PcgSolver::new(controls.clone()).solve(system, x, label, ctx),
        SolverKind::BiCgStab => {
            BiCgStabSolver::new(controls.clone()).solve(system, x, label, ctx)
        }
    }
}
