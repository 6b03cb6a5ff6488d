// crates/pf_fvm/src/control/mod.rs

//! 外层迭代控制器
//!
//! 在一个时间步内编排"重组装 + 重求解"的外层循环（压力-速度耦合
//! 类算法），决定收敛并管理逐场松弛因子。
//!
//! # 状态机
//!
//! `NotStarted → Iterating → {Converged | MaxIterReached}`。
//! [`advance`](OuterController::advance) 推进计数并报告是否继续；
//! [`store_residual`](OuterController::store_residual) 记录某场本次
//! 迭代的初始残差并评估判据。达到上限未收敛只产生警告日志，
//! 状态在下一次 `advance` 时自动为新时间步复位：外层不收敛是
//! 质量问题而非正确性失败。
//!
//! # 判据
//!
//! 逐场：本次迭代初始残差对首次迭代初始残差的相对量 < rel_tol，
//! 或绝对量 < tolerance，二者满足其一；全部受控场满足才算收敛。
//! 未配置任何残差控制时判据恒不满足，循环退化为固定趟数；
//! 默认上限 1 即单趟模式。

use pf_foundation::{Scalar, VSMALL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 单个场的残差控制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualControl {
    /// 场名
    pub field: String,
    /// 绝对容差
    pub tolerance: Scalar,
    /// 相对（首迭代初始残差）容差；0 表示不启用
    pub rel_tol: Scalar,
}

/// 外层循环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuterControlConfig {
    /// 最大外层迭代数（默认 1：单趟模式）
    pub max_iterations: usize,
    /// 逐场残差控制（空表 = 固定趟数模式）
    #[serde(default)]
    pub residual_controls: Vec<ResidualControl>,
    /// 逐场松弛因子（缺省 1，即不松弛）
    #[serde(default)]
    pub relaxation: HashMap<String, Scalar>,
}

impl Default for OuterControlConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1,
            residual_controls: Vec::new(),
            relaxation: HashMap::new(),
        }
    }
}

/// 外层循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuterState {
    /// 尚未开始
    NotStarted,
    /// 迭代中
    Iterating,
    /// 已收敛
    Converged,
    /// 达到迭代上限（未收敛，非致命）
    MaxIterReached,
}

/// 外层迭代控制器
pub struct OuterController {
    config: OuterControlConfig,
    state: OuterState,
    iteration: usize,
    /// 本时间步是否已终结（终结后下一次 advance 开启新时间步）
    finished: bool,
    /// 各受控场首次迭代的初始残差
    first_residuals: HashMap<String, Scalar>,
    /// 各受控场本次评估结果
    satisfied: HashMap<String, bool>,
}

impl OuterController {
    /// 创建控制器
    pub fn new(config: OuterControlConfig) -> Self {
        Self {
            config,
            state: OuterState::NotStarted,
            iteration: 0,
            finished: false,
            first_residuals: HashMap::new(),
            satisfied: HashMap::new(),
        }
    }

    /// 当前状态
    #[inline]
    pub fn state(&self) -> OuterState {
        self.state
    }

    /// 当前迭代序号（1 起）
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// 某场的松弛因子（未配置为 1，即不松弛）
    pub fn relaxation_for(&self, field: &str) -> Scalar {
        self.config.relaxation.get(field).copied().unwrap_or(1.0)
    }

    /// 推进外层循环，返回是否继续迭代
    ///
    /// 上一时间步已终结时自动复位开启新时间步。
    pub fn advance(&mut self) -> bool {
        if self.finished {
            self.reset();
        }

        match self.state {
            OuterState::Converged => {
                self.finished = true;
                tracing::info!(iterations = self.iteration, "外层迭代收敛");
                false
            }
            _ => {
                if self.iteration >= self.config.max_iterations {
                    self.state = OuterState::MaxIterReached;
                    self.finished = true;
                    if !self.config.residual_controls.is_empty() {
                        tracing::warn!(
                            max_iterations = self.config.max_iterations,
                            "外层迭代达到上限未收敛，进入下一时间步"
                        );
                    }
                    false
                } else {
                    self.iteration += 1;
                    self.state = OuterState::Iterating;
                    true
                }
            }
        }
    }

    /// 记录某场本次迭代的初始残差并评估收敛判据
    ///
    /// 未配置该场残差控制时忽略。全部受控场满足判据时状态置为
    /// Converged（随后的 `advance` 结束本时间步）。
    pub fn store_residual(&mut self, field: &str, residual: Scalar) {
        debug_assert!(
            self.state == OuterState::Iterating,
            "只应在迭代中记录残差"
        );

        let Some(control) = self
            .config
            .residual_controls
            .iter()
            .find(|c| c.field == field)
        else {
            return;
        };

        let first = *self
            .first_residuals
            .entry(field.to_string())
            .or_insert(residual);

        let achieved = residual < control.tolerance
            || (control.rel_tol > 0.0 && residual / first.max(VSMALL) < control.rel_tol);
        self.satisfied.insert(field.to_string(), achieved);

        if self.criteria_satisfied() {
            self.state = OuterState::Converged;
        }
    }

    /// 判据是否满足：有受控场，且全部受控场都被检查过并达标
    pub fn criteria_satisfied(&self) -> bool {
        let mut checked = false;
        let mut achieved = true;
        for control in &self.config.residual_controls {
            match self.satisfied.get(&control.field) {
                Some(&ok) => {
                    checked = true;
                    achieved = achieved && ok;
                }
                None => return false,
            }
        }
        checked && achieved
    }

    /// 为新时间步复位
    fn reset(&mut self) {
        self.state = OuterState::NotStarted;
        self.iteration = 0;
        self.finished = false;
        self.first_residuals.clear();
        self.satisfied.clear();
    }
}

// ============================================================
// 测试
// ============================================================
