// crates/pf_fvm/src/lib.rs

//! PolyFV 有限体积核心
//!
//! 把作用在网格场上的偏微分算子（散度、梯度、拉普拉斯、时间导数、源项）
//! 翻译为 owner/neighbour 稀疏结构的线性系统，派发给可插拔的线性求解
//! 后端，并在保持边界条件一致性的前提下把解写回场。
//!
//! # 模块概览
//!
//! - [`comm`]: 显式通信上下文（串行 / 进程内多分区），halo 交换与全局归约
//! - [`fields`]: 体场容器（含旧时间层环）与面标量场
//! - [`boundary`]: 边界条件和类型（闭合枚举）与配置注册表
//! - [`matrix`]: [`FvMatrix`] 稀疏矩阵组装引擎（可加性累加、松弛、参考值钉定、求解）
//! - [`schemes`]: 离散格式库（时间导数、对流、扩散、梯度、源项）
//! - [`linalg`]: 面寻址 LDU 线性系统与迭代求解后端（PCG / BiCGStab）
//! - [`control`]: 外层迭代控制器（收敛判据、松弛因子管理）
//!
//! # 数据流
//!
//! 场 + 网格 → 离散格式（生成系数贡献）→ 矩阵累加 → 边界条件派发
//! （内部 / 边界系数与界面描述符）→ 线性求解 → 写回场并修正边界 →
//! 外层控制器判断收敛。
//!
//! # 单写者纪律
//!
//! 一个场在一次外层迭代内只被 `FvMatrix::solve` 的写回步骤和
//! `correct_boundary_conditions` 修改；离散格式只读场，所有场变更
//! 经由求解步骤完成。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod comm;
pub mod control;
pub mod fields;
pub mod linalg;
pub mod matrix;
pub mod schemes;

// 重导出常用类型
pub use boundary::{BcConfig, BcRegistry, BoundaryCondition};
pub use comm::{CommContext, CommWorld};
pub use control::{OuterControlConfig, OuterController, OuterState, ResidualControl};
pub use fields::{FieldLookup, SurfaceScalarField, VolField};
pub use linalg::{
    LduSystem, SolverControls, SolverInterface, SolverKind, SolverPerformance,
};
pub use matrix::FvMatrix;
pub use schemes::{DdtScheme, DivScheme, FvSchemes, LaplacianScheme};
