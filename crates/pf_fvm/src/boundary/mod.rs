// crates/pf_fvm/src/boundary/mod.rs

//! 边界条件派发
//!
//! 边界条件语义收敛为一个闭合枚举：定值、定梯度、混合、分区间耦合、
//! 周期。项目特有的边界行为要么是新增一个枚举成员，要么是 `Mixed`
//! 的一种参数化，而不是开放继承体系里的新子类。
//!
//! # 系数契约
//!
//! 离散格式通过四组系数使用边界条件（Δ 为 patch 的 delta 系数，
//! ψ_c 为邻接单元内部值）：
//!
//! - 面值：`ψ_f = vic ⊙ ψ_c + vbc`
//!   （[`value_internal_coeffs`](BoundaryCondition::value_internal_coeffs) /
//!   [`value_boundary_coeffs`](BoundaryCondition::value_boundary_coeffs)）
//! - 面法向梯度：`snGrad = gic ⊙ ψ_c + gbc`
//!   （[`gradient_internal_coeffs`](BoundaryCondition::gradient_internal_coeffs) /
//!   [`gradient_boundary_coeffs`](BoundaryCondition::gradient_boundary_coeffs)）
//!
//! 耦合变体（processor / cyclic）的"边界系数"不折入右端项，
//! 而是成为线性求解器的界面系数，乘以邻侧值隐式参与求解。
//!
//! # 更新状态机
//!
//! 每个 patch 的条件对象带 `updated` 标志（由场容器管理）：
//! 外层迭代开始时复位为 Stale，`update_coeffs` 驱动 Stale → Updated，
//! 重复调用为空操作；Updated 后该 patch 的贡献在本次迭代内冻结。

pub mod registry;

pub use registry::{BcConfig, BcRegistry};

use glam::DMat3;
use pf_foundation::{FieldValue, Scalar};

/// 边界条件（按 patch 实例化的闭合变体集）
#[derive(Debug, Clone)]
pub enum BoundaryCondition<T: FieldValue> {
    /// 定值（Dirichlet）
    FixedValue {
        /// 各面的给定值
        value: Vec<T>,
    },
    /// 定梯度（Neumann）
    FixedGradient {
        /// 各面的给定法向梯度
        gradient: Vec<T>,
    },
    /// 混合：按 value_fraction 在定值与定梯度之间逐面混合
    Mixed {
        /// 定值端参考值
        ref_value: Vec<T>,
        /// 定梯度端参考梯度
        ref_gradient: Vec<T>,
        /// 混合分数 ∈ [0,1]，1 为全定值
        fraction: Vec<Scalar>,
        /// 若给出，按该面标量场（通常为通量）的方向每次迭代重算分数：
        /// 出流（通量 ≥ 0）取定梯度端，入流取定值端
        fraction_source: Option<String>,
    },
    /// 分区间耦合：持有对侧邻接单元值的 halo 缓存
    Processor {
        /// 对侧邻接单元值（每外层迭代经一次配对交换刷新）
        neighbour: Vec<T>,
    },
    /// 周期：同一网格内配对 patch，持有（已旋转的）配对单元值缓存
    Cyclic {
        /// 配对 patch 邻接单元值（传输时已应用旋转）
        partner_values: Vec<T>,
    },
}

impl<T: FieldValue> BoundaryCondition<T> {
    // ========================================================
    // 构造
    // ========================================================

    /// 均匀定值条件
    pub fn fixed_value_uniform(value: T, size: usize) -> Self {
        Self::FixedValue {
            value: vec![value; size],
        }
    }

    /// 逐面定值条件
    pub fn fixed_value(value: Vec<T>) -> Self {
        Self::FixedValue { value }
    }

    /// 均匀定梯度条件
    pub fn fixed_gradient_uniform(gradient: T, size: usize) -> Self {
        Self::FixedGradient {
            gradient: vec![gradient; size],
        }
    }

    /// 零梯度条件（定梯度的退化情形）
    pub fn zero_gradient(size: usize) -> Self {
        Self::fixed_gradient_uniform(T::zero(), size)
    }

    /// 混合条件（固定分数）
    pub fn mixed(ref_value: Vec<T>, ref_gradient: Vec<T>, fraction: Vec<Scalar>) -> Self {
        Self::Mixed {
            ref_value,
            ref_gradient,
            fraction,
            fraction_source: None,
        }
    }

    /// 按通量方向切换的进出流条件
    ///
    /// 入流取给定值，出流退化为零梯度；分数每次迭代按
    /// 名为 `fraction_source` 的面标量场重算。
    pub fn inlet_outlet(value: T, fraction_source: impl Into<String>, size: usize) -> Self {
        Self::Mixed {
            ref_value: vec![value; size],
            ref_gradient: vec![T::zero(); size],
            fraction: vec![1.0; size],
            fraction_source: Some(fraction_source.into()),
        }
    }

    /// 分区间耦合条件（halo 缓存初始为零）
    pub fn processor(size: usize) -> Self {
        Self::Processor {
            neighbour: vec![T::zero(); size],
        }
    }

    /// 周期条件（配对缓存初始为零）
    pub fn cyclic(size: usize) -> Self {
        Self::Cyclic {
            partner_values: vec![T::zero(); size],
        }
    }

    // ========================================================
    // 分类
    // ========================================================

    /// 是否为耦合条件（邻侧值隐式参与求解）
    #[inline]
    pub fn is_coupled(&self) -> bool {
        matches!(self, Self::Processor { .. } | Self::Cyclic { .. })
    }

    /// 条件类别名（诊断与注册表键）
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::FixedValue { .. } => "fixedValue",
            Self::FixedGradient { .. } => "fixedGradient",
            Self::Mixed { .. } => "mixed",
            Self::Processor { .. } => "processor",
            Self::Cyclic { .. } => "cyclic",
        }
    }

    /// patch 面数
    pub fn len(&self) -> usize {
        match self {
            Self::FixedValue { value } => value.len(),
            Self::FixedGradient { gradient } => gradient.len(),
            Self::Mixed { fraction, .. } => fraction.len(),
            Self::Processor { neighbour } => neighbour.len(),
            Self::Cyclic { partner_values } => partner_values.len(),
        }
    }

    /// 是否为空 patch
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================
    // 系数契约
    // ========================================================

    /// 面值的内部系数 vic
    pub fn value_internal_coeffs(&self, weights: &[Scalar]) -> Vec<T> {
        match self {
            Self::FixedValue { value } => vec![T::zero(); value.len()],
            Self::FixedGradient { gradient } => vec![T::uniform(1.0); gradient.len()],
            Self::Mixed { fraction, .. } => {
                fraction.iter().map(|&f| T::uniform(1.0 - f)).collect()
            }
            Self::Processor { .. } | Self::Cyclic { .. } => {
                weights.iter().map(|&w| T::uniform(w)).collect()
            }
        }
    }

    /// 面值的边界系数 vbc
    ///
    /// 耦合变体返回乘以邻侧值的界面权重 (1−w)。
    pub fn value_boundary_coeffs(&self, delta: &[Scalar], weights: &[Scalar]) -> Vec<T> {
        match self {
            Self::FixedValue { value } => value.clone(),
            Self::FixedGradient { gradient } => gradient
                .iter()
                .zip(delta.iter())
                .map(|(&g, &dc)| g * (1.0 / dc))
                .collect(),
            Self::Mixed {
                ref_value,
                ref_gradient,
                fraction,
                ..
            } => (0..fraction.len())
                .map(|i| {
                    let f = fraction[i];
                    ref_value[i] * f + ref_gradient[i] * ((1.0 - f) / delta[i])
                })
                .collect(),
            Self::Processor { .. } | Self::Cyclic { .. } => {
                weights.iter().map(|&w| T::uniform(1.0 - w)).collect()
            }
        }
    }

    /// 面法向梯度的内部系数 gic
    pub fn gradient_internal_coeffs(&self, delta: &[Scalar]) -> Vec<T> {
        match self {
            Self::FixedValue { value } => value
                .iter()
                .zip(delta.iter())
                .map(|(_, &dc)| T::uniform(-dc))
                .collect(),
            Self::FixedGradient { gradient } => vec![T::zero(); gradient.len()],
            Self::Mixed { fraction, .. } => fraction
                .iter()
                .zip(delta.iter())
                .map(|(&f, &dc)| T::uniform(-f * dc))
                .collect(),
            Self::Processor { .. } | Self::Cyclic { .. } => {
                delta.iter().map(|&dc| T::uniform(-dc)).collect()
            }
        }
    }

    /// 面法向梯度的边界系数 gbc
    ///
    /// 耦合变体返回乘以邻侧值的界面系数 Δ。
    pub fn gradient_boundary_coeffs(&self, delta: &[Scalar]) -> Vec<T> {
        match self {
            Self::FixedValue { value } => value
                .iter()
                .zip(delta.iter())
                .map(|(&v, &dc)| v * dc)
                .collect(),
            Self::FixedGradient { gradient } => gradient.clone(),
            Self::Mixed {
                ref_value,
                ref_gradient,
                fraction,
                ..
            } => (0..fraction.len())
                .map(|i| {
                    let f = fraction[i];
                    ref_value[i] * (f * delta[i]) + ref_gradient[i] * (1.0 - f)
                })
                .collect(),
            Self::Processor { .. } | Self::Cyclic { .. } => {
                delta.iter().map(|&dc| T::uniform(dc)).collect()
            }
        }
    }

    /// 由邻接内部值计算与本条件一致的边界面值
    pub fn evaluate(
        &self,
        internal: &[T],
        delta: &[Scalar],
        weights: &[Scalar],
    ) -> Vec<T> {
        match self {
            Self::FixedValue { value } => value.clone(),
            Self::FixedGradient { gradient } => internal
                .iter()
                .zip(gradient.iter().zip(delta.iter()))
                .map(|(&pc, (&g, &dc))| pc + g * (1.0 / dc))
                .collect(),
            Self::Mixed {
                ref_value,
                ref_gradient,
                fraction,
                ..
            } => (0..fraction.len())
                .map(|i| {
                    let f = fraction[i];
                    ref_value[i] * f
                        + (internal[i] + ref_gradient[i] * (1.0 / delta[i])) * (1.0 - f)
                })
                .collect(),
            Self::Processor { neighbour } => internal
                .iter()
                .zip(neighbour.iter().zip(weights.iter()))
                .map(|(&pc, (&nb, &w))| pc * w + nb * (1.0 - w))
                .collect(),
            Self::Cyclic { partner_values } => internal
                .iter()
                .zip(partner_values.iter().zip(weights.iter()))
                .map(|(&pc, (&pv, &w))| pc * w + pv * (1.0 - w))
                .collect(),
        }
    }

    // ========================================================
    // 迭代内更新
    // ========================================================

    /// 按面标量场方向重算混合分数（非 Mixed 变体为空操作）
    ///
    /// 通量 ≥ 0（出流）取定梯度端，否则取定值端。
    pub fn update_fraction_from_flux(&mut self, flux: &[Scalar]) {
        if let Self::Mixed { fraction, .. } = self {
            debug_assert_eq!(fraction.len(), flux.len());
            for (f, &q) in fraction.iter_mut().zip(flux.iter()) {
                *f = if q >= 0.0 { 0.0 } else { 1.0 };
            }
        }
    }

    /// 刷新 processor halo 缓存
    pub fn set_neighbour(&mut self, values: Vec<T>) {
        if let Self::Processor { neighbour } = self {
            *neighbour = values;
        }
    }

    /// 刷新 cyclic 配对缓存（调用方已应用旋转）
    pub fn set_partner_values(&mut self, values: Vec<T>) {
        if let Self::Cyclic { partner_values } = self {
            *partner_values = values;
        }
    }

    /// 读取 processor halo 缓存
    pub fn neighbour_values(&self) -> Option<&[T]> {
        match self {
            Self::Processor { neighbour } => Some(neighbour),
            Self::Cyclic { partner_values } => Some(partner_values),
            _ => None,
        }
    }
}

/// 对值序列应用旋转变换（标量场不变）
pub fn transform_values<T: FieldValue>(values: &mut [T], rotation: &DMat3) {
    for v in values.iter_mut() {
        *v = v.transform(rotation);
    }
}

// ============================================================
// 测试
// ============================================================
