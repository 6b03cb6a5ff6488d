// crates/pf_fvm/src/boundary/registry.rs

//! 边界条件注册表
//!
//! 配置字符串到构造函数的显式映射，程序启动时一次性填充，
//! 之后只读。避免翻译单元间静态初始化顺序耦合的全局可变表。
//!
//! # 使用示例
//!
//! ```
//! use pf_fvm::boundary::{BcConfig, BcRegistry};
//!
//! let registry: BcRegistry<f64> = BcRegistry::with_defaults();
//! let config: BcConfig = serde_json::from_str(
//!     r#"{ "kind": "fixedValue", "value": [10.0] }"#,
//! ).unwrap();
//! let bc = registry.build("p", "inlet", 4, &config).unwrap();
//! assert_eq!(bc.kind_name(), "fixedValue");
//! ```

use crate::boundary::BoundaryCondition;
use pf_foundation::{FieldValue, PfError, PfResult, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 边界条件配置（serde 字典条目）
///
/// `value` 等均为分量数组（标量 1 个、向量 3 个、张量 9 个分量），
/// 在 patch 内按均匀值展开。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BcConfig {
    /// 条件类别（注册表键）
    pub kind: String,
    /// 给定值分量（fixedValue / mixed 的定值端 / inlet_outlet）
    #[serde(default)]
    pub value: Option<Vec<Scalar>>,
    /// 给定梯度分量（fixedGradient / mixed 的定梯度端）
    #[serde(default)]
    pub gradient: Option<Vec<Scalar>>,
    /// 混合分数（mixed，固定分数）
    #[serde(default)]
    pub fraction: Option<Scalar>,
    /// 按方向切换分数的面标量场名（mixed）
    #[serde(default)]
    pub fraction_source: Option<String>,
}

/// 构造函数签名：配置 + patch 面数 → 条件对象
type BcCtor<T> = fn(&BcConfig, usize) -> PfResult<BoundaryCondition<T>>;

/// 边界条件注册表
pub struct BcRegistry<T: FieldValue> {
    ctors: HashMap<String, BcCtor<T>>,
}

impl<T: FieldValue> BcRegistry<T> {
    /// 空注册表
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// 注册标准条件集的注册表
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register("fixedValue", ctor_fixed_value::<T>);
        reg.register("fixedGradient", ctor_fixed_gradient::<T>);
        reg.register("zeroGradient", ctor_zero_gradient::<T>);
        reg.register("mixed", ctor_mixed::<T>);
        reg.register("inletOutlet", ctor_inlet_outlet::<T>);
        reg.register("processor", ctor_processor::<T>);
        reg.register("cyclic", ctor_cyclic::<T>);
        reg
    }

    /// 注册条件类别
    pub fn register(&mut self, kind: impl Into<String>, ctor: BcCtor<T>) {
        self.ctors.insert(kind.into(), ctor);
    }

    /// 已注册的类别列表（排序后，用于错误信息）
    pub fn known_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.ctors.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }

    /// 按配置构造条件对象
    ///
    /// # 错误
    /// - 未注册的类别
    /// - 缺少该类别必需的参数（错误信息带场名与 patch 名）
    pub fn build(
        &self,
        field: &str,
        patch: &str,
        size: usize,
        config: &BcConfig,
    ) -> PfResult<BoundaryCondition<T>> {
        let ctor = self.ctors.get(&config.kind).ok_or_else(|| {
            PfError::patch_config(
                field,
                patch,
                format!(
                    "未知的边界条件类别 '{}', 已注册: {:?}",
                    config.kind,
                    self.known_kinds()
                ),
            )
        })?;
        ctor(config, size).map_err(|e| match e {
            PfError::Config { message } => PfError::patch_config(field, patch, message),
            other => other,
        })
    }
}

impl<T: FieldValue> Default for BcRegistry<T> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================
// 标准构造函数
// ============================================================

fn required_components<T: FieldValue>(
    field: &Option<Vec<Scalar>>,
    name: &'static str,
) -> PfResult<T> {
    let comps = field
        .as_ref()
        .ok_or_else(|| PfError::config(format!("缺少必需参数 '{name}'")))?;
    if comps.len() != T::N_COMPONENTS {
        return Err(PfError::config(format!(
            "参数 '{name}' 分量数不符: 期望 {}, 实际 {}",
            T::N_COMPONENTS,
            comps.len()
        )));
    }
    Ok(T::from_components(comps))
}

fn ctor_fixed_value<T: FieldValue>(cfg: &BcConfig, size: usize) -> PfResult<BoundaryCondition<T>> {
    let v: T = required_components::<T>(&cfg.value, "value")?;
    Ok(BoundaryCondition::fixed_value_uniform(v, size))
}

fn ctor_fixed_gradient<T: FieldValue>(
    cfg: &BcConfig,
    size: usize,
) -> PfResult<BoundaryCondition<T>> {
    let g: T = required_components::<T>(&cfg.gradient, "gradient")?;
    Ok(BoundaryCondition::fixed_gradient_uniform(g, size))
}

fn ctor_zero_gradient<T: FieldValue>(
    _cfg: &BcConfig,
    size: usize,
) -> PfResult<BoundaryCondition<T>> {
    Ok(BoundaryCondition::zero_gradient(size))
}

fn ctor_mixed<T: FieldValue>(cfg: &BcConfig, size: usize) -> PfResult<BoundaryCondition<T>> {
    let v: T = required_components::<T>(&cfg.value, "value")?;
    let g: T = required_components::<T>(&cfg.gradient, "gradient")?;
    match (&cfg.fraction, &cfg.fraction_source) {
        (Some(f), _) => {
            if !(0.0..=1.0).contains(f) {
                return Err(PfError::config(format!("混合分数 {f} 超出 [0,1]")));
            }
            Ok(BoundaryCondition::mixed(
                vec![v; size],
                vec![g; size],
                vec![*f; size],
            ))
        }
        (None, Some(src)) => Ok(BoundaryCondition::Mixed {
            ref_value: vec![v; size],
            ref_gradient: vec![g; size],
            fraction: vec![1.0; size],
            fraction_source: Some(src.clone()),
        }),
        (None, None) => Err(PfError::config(
            "mixed 需要 'fraction' 或 'fraction_source' 之一",
        )),
    }
}

fn ctor_inlet_outlet<T: FieldValue>(
    cfg: &BcConfig,
    size: usize,
) -> PfResult<BoundaryCondition<T>> {
    let v: T = required_components::<T>(&cfg.value, "value")?;
    let src = cfg
        .fraction_source
        .as_ref()
        .ok_or_else(|| PfError::config("inletOutlet 需要 'fraction_source'（通量场名）"))?;
    Ok(BoundaryCondition::inlet_outlet(v, src.clone(), size))
}

fn ctor_processor<T: FieldValue>(
    _cfg: &BcConfig,
    size: usize,
) -> PfResult<BoundaryCondition<T>> {
    Ok(BoundaryCondition::processor(size))
}

fn ctor_cyclic<T: FieldValue>(_cfg: &BcConfig, size: usize) -> PfResult<BoundaryCondition<T>> {
    Ok(BoundaryCondition::cyclic(size))
}

// ============================================================
// 测试
// ============================================================
