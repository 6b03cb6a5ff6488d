// crates/pf_foundation/src/scalar.rs

//! 统一标量类型与数值常量
//!
//! 全部几何与系数运算使用双精度。迭代求解器的收敛判据、
//! 残差归一化等处使用这里的小量常量避免除零。
//!
//! # 用法
//!
//! ```
//! use pf_foundation::scalar::{Scalar, SMALL};
//!
//! let x: Scalar = 1.5;
//! assert!(x.abs() > SMALL);
//! ```

use num_traits::Float;

/// 计算用标量类型
pub type Scalar = f64;

/// 小量，用于残差归一化等处避免除零
pub const SMALL: Scalar = 1.0e-15;

/// 极小量，用于距离 / 面积下限保护
pub const VSMALL: Scalar = 1.0e-300;

/// 大量，用于初始化最小值搜索
pub const GREAT: Scalar = 1.0e15;

/// 稳定的平均值计算（空切片返回 0）
#[inline]
pub fn mean(values: &[Scalar]) -> Scalar {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<Scalar>() / values.len() as Scalar
    }
}

/// 限制到闭区间 [lo, hi]
#[inline]
pub fn clamp<S: Float>(x: S, lo: S, hi: S) -> S {
    x.max(lo).min(hi)
}
