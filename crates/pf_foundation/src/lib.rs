// crates/pf_foundation/src/lib.rs

//! PolyFV Foundation Layer
//!
//! 基础层，提供整个工作区的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型
//! - [`scalar`]: 标量类型别名与数值常量
//! - [`value`]: 场值抽象（标量 / 三维向量 / 3×3 张量）
//!
//! # 设计原则
//!
//! 1. **最小依赖**: 仅依赖 glam、num-traits 和 thiserror
//! 2. **类型安全**: 场值类型在编译期确定分量数
//! 3. **零开销抽象**: release 模式下与裸 f64 运算等价

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod scalar;
pub mod value;

pub use error::{PfError, PfResult};
pub use scalar::{Scalar, GREAT, SMALL, VSMALL};
pub use value::FieldValue;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{PfError, PfResult};
    pub use crate::scalar::{Scalar, GREAT, SMALL, VSMALL};
    pub use crate::value::FieldValue;
}
