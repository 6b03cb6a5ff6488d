// crates/pf_fvm/src/schemes/mod.rs

//! 离散格式库
//!
//! 每种格式把一个微分算子翻译为矩阵系数贡献（隐式用法）或显式场值
//! （算子作用在已知量上）。全部贡献经 [`crate::matrix::FvMatrix`] 的
//! 可加累加接口进入同一系统，格式之间互不知晓。
//!
//! # 格式一览
//!
//! - [`ddt`](ddt::ddt): 时间导数（一阶 Euler / 二阶 Backward）
//! - [`div`](divergence::div): 对流（上风 / 线性 / 带延迟修正的线性上风）
//! - [`laplacian`](laplacian::laplacian): 扩散（正交 / 带非正交显式修正）
//! - [`grad`](gradient::grad_scalar): Green-Gauss 梯度（显式）
//! - [`sp`](source::sp) / [`su`](source::su): 隐式 / 显式源项
//!
//! # 符号约定
//!
//! 矩阵表示 `A·ψ − b`，全部项之和为零。隐式项贡献系数，显式项
//! 贡献右端项。延迟修正格式（线性上风、非正交修正）把一阶 / 正交
//! 部分放进矩阵，把修正量放进右端项，两部分取自同一梯度快照。

pub mod ddt;
pub mod divergence;
pub mod gradient;
pub mod laplacian;
pub mod source;

pub use ddt::ddt;
pub use divergence::{div, div_explicit};
pub use gradient::{component_gradients, grad_scalar, grad_vector};
pub use laplacian::{laplacian, laplacian_field};
pub use source::{sp, su, su_sp};

use serde::{Deserialize, Serialize};

/// 时间导数格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DdtScheme {
    /// 一阶隐式 Euler（一层旧时间）
    Euler,
    /// 二阶向后差分（两层旧时间，首步自动退化）
    Backward,
}

/// 对流格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivScheme {
    /// 一阶上风：通量 ≥ 0 时 owner 为施主（零通量平局归 owner，保证可复现）
    Upwind,
    /// 线性（中心）插值
    Linear,
    /// 线性上风：隐式上风 + 显式梯度重构修正（延迟修正）
    LinearUpwind,
}

/// 扩散格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaplacianScheme {
    /// 仅正交部分（正交网格上即精确）
    Orthogonal,
    /// 正交隐式 + 非正交显式修正（保持隐式部分对角占优）
    Corrected,
}

/// 离散格式选择（配置字典）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FvSchemes {
    /// 时间导数格式
    pub ddt: DdtScheme,
    /// 对流格式
    pub div: DivScheme,
    /// 扩散格式
    pub laplacian: LaplacianScheme,
}

impl Default for FvSchemes {
    fn default() -> Self {
        Self {
            ddt: DdtScheme::Euler,
            div: DivScheme::Upwind,
            laplacian: LaplacianScheme::Corrected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemes_serde_roundtrip() {
        let s = FvSchemes {
            ddt: DdtScheme::Backward,
            div: DivScheme::LinearUpwind,
            laplacian: LaplacianScheme::Orthogonal,
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: FvSchemes = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ddt, DdtScheme::Backward);
        assert_eq!(back.div, DivScheme::LinearUpwind);
        assert_eq!(back.laplacian, LaplacianScheme::Orthogonal);
    }

    #[test]
    fn test_default_schemes() {
        let s = FvSchemes::default();
        assert_eq!(s.ddt, DdtScheme::Euler);
        assert_eq!(s.div, DivScheme::Upwind);
    }
}
