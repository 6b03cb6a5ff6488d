// crates/pf_fvm/src/fields/mod.rs

//! 场容器
//!
//! - [`VolField`]: 体场（单元中心值 + 各 patch 边界面值 + 边界条件对象
//!   + 旧时间层环）
//! - [`SurfaceScalarField`]: 面标量场（通量等）
//! - [`FieldLookup`]: 边界条件更新时跨场查询的最小接口
//!   （如进出流条件按通量方向切换）

pub mod surface;
pub mod volume;

pub use surface::SurfaceScalarField;
pub use volume::VolField;

use pf_foundation::Scalar;
use std::collections::HashMap;

/// 跨场查询接口
///
/// 边界条件更新可能依赖其它场（典型：按通量方向切换的进出流条件）。
/// 查询失败由调用方转化为致命的"缺少场"配置错误，绝不静默取默认值。
pub trait FieldLookup {
    /// 取名为 `field` 的面标量场在 `patch` 上的逐面值
    fn boundary_scalars(&self, field: &str, patch: usize) -> Option<&[Scalar]>;
}

/// 空查询（无跨场依赖的场景）
pub struct NoLookup;

impl FieldLookup for NoLookup {
    fn boundary_scalars(&self, _field: &str, _patch: usize) -> Option<&[Scalar]> {
        None
    }
}

impl FieldLookup for HashMap<String, SurfaceScalarField> {
    fn boundary_scalars(&self, field: &str, patch: usize) -> Option<&[Scalar]> {
        self.get(field).map(|f| f.boundary(patch))
    }
}
