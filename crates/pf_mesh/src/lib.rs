// crates/pf_mesh/src/lib.rs

//! PolyFV 网格层
//!
//! 提供有限体积核心所需的只读网格连接关系：
//! - owner/neighbour 面-单元映射（内部面），约定 owner 索引 < neighbour 索引
//! - 边界 patch 分组（常规 / 进程间耦合 / 周期）
//! - 单元体积、面面积向量及派生几何量（delta 系数、插值权重）
//! - 单调递增的拓扑版本号，供面索引缓存做一致性检查
//!
//! 网格在一个时间步内不可变；拓扑变化（运动 / 加密 / 重划分）
//! 产生一个版本号加一的新网格实例。
//!
//! # 模块概览
//!
//! - [`patch`]: 边界 patch 描述类型
//! - [`connectivity`]: [`FvMesh`] 主体与构建器
//! - [`generation`]: 测试 / 演示用小网格生成器

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connectivity;
pub mod generation;
pub mod patch;

pub use connectivity::{FvMesh, MeshBuilder};
pub use generation::{line_mesh, line_mesh_partition};
pub use patch::{BoundaryFaceSpec, MeshPatch, PatchCoupling, PatchSpec};
