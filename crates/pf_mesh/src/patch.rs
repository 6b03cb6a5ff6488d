// crates/pf_mesh/src/patch.rs

//! 边界 patch 描述类型
//!
//! patch 是边界面的有序分组。几何与拓扑信息在本层，
//! 边界条件语义（定值 / 定梯度 / 混合等）属于上层 fvm crate。
//!
//! # 耦合类别
//!
//! - [`PatchCoupling::None`]: 常规物理边界
//! - [`PatchCoupling::Processor`]: 分区间耦合面，需要 halo 交换
//! - [`PatchCoupling::Cyclic`]: 同一网格内的周期配对 patch，
//!   可携带作用于向量 / 张量的旋转变换

use glam::{DMat3, DVec3};
use pf_foundation::Scalar;

/// patch 耦合类别
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatchCoupling {
    /// 常规物理边界
    None,
    /// 分区间耦合（processor patch）
    Processor {
        /// 对方分区 rank
        peer: usize,
        /// 通信标签（两侧必须一致）
        tag: u32,
    },
    /// 周期边界，partner 为同一网格内配对 patch 的索引
    Cyclic {
        /// 配对 patch 索引
        partner: usize,
        /// 传输向量 / 张量时应用的旋转（None 表示纯平移周期）
        rotation: Option<DMat3>,
    },
}

impl PatchCoupling {
    /// 是否为耦合 patch（processor 或 cyclic）
    #[inline]
    pub fn is_coupled(&self) -> bool {
        !matches!(self, PatchCoupling::None)
    }
}

/// 构建期的单个边界面描述
#[derive(Debug, Clone, Copy)]
pub struct BoundaryFaceSpec {
    /// 所属单元索引
    pub cell: usize,
    /// 面面积向量（指向域外）
    pub area: DVec3,
    /// 面中心
    pub centre: DVec3,
}

/// 构建期的 patch 描述
#[derive(Debug, Clone)]
pub struct PatchSpec {
    /// patch 名称
    pub name: String,
    /// 耦合类别
    pub coupling: PatchCoupling,
    /// 边界面列表（顺序即 patch 内局部面编号）
    pub faces: Vec<BoundaryFaceSpec>,
    /// delta 系数覆盖值（1/距离）
    ///
    /// 常规 patch 留 None 时由单元中心到面中心的距离计算；
    /// processor patch 必须给出本单元中心到远端单元中心的全距离系数
    /// （分解器在分解时掌握两侧几何）。
    pub delta_coeffs: Option<Vec<Scalar>>,
}

impl PatchSpec {
    /// 常规物理边界 patch
    pub fn regular(name: impl Into<String>, faces: Vec<BoundaryFaceSpec>) -> Self {
        Self {
            name: name.into(),
            coupling: PatchCoupling::None,
            faces,
            delta_coeffs: None,
        }
    }

    /// 分区间耦合 patch
    pub fn processor(
        name: impl Into<String>,
        faces: Vec<BoundaryFaceSpec>,
        peer: usize,
        tag: u32,
        delta_coeffs: Vec<Scalar>,
    ) -> Self {
        Self {
            name: name.into(),
            coupling: PatchCoupling::Processor { peer, tag },
            faces,
            delta_coeffs: Some(delta_coeffs),
        }
    }

    /// 周期 patch
    pub fn cyclic(
        name: impl Into<String>,
        faces: Vec<BoundaryFaceSpec>,
        partner: usize,
        rotation: Option<DMat3>,
        delta_coeffs: Vec<Scalar>,
    ) -> Self {
        Self {
            name: name.into(),
            coupling: PatchCoupling::Cyclic { partner, rotation },
            faces,
            delta_coeffs: Some(delta_coeffs),
        }
    }
}

/// 构建完成的边界 patch
///
/// 面的全局编号为 `start .. start + size`，与 `face_cells`、
/// `delta_coeffs`、`weights` 的局部编号一一对应。
#[derive(Debug, Clone)]
pub struct MeshPatch {
    /// patch 名称
    pub name: String,
    /// 耦合类别
    pub coupling: PatchCoupling,
    /// 首个边界面的全局面编号
    pub start: usize,
    /// 每个局部面所属的单元
    pub face_cells: Vec<usize>,
    /// 每个局部面的 delta 系数（1/距离）
    pub delta_coeffs: Vec<Scalar>,
    /// 每个局部面的内侧插值权重（耦合 patch 用于面插值）
    pub weights: Vec<Scalar>,
}

impl MeshPatch {
    /// patch 内面数
    #[inline]
    pub fn size(&self) -> usize {
        self.face_cells.len()
    }

    /// 是否为耦合 patch
    #[inline]
    pub fn is_coupled(&self) -> bool {
        self.coupling.is_coupled()
    }

    /// 局部面编号转全局面编号
    #[inline]
    pub fn global_face(&self, local: usize) -> usize {
        self.start + local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupling_classification() {
        assert!(!PatchCoupling::None.is_coupled());
        assert!(PatchCoupling::Processor { peer: 1, tag: 7 }.is_coupled());
        assert!(PatchCoupling::Cyclic {
            partner: 0,
            rotation: None
        }
        .is_coupled());
    }

    #[test]
    fn test_global_face_numbering() {
        let patch = MeshPatch {
            name: "wall".into(),
            coupling: PatchCoupling::None,
            start: 10,
            face_cells: vec![0, 1, 2],
            delta_coeffs: vec![2.0; 3],
            weights: vec![1.0; 3],
        };
        assert_eq!(patch.size(), 3);
        assert_eq!(patch.global_face(2), 12);
    }
}
