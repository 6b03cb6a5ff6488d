// crates/pf_mesh/src/connectivity.rs

//! 网格连接关系主体
//!
//! [`FvMesh`] 持有有限体积离散所需的全部只读拓扑与几何：
//! 内部面的 owner/neighbour 映射、边界 patch 分组、单元体积、
//! 面面积向量，以及构建时一次算好的派生量（delta 系数、插值权重、
//! 单元中心连线向量）。
//!
//! # 面编号约定
//!
//! 全局面编号先排内部面 `0 .. n_internal_faces`，随后按 patch
//! 顺序排边界面。每个内部面满足 `owner < neighbour`，该约定被
//! 矩阵的上/下三角存储直接依赖，构建时强制校验。
//!
//! # 拓扑版本
//!
//! 每个网格实例携带单调递增的版本号。任何缓存了面索引数据的
//! 消费者（矩阵、延迟修正项）在复用前必须比对版本号。

use crate::patch::{MeshPatch, PatchCoupling, PatchSpec};
use glam::DVec3;
use pf_foundation::{PfError, PfResult, Scalar, VSMALL};

/// 有限体积网格（一个分区的局部网格）
#[derive(Debug, Clone)]
pub struct FvMesh {
    n_cells: usize,
    /// 内部面 owner 单元
    owner: Vec<usize>,
    /// 内部面 neighbour 单元
    neighbour: Vec<usize>,
    /// 单元体积
    cell_volumes: Vec<Scalar>,
    /// 单元中心
    cell_centres: Vec<DVec3>,
    /// 面面积向量（内部面在前，边界面按 patch 顺序在后）
    face_areas: Vec<DVec3>,
    /// 面中心（编号同 face_areas）
    face_centres: Vec<DVec3>,
    /// 边界 patch
    patches: Vec<MeshPatch>,
    /// 内部面 delta 系数 1/|d_ON|
    delta_coeffs: Vec<Scalar>,
    /// 内部面 owner 插值权重
    weights: Vec<Scalar>,
    /// 内部面 owner 中心指向 neighbour 中心的向量
    cell_to_cell: Vec<DVec3>,
    /// 拓扑版本号
    topology_version: u64,
}

impl FvMesh {
    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 内部面数
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.owner.len()
    }

    /// 边界面总数
    #[inline]
    pub fn n_boundary_faces(&self) -> usize {
        self.patches.iter().map(|p| p.size()).sum()
    }

    /// 面总数（内部 + 边界）
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.face_areas.len()
    }

    /// 内部面 owner 单元
    #[inline]
    pub fn owner(&self, face: usize) -> usize {
        self.owner[face]
    }

    /// 内部面 neighbour 单元
    #[inline]
    pub fn neighbour(&self, face: usize) -> usize {
        self.neighbour[face]
    }

    /// owner 数组
    #[inline]
    pub fn owners(&self) -> &[usize] {
        &self.owner
    }

    /// neighbour 数组
    #[inline]
    pub fn neighbours(&self) -> &[usize] {
        &self.neighbour
    }

    /// 单元体积
    #[inline]
    pub fn cell_volumes(&self) -> &[Scalar] {
        &self.cell_volumes
    }

    /// 单元中心
    #[inline]
    pub fn cell_centres(&self) -> &[DVec3] {
        &self.cell_centres
    }

    /// 面面积向量（全局面编号）
    #[inline]
    pub fn face_area(&self, face: usize) -> DVec3 {
        self.face_areas[face]
    }

    /// 面面积模（全局面编号）
    #[inline]
    pub fn face_area_mag(&self, face: usize) -> Scalar {
        self.face_areas[face].length()
    }

    /// 面中心（全局面编号）
    #[inline]
    pub fn face_centre(&self, face: usize) -> DVec3 {
        self.face_centres[face]
    }

    /// 边界 patch 列表
    #[inline]
    pub fn patches(&self) -> &[MeshPatch] {
        &self.patches
    }

    /// 按索引取 patch
    #[inline]
    pub fn patch(&self, i: usize) -> &MeshPatch {
        &self.patches[i]
    }

    /// 按名称查找 patch 索引
    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// 内部面 delta 系数 1/|d_ON|
    #[inline]
    pub fn delta_coeffs(&self) -> &[Scalar] {
        &self.delta_coeffs
    }

    /// 内部面 owner 插值权重
    #[inline]
    pub fn weights(&self) -> &[Scalar] {
        &self.weights
    }

    /// 内部面 owner 中心到 neighbour 中心的向量
    #[inline]
    pub fn cell_to_cell(&self) -> &[DVec3] {
        &self.cell_to_cell
    }

    /// 拓扑版本号
    #[inline]
    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    /// 生成拓扑变化后的网格实例（版本号加一）
    ///
    /// 网格运动 / 重划分后由生产者调用；所有基于旧版本缓存的
    /// 面索引数据随之失效。
    pub fn rebuilt(&self) -> Self {
        let mut next = self.clone();
        next.topology_version += 1;
        next
    }
}

// ============================================================
// 构建器
// ============================================================

/// [`FvMesh`] 构建器
///
/// 逐步登记内部面与 patch，`build` 时统一校验并计算派生几何量。
pub struct MeshBuilder {
    n_cells: usize,
    cell_volumes: Vec<Scalar>,
    cell_centres: Vec<DVec3>,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    internal_areas: Vec<DVec3>,
    internal_centres: Vec<DVec3>,
    patch_specs: Vec<PatchSpec>,
    topology_version: u64,
}

impl MeshBuilder {
    /// 创建构建器
    ///
    /// # Panics
    /// - `n_cells == 0`（空网格无意义）
    pub fn new(n_cells: usize) -> Self {
        assert!(n_cells > 0, "单元数必须大于 0");
        Self {
            n_cells,
            cell_volumes: Vec::new(),
            cell_centres: Vec::new(),
            owner: Vec::new(),
            neighbour: Vec::new(),
            internal_areas: Vec::new(),
            internal_centres: Vec::new(),
            patch_specs: Vec::new(),
            topology_version: 0,
        }
    }

    /// 设置单元体积
    pub fn cell_volumes(mut self, volumes: Vec<Scalar>) -> Self {
        self.cell_volumes = volumes;
        self
    }

    /// 设置单元中心
    pub fn cell_centres(mut self, centres: Vec<DVec3>) -> Self {
        self.cell_centres = centres;
        self
    }

    /// 登记一个内部面（面积向量由 owner 指向 neighbour）
    pub fn internal_face(
        mut self,
        owner: usize,
        neighbour: usize,
        area: DVec3,
        centre: DVec3,
    ) -> Self {
        self.owner.push(owner);
        self.neighbour.push(neighbour);
        self.internal_areas.push(area);
        self.internal_centres.push(centre);
        self
    }

    /// 登记一个边界 patch
    pub fn patch(mut self, spec: PatchSpec) -> Self {
        self.patch_specs.push(spec);
        self
    }

    /// 设置初始拓扑版本号
    pub fn topology_version(mut self, version: u64) -> Self {
        self.topology_version = version;
        self
    }

    /// 校验并构建网格
    ///
    /// # 错误
    /// - 体积 / 中心数组长度与单元数不符
    /// - 内部面违反 `owner < neighbour` 约定或索引越界
    /// - 单元体积非正
    /// - patch 面所属单元越界
    /// - cyclic patch 的 partner 越界或两侧面数不一致
    pub fn build(self) -> PfResult<FvMesh> {
        let n = self.n_cells;
        PfError::check_size("cell_volumes", n, self.cell_volumes.len())?;
        PfError::check_size("cell_centres", n, self.cell_centres.len())?;

        for (i, &v) in self.cell_volumes.iter().enumerate() {
            if v <= 0.0 {
                return Err(PfError::invalid_mesh(format!("单元 {i} 体积非正: {v}")));
            }
        }

        for f in 0..self.owner.len() {
            let (o, nb) = (self.owner[f], self.neighbour[f]);
            PfError::check_index("owner", o, n)?;
            PfError::check_index("neighbour", nb, n)?;
            if o >= nb {
                return Err(PfError::invalid_mesh(format!(
                    "内部面 {f} 违反 owner < neighbour 约定: owner={o}, neighbour={nb}"
                )));
            }
        }

        // 内部面派生几何
        let n_internal = self.owner.len();
        let mut delta_coeffs = Vec::with_capacity(n_internal);
        let mut weights = Vec::with_capacity(n_internal);
        let mut cell_to_cell = Vec::with_capacity(n_internal);

        for f in 0..n_internal {
            let co = self.cell_centres[self.owner[f]];
            let cn = self.cell_centres[self.neighbour[f]];
            let fc = self.internal_centres[f];
            let d = cn - co;
            let dist = d.length().max(VSMALL);
            delta_coeffs.push(1.0 / dist);
            cell_to_cell.push(d);

            let df_n = (cn - fc).length();
            let df_o = (fc - co).length();
            weights.push(df_n / (df_o + df_n).max(VSMALL));
        }

        // 边界面与 patch
        let mut face_areas = self.internal_areas;
        let mut face_centres = self.internal_centres;
        let mut patches = Vec::with_capacity(self.patch_specs.len());
        let n_patches = self.patch_specs.len();

        for spec in self.patch_specs.into_iter() {
            let start = face_areas.len();
            let size = spec.faces.len();

            if let Some(ref dc) = spec.delta_coeffs {
                PfError::check_size("patch delta_coeffs", size, dc.len())?;
            }

            if let PatchCoupling::Cyclic { partner, .. } = spec.coupling {
                if partner >= n_patches {
                    return Err(PfError::invalid_mesh(format!(
                        "patch '{}' 的 cyclic partner 索引 {partner} 越界",
                        spec.name
                    )));
                }
            }

            let mut face_cells = Vec::with_capacity(size);
            let mut dc = Vec::with_capacity(size);

            for (local, face) in spec.faces.iter().enumerate() {
                if face.cell >= n {
                    return Err(PfError::invalid_mesh(format!(
                        "patch '{}' 第 {local} 个面所属单元 {} 越界",
                        spec.name, face.cell
                    )));
                }
                face_cells.push(face.cell);
                face_areas.push(face.area);
                face_centres.push(face.centre);

                let coeff = match spec.delta_coeffs {
                    Some(ref d) => d[local],
                    None => {
                        let dist = (face.centre - self.cell_centres[face.cell]).length();
                        1.0 / dist.max(VSMALL)
                    }
                };
                dc.push(coeff);
            }

            // 耦合 patch 的面插值权重取等权，常规 patch 面值即边界值
            let w = if spec.coupling.is_coupled() { 0.5 } else { 1.0 };

            patches.push(MeshPatch {
                name: spec.name,
                coupling: spec.coupling,
                start,
                face_cells,
                delta_coeffs: dc,
                weights: vec![w; size],
            });
        }

        // cyclic 配对面数校验
        for (pi, p) in patches.iter().enumerate() {
            if let PatchCoupling::Cyclic { partner, .. } = p.coupling {
                let q = &patches[partner];
                if q.size() != p.size() {
                    return Err(PfError::invalid_mesh(format!(
                        "cyclic patch '{}' 与 partner '{}' 面数不一致: {} vs {}",
                        p.name,
                        q.name,
                        p.size(),
                        q.size()
                    )));
                }
                if !matches!(q.coupling, PatchCoupling::Cyclic { partner: back, .. } if back == pi)
                {
                    return Err(PfError::invalid_mesh(format!(
                        "cyclic patch '{}' 的 partner '{}' 未回指",
                        p.name, q.name
                    )));
                }
            }
        }

        Ok(FvMesh {
            n_cells: n,
            owner: self.owner,
            neighbour: self.neighbour,
            cell_volumes: self.cell_volumes,
            cell_centres: self.cell_centres,
            face_areas,
            face_centres,
            patches,
            delta_coeffs,
            weights,
            cell_to_cell,
            topology_version: self.topology_version,
        })
    }
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::BoundaryFaceSpec;

    fn two_cell_mesh() -> FvMesh {
        MeshBuilder::new(2)
            .cell_volumes(vec![1.0, 1.0])
            .cell_centres(vec![DVec3::new(0.5, 0.0, 0.0), DVec3::new(1.5, 0.0, 0.0)])
            .internal_face(0, 1, DVec3::X, DVec3::new(1.0, 0.0, 0.0))
            .patch(PatchSpec::regular(
                "left",
                vec![BoundaryFaceSpec {
                    cell: 0,
                    area: -DVec3::X,
                    centre: DVec3::ZERO,
                }],
            ))
            .patch(PatchSpec::regular(
                "right",
                vec![BoundaryFaceSpec {
                    cell: 1,
                    area: DVec3::X,
                    centre: DVec3::new(2.0, 0.0, 0.0),
                }],
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_two_cell_mesh_counts() {
        let mesh = two_cell_mesh();
        assert_eq!(mesh.n_cells(), 2);
        assert_eq!(mesh.n_internal_faces(), 1);
        assert_eq!(mesh.n_boundary_faces(), 2);
        assert_eq!(mesh.n_faces(), 3);
    }

    #[test]
    fn test_derived_geometry() {
        let mesh = two_cell_mesh();
        // 单元中心相距 1 -> delta 系数 1
        assert!((mesh.delta_coeffs()[0] - 1.0).abs() < 1e-14);
        // 面在两中心正中 -> owner 权重 0.5
        assert!((mesh.weights()[0] - 0.5).abs() < 1e-14);
        // 边界面: 单元中心到面中心 0.5 -> delta 系数 2
        assert!((mesh.patch(0).delta_coeffs[0] - 2.0).abs() < 1e-14);
        assert!((mesh.patch(1).delta_coeffs[0] - 2.0).abs() < 1e-14);
    }

    #[test]
    fn test_owner_neighbour_convention_enforced() {
        let result = MeshBuilder::new(2)
            .cell_volumes(vec![1.0, 1.0])
            .cell_centres(vec![DVec3::ZERO, DVec3::X])
            .internal_face(1, 0, DVec3::X, DVec3::new(0.5, 0.0, 0.0))
            .build();
        assert!(matches!(result, Err(PfError::InvalidMesh { .. })));
    }

    #[test]
    fn test_negative_volume_rejected() {
        let result = MeshBuilder::new(1)
            .cell_volumes(vec![-1.0])
            .cell_centres(vec![DVec3::ZERO])
            .build();
        assert!(matches!(result, Err(PfError::InvalidMesh { .. })));
    }

    #[test]
    fn test_patch_lookup() {
        let mesh = two_cell_mesh();
        assert_eq!(mesh.find_patch("left"), Some(0));
        assert_eq!(mesh.find_patch("right"), Some(1));
        assert_eq!(mesh.find_patch("top"), None);
    }

    #[test]
    fn test_rebuilt_bumps_version() {
        let mesh = two_cell_mesh();
        assert_eq!(mesh.topology_version(), 0);
        let moved = mesh.rebuilt();
        assert_eq!(moved.topology_version(), 1);
        assert_eq!(moved.n_cells(), mesh.n_cells());
    }
}
