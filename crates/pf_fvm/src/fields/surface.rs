// crates/pf_fvm/src/fields/surface.rs

//! 面标量场
//!
//! 存储每个内部面与每个边界面（按 patch 分组）的标量，典型用途是
//! 对流离散消费的体积通量 `F = U_f·S_f`。

use crate::fields::volume::VolField;
use glam::DVec3;
use pf_foundation::Scalar;
use pf_mesh::FvMesh;
use std::sync::Arc;

/// 面标量场
#[derive(Debug, Clone)]
pub struct SurfaceScalarField {
    mesh: Arc<FvMesh>,
    internal: Vec<Scalar>,
    boundary: Vec<Vec<Scalar>>,
}

impl SurfaceScalarField {
    /// 全零场
    pub fn zeros(mesh: Arc<FvMesh>) -> Self {
        let internal = vec![0.0; mesh.n_internal_faces()];
        let boundary = mesh.patches().iter().map(|p| vec![0.0; p.size()]).collect();
        Self {
            mesh,
            internal,
            boundary,
        }
    }

    /// 由速度场插值生成体积通量 `F = U_f·S_f`
    ///
    /// 内部面按网格线性权重插值，边界面取边界面值。
    pub fn from_velocity(u: &VolField<DVec3>) -> Self {
        let mesh = u.mesh_arc();
        let mut flux = Self::zeros(Arc::clone(&mesh));

        let w = mesh.weights();
        for f in 0..mesh.n_internal_faces() {
            let uo = u.internal()[mesh.owner(f)];
            let un = u.internal()[mesh.neighbour(f)];
            let uf = uo * w[f] + un * (1.0 - w[f]);
            flux.internal[f] = uf.dot(mesh.face_area(f));
        }

        for (pi, patch) in mesh.patches().iter().enumerate() {
            let values = u.patch_values(pi);
            for local in 0..patch.size() {
                let sf = mesh.face_area(patch.global_face(local));
                flux.boundary[pi][local] = values[local].dot(sf);
            }
        }

        flux
    }

    /// 所属网格
    #[inline]
    pub fn mesh(&self) -> &FvMesh {
        &self.mesh
    }

    /// 内部面值
    #[inline]
    pub fn internal(&self) -> &[Scalar] {
        &self.internal
    }

    /// 内部面值（可变）
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [Scalar] {
        &mut self.internal
    }

    /// patch 边界面值
    #[inline]
    pub fn boundary(&self, patch: usize) -> &[Scalar] {
        &self.boundary[patch]
    }

    /// patch 边界面值（可变）
    #[inline]
    pub fn boundary_mut(&mut self, patch: usize) -> &mut [Scalar] {
        &mut self.boundary[patch]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryCondition;
    use pf_mesh::generation::line_mesh;

    #[test]
    fn test_zeros_shape() {
        let mesh = Arc::new(line_mesh(3, 1.0).unwrap());
        let flux = SurfaceScalarField::zeros(Arc::clone(&mesh));
        assert_eq!(flux.internal().len(), 2);
        assert_eq!(flux.boundary(0).len(), 1);
        assert_eq!(flux.boundary(1).len(), 1);
    }

    #[test]
    fn test_from_uniform_velocity() {
        let mesh = Arc::new(line_mesh(3, 1.0).unwrap());
        let u = VolField::uniform(
            "U",
            Arc::clone(&mesh),
            DVec3::X,
            vec![
                BoundaryCondition::fixed_value_uniform(DVec3::X, 1),
                BoundaryCondition::fixed_value_uniform(DVec3::X, 1),
            ],
        )
        .unwrap();

        let flux = SurfaceScalarField::from_velocity(&u);
        // 内部面面积 +x, |S|=1 -> F = 1
        for &f in flux.internal() {
            assert!((f - 1.0).abs() < 1e-14);
        }
        // 左边界面面积 -x -> F = -1（入流），右边界面 +x -> F = 1（出流）
        assert!((flux.boundary(0)[0] + 1.0).abs() < 1e-14);
        assert!((flux.boundary(1)[0] - 1.0).abs() < 1e-14);
    }
}
