// crates/pf_fvm/src/matrix/mod.rs

//! 稀疏矩阵组装引擎
//!
//! [`FvMatrix`] 持有一个场的离散方程：对角系数、按内部面编号的
//! 上 / 下三角系数（对称矩阵只存上三角）、右端项，以及每个 patch 的
//! 内部 / 边界系数。独立的离散项（对流、扩散、源、时间导数）以
//! 可加方式累入同一矩阵，累加顺序不影响结果（浮点舍入除外）。
//!
//! # 求解语义
//!
//! `solve` 按分量构建"可解系统"：对角加上全部 patch 的内部系数，
//! 右端项加上非耦合 patch 的边界系数；耦合 patch（processor /
//! cyclic）的边界系数成为线性求解器的界面系数，乘以邻侧值隐式参与
//! 求解。构建不修改存储的矩阵系数，随后的
//! [`residual`](FvMatrix::residual) 在同一套系数上重算。
//!
//! # 松弛
//!
//! [`relax`](FvMatrix::relax) 先按行外系数绝对值和兜底对角，再除以
//! 松弛因子，并以 `(D_new − D_old)·ψ` 补偿右端项；因子 ≥ 1 时为
//! 严格空操作。未松弛的对角与右端项在矩阵内显式留存，
//! `residual` 始终基于未松弛算子。
//!
//! # 方程生命周期
//!
//! 每次求解构造一个矩阵实例，被一个或多个离散项填充，被 `solve`
//! 消费一次后丢弃。跨拓扑变化复用矩阵是致命错误（版本号校验）。

use crate::comm::CommContext;
use crate::fields::VolField;
use crate::linalg::{
    solve_system, InterfaceKind, LduSystem, SolverControls, SolverInterface,
    SolverPerformance,
};
use pf_foundation::{FieldValue, PfError, PfResult, Scalar};
use pf_mesh::{FvMesh, PatchCoupling};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::sync::Arc;

/// 松弛前的系数快照
#[derive(Debug, Clone)]
struct Unrelaxed<T: FieldValue> {
    diag: Vec<Scalar>,
    source: Vec<T>,
}

/// 一个场的离散线性系统
#[derive(Debug, Clone)]
pub struct FvMatrix<T: FieldValue> {
    mesh: Arc<FvMesh>,
    topo_version: u64,
    field_name: String,
    diag: Vec<Scalar>,
    upper: Vec<Scalar>,
    /// 非对称矩阵才物化下三角；None 表示 lower == upper
    lower: Option<Vec<Scalar>>,
    source: Vec<T>,
    /// 各 patch 的内部系数（求解时并入对角）
    internal_coeffs: Vec<Vec<T>>,
    /// 各 patch 的边界系数（非耦合并入右端项，耦合成为界面系数）
    boundary_coeffs: Vec<Vec<T>>,
    /// 松弛前快照（relax 首次生效时建立）
    unrelaxed: Option<Box<Unrelaxed<T>>>,
}

impl<T: FieldValue> FvMatrix<T> {
    /// 为场创建零矩阵
    pub fn for_field(psi: &VolField<T>) -> Self {
        let mesh = psi.mesh_arc();
        let n = mesh.n_cells();
        let nf = mesh.n_internal_faces();
        let internal_coeffs = mesh
            .patches()
            .iter()
            .map(|p| vec![T::zero(); p.size()])
            .collect();
        let boundary_coeffs = mesh
            .patches()
            .iter()
            .map(|p| vec![T::zero(); p.size()])
            .collect();
        Self {
            topo_version: psi.topology_version(),
            field_name: psi.name().to_string(),
            diag: vec![0.0; n],
            upper: vec![0.0; nf],
            lower: None,
            source: vec![T::zero(); n],
            internal_coeffs,
            boundary_coeffs,
            mesh,
            unrelaxed: None,
        }
    }

    // ========================================================
    // 访问（离散格式的组装接口）
    // ========================================================

    /// 被求解场名
    #[inline]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// 所属网格
    #[inline]
    pub fn mesh(&self) -> &FvMesh {
        &self.mesh
    }

    /// 对角系数
    #[inline]
    pub fn diag(&self) -> &[Scalar] {
        &self.diag
    }

    /// 对角系数（可变）
    #[inline]
    pub fn diag_mut(&mut self) -> &mut [Scalar] {
        &mut self.diag
    }

    /// 上三角系数
    #[inline]
    pub fn upper(&self) -> &[Scalar] {
        &self.upper
    }

    /// 上三角系数（可变）
    #[inline]
    pub fn upper_mut(&mut self) -> &mut [Scalar] {
        &mut self.upper
    }

    /// 下三角系数（对称矩阵与上三角同值）
    #[inline]
    pub fn lower(&self) -> &[Scalar] {
        self.lower.as_deref().unwrap_or(&self.upper)
    }

    /// 下三角系数（可变；首次调用时从上三角物化）
    pub fn lower_mut(&mut self) -> &mut [Scalar] {
        if self.lower.is_none() {
            self.lower = Some(self.upper.clone());
        }
        self.lower.as_mut().expect("下三角刚物化")
    }

    /// 矩阵是否对称（未物化下三角）
    #[inline]
    pub fn is_symmetric(&self) -> bool {
        self.lower.is_none()
    }

    /// 右端项
    #[inline]
    pub fn source(&self) -> &[T] {
        &self.source
    }

    /// 右端项（可变）
    #[inline]
    pub fn source_mut(&mut self) -> &mut [T] {
        &mut self.source
    }

    /// patch 内部系数（可变）
    #[inline]
    pub fn internal_coeffs_mut(&mut self, patch: usize) -> &mut [T] {
        &mut self.internal_coeffs[patch]
    }

    /// patch 边界系数（可变）
    #[inline]
    pub fn boundary_coeffs_mut(&mut self, patch: usize) -> &mut [T] {
        &mut self.boundary_coeffs[patch]
    }

    /// patch 内部系数
    #[inline]
    pub fn internal_coeffs(&self, patch: usize) -> &[T] {
        &self.internal_coeffs[patch]
    }

    /// patch 边界系数
    #[inline]
    pub fn boundary_coeffs(&self, patch: usize) -> &[T] {
        &self.boundary_coeffs[patch]
    }

    // ========================================================
    // 累加
    // ========================================================

    /// 累入另一离散项（与 `+=` 等价的命名接口）
    ///
    /// # Panics
    /// - 两矩阵的网格 / 场 / 拓扑版本不一致（程序逻辑错误，立即中止）
    pub fn accumulate(&mut self, term: FvMatrix<T>) {
        *self += term;
    }

    fn assert_compatible(&self, other: &FvMatrix<T>) {
        assert!(
            Arc::ptr_eq(&self.mesh, &other.mesh),
            "场 '{}' 的离散项建立在不同网格上，拒绝累加",
            self.field_name
        );
        assert_eq!(
            self.field_name, other.field_name,
            "不同场的离散项不可累加: '{}' vs '{}'",
            self.field_name, other.field_name
        );
        assert_eq!(
            self.topo_version, other.topo_version,
            "场 '{}' 的离散项跨拓扑版本累加: {} vs {}",
            self.field_name, self.topo_version, other.topo_version
        );
        assert!(
            self.unrelaxed.is_none() && other.unrelaxed.is_none(),
            "场 '{}' 的矩阵已松弛，不可再累加离散项",
            self.field_name
        );
    }

    // ========================================================
    // 数值操作
    // ========================================================

    /// 隐式欠松弛
    ///
    /// 因子 ∈ (0,1)：对角先按行外系数绝对值和（含耦合界面系数）兜底，
    /// 再除以因子；右端项以 `(D_new − D_old)·ψ` 补偿。因子 ≥ 1 时
    /// 严格不改变矩阵。未松弛系数留存于矩阵内部供残差计算。
    ///
    /// # Panics
    /// - `factor <= 0`
    pub fn relax(&mut self, psi: &VolField<T>, factor: Scalar) {
        assert!(factor > 0.0, "松弛因子必须为正: {factor}");
        if factor >= 1.0 {
            return;
        }

        if self.unrelaxed.is_none() {
            self.unrelaxed = Some(Box::new(Unrelaxed {
                diag: self.diag.clone(),
                source: self.source.clone(),
            }));
        }

        let n = self.mesh.n_cells();
        let mut sum_off = vec![0.0; n];
        let lower = self.lower.as_deref().unwrap_or(&self.upper);
        for f in 0..self.upper.len() {
            sum_off[self.mesh.owner(f)] += self.upper[f].abs();
            sum_off[self.mesh.neighbour(f)] += lower[f].abs();
        }
        for (pi, patch) in self.mesh.patches().iter().enumerate() {
            if patch.is_coupled() {
                for (local, &cell) in patch.face_cells.iter().enumerate() {
                    sum_off[cell] += self.boundary_coeffs[pi][local].cmpt_mag().cmpt_av();
                }
            }
        }

        for c in 0..n {
            let d0 = self.diag[c];
            let floored = d0.abs().max(sum_off[c]);
            let d_new = if d0 < 0.0 { -floored } else { floored } / factor;
            self.diag[c] = d_new;
            self.source[c] = self.source[c] + psi.internal()[c] * (d_new - d0);
        }
    }

    /// 钉定参考值（对加性常数奇异的系统）
    ///
    /// `cell` 为本分区局部单元时生效：右端项加 `D·value`、对角翻倍；
    /// 非持有分区传 `None`，为安全空操作（并行下恰好一个分区钉定）。
    pub fn set_reference(&mut self, cell: Option<usize>, value: T) -> PfResult<()> {
        let Some(c) = cell else {
            return Ok(());
        };
        PfError::check_index("Cell", c, self.diag.len())?;

        let d = self.diag[c];
        self.source[c] = self.source[c] + value * d;
        self.diag[c] += d;

        // 残差须反映实际求解的算子，快照同步钉定
        if let Some(u) = self.unrelaxed.as_mut() {
            let du = u.diag[c];
            u.source[c] = u.source[c] + value * du;
            u.diag[c] += du;
        }
        Ok(())
    }

    /// 对角算子 A = (D + Σ patch 内部系数) / V
    pub fn a_diag(&self) -> Vec<Scalar> {
        let vols = self.mesh.cell_volumes();
        let mut a = self.diag.clone();
        for (pi, patch) in self.mesh.patches().iter().enumerate() {
            for (local, &cell) in patch.face_cells.iter().enumerate() {
                a[cell] += self.internal_coeffs[pi][local].cmpt_av();
            }
        }
        for c in 0..a.len() {
            a[c] /= vols[c];
        }
        a
    }

    /// 显式算子 H = (b − 行外系数·ψ邻) / V
    ///
    /// 压力修正类算法用于构造派生显式场。耦合 patch 经当前 halo
    /// 缓存计入邻侧贡献。
    pub fn h(&self, psi: &VolField<T>) -> PfResult<Vec<T>> {
        self.check_field(psi)?;
        let n = self.mesh.n_cells();
        let mut h = self.source.clone();

        let lower = self.lower.as_deref().unwrap_or(&self.upper);
        for f in 0..self.upper.len() {
            let o = self.mesh.owner(f);
            let nb = self.mesh.neighbour(f);
            h[o] = h[o] - psi.internal()[nb] * self.upper[f];
            h[nb] = h[nb] - psi.internal()[o] * lower[f];
        }

        for (pi, patch) in self.mesh.patches().iter().enumerate() {
            if patch.is_coupled() {
                let remote = psi
                    .condition(pi)
                    .neighbour_values()
                    .ok_or_else(|| {
                        PfError::patch_config(
                            &self.field_name,
                            &patch.name,
                            "耦合 patch 缺少邻侧缓存",
                        )
                    })?;
                for (local, &cell) in patch.face_cells.iter().enumerate() {
                    h[cell] =
                        h[cell] + self.boundary_coeffs[pi][local].cmpt_mul(&remote[local]);
                }
            } else {
                for (local, &cell) in patch.face_cells.iter().enumerate() {
                    h[cell] = h[cell] + self.boundary_coeffs[pi][local];
                }
            }
        }

        let vols = self.mesh.cell_volumes();
        for c in 0..n {
            h[c] = h[c] * (1.0 / vols[c]);
        }
        Ok(h)
    }

    /// 系数算子 H1 = (−Σ 行外系数 + Σ 耦合界面系数均值) / V
    pub fn h1(&self) -> Vec<Scalar> {
        let n = self.mesh.n_cells();
        let mut h1 = vec![0.0; n];

        let lower = self.lower.as_deref().unwrap_or(&self.upper);
        for f in 0..self.upper.len() {
            h1[self.mesh.owner(f)] -= self.upper[f];
            h1[self.mesh.neighbour(f)] -= lower[f];
        }

        for (pi, patch) in self.mesh.patches().iter().enumerate() {
            if patch.is_coupled() {
                for (local, &cell) in patch.face_cells.iter().enumerate() {
                    h1[cell] += self.boundary_coeffs[pi][local].cmpt_av();
                }
            }
        }

        let vols = self.mesh.cell_volumes();
        for c in 0..n {
            h1[c] /= vols[c];
        }
        h1
    }

    /// 由组装系数重构面通量
    ///
    /// 返回（内部面通量, 各 patch 边界面通量）。
    pub fn face_flux(&self, psi: &VolField<T>) -> PfResult<(Vec<T>, Vec<Vec<T>>)> {
        self.check_field(psi)?;

        let lower = self.lower.as_deref().unwrap_or(&self.upper);
        let mut internal = Vec::with_capacity(self.upper.len());
        for f in 0..self.upper.len() {
            let o = self.mesh.owner(f);
            let nb = self.mesh.neighbour(f);
            internal.push(psi.internal()[nb] * self.upper[f] - psi.internal()[o] * lower[f]);
        }

        let mut boundary = Vec::with_capacity(self.mesh.patches().len());
        for (pi, patch) in self.mesh.patches().iter().enumerate() {
            let mut flux = Vec::with_capacity(patch.size());
            let remote = psi.condition(pi).neighbour_values();
            for (local, &cell) in patch.face_cells.iter().enumerate() {
                let implicit =
                    self.internal_coeffs[pi][local].cmpt_mul(&psi.internal()[cell]);
                let explicit = match remote {
                    Some(r) if patch.is_coupled() => {
                        self.boundary_coeffs[pi][local].cmpt_mul(&r[local])
                    }
                    _ => self.boundary_coeffs[pi][local],
                };
                flux.push(implicit - explicit);
            }
            boundary.push(flux);
        }
        Ok((internal, boundary))
    }

    // ========================================================
    // 求解与残差
    // ========================================================

    /// 组装边界贡献并派发线性求解，解写回场，随后修正边界条件
    ///
    /// 每个分量一次标量求解，返回逐分量性能诊断。数值不收敛只产生
    /// 警告日志，不是错误。
    ///
    /// # 错误
    /// - 场 / 网格 / 拓扑版本不匹配
    /// - 存在未更新（Stale）的边界 patch
    /// - 向量 / 张量场遇到带旋转的隐式周期界面
    pub fn solve(
        &mut self,
        psi: &mut VolField<T>,
        controls: &SolverControls,
        ctx: &CommContext,
    ) -> PfResult<Vec<SolverPerformance>> {
        self.check_field(psi)?;

        for (pi, patch) in self.mesh.patches().iter().enumerate() {
            if !psi.patch_updated(pi) {
                return Err(PfError::patch_config(
                    &self.field_name,
                    &patch.name,
                    "边界条件未更新，求解前必须调用 update_boundary_conditions",
                ));
            }
        }

        let mut performances = Vec::with_capacity(T::N_COMPONENTS);

        for cmpt in 0..T::N_COMPONENTS {
            let sys = self.solvable_system(cmpt, false)?;
            let mut x: Vec<Scalar> =
                psi.internal().iter().map(|v| v.component(cmpt)).collect();

            let label = if T::N_COMPONENTS == 1 {
                self.field_name.clone()
            } else {
                format!("{}[{cmpt}]", self.field_name)
            };

            let perf = solve_system(&sys, &mut x, controls, &label, ctx)?;
            perf.log();

            for (c, v) in psi.internal_mut().iter_mut().enumerate() {
                v.set_component(cmpt, x[c]);
            }
            performances.push(perf);
        }

        psi.correct_boundary_conditions(ctx)?;
        Ok(performances)
    }

    /// 未松弛算子的归一化残差 `|b − A·ψ|`（逐分量）
    ///
    /// 边界贡献瞬态重加，存储的系数不被修改；若发生过松弛，
    /// 使用松弛前留存的对角与右端项。
    pub fn residual(&self, psi: &VolField<T>, ctx: &CommContext) -> PfResult<Vec<Scalar>> {
        self.check_field(psi)?;
        let mut out = Vec::with_capacity(T::N_COMPONENTS);
        for cmpt in 0..T::N_COMPONENTS {
            let sys = self.solvable_system(cmpt, true)?;
            let x: Vec<Scalar> = psi.internal().iter().map(|v| v.component(cmpt)).collect();
            let nf = sys.norm_factor(&x, ctx)?;
            out.push(sys.residual_norm(&x, nf, ctx)?);
        }
        Ok(out)
    }

    /// 构建某分量的可解系统（纯函数式，不修改存储系数）
    fn solvable_system(&self, cmpt: usize, use_unrelaxed: bool) -> PfResult<LduSystem<'_>> {
        let (diag_src, source_src) = match (&self.unrelaxed, use_unrelaxed) {
            (Some(u), true) => (&u.diag, &u.source),
            _ => (&self.diag, &self.source),
        };

        let mut diag = diag_src.clone();
        let mut b: Vec<Scalar> = source_src.iter().map(|s| s.component(cmpt)).collect();
        let mut interfaces = Vec::new();

        for (pi, patch) in self.mesh.patches().iter().enumerate() {
            for (local, &cell) in patch.face_cells.iter().enumerate() {
                diag[cell] += self.internal_coeffs[pi][local].component(cmpt);
            }

            match patch.coupling {
                PatchCoupling::None => {
                    for (local, &cell) in patch.face_cells.iter().enumerate() {
                        b[cell] += self.boundary_coeffs[pi][local].component(cmpt);
                    }
                }
                PatchCoupling::Processor { peer, tag } => {
                    interfaces.push(SolverInterface {
                        patch: pi,
                        kind: InterfaceKind::Processor { peer, tag },
                        face_cells: patch.face_cells.clone(),
                        coeffs: self.boundary_coeffs[pi]
                            .iter()
                            .map(|c| c.component(cmpt))
                            .collect(),
                    });
                }
                PatchCoupling::Cyclic { partner, rotation } => {
                    if rotation.is_some() && T::N_COMPONENTS > 1 {
                        return Err(PfError::patch_config(
                            &self.field_name,
                            &patch.name,
                            "带旋转的周期界面的隐式耦合仅支持标量场",
                        ));
                    }
                    interfaces.push(SolverInterface {
                        patch: pi,
                        kind: InterfaceKind::Cyclic {
                            partner_cells: self.mesh.patch(partner).face_cells.clone(),
                        },
                        face_cells: patch.face_cells.clone(),
                        coeffs: self.boundary_coeffs[pi]
                            .iter()
                            .map(|c| c.component(cmpt))
                            .collect(),
                    });
                }
            }
        }

        Ok(LduSystem {
            n_cells: self.mesh.n_cells(),
            owner: self.mesh.owners(),
            neighbour: self.mesh.neighbours(),
            diag,
            upper: self.upper.clone(),
            lower: self.lower.clone().unwrap_or_else(|| self.upper.clone()),
            source: b,
            interfaces,
        })
    }

    /// 矩阵与被求解场的一致性检查
    fn check_field(&self, psi: &VolField<T>) -> PfResult<()> {
        if psi.name() != self.field_name {
            return Err(PfError::config(format!(
                "矩阵为场 '{}' 组装，不能求解场 '{}'",
                self.field_name,
                psi.name()
            )));
        }
        if !Arc::ptr_eq(&self.mesh, &psi.mesh_arc()) {
            return Err(PfError::config(format!(
                "场 '{}' 的矩阵与场使用不同网格实例",
                self.field_name
            )));
        }
        let current = self.mesh.topology_version();
        if self.topo_version != current || psi.topology_version() != current {
            return Err(PfError::topology_mismatch(
                format!("场 '{}' 的矩阵", self.field_name),
                self.topo_version,
                current,
            ));
        }
        Ok(())
    }
}

// ============================================================
// 可加运算
// ============================================================

impl<T: FieldValue> AddAssign for FvMatrix<T> {
    fn add_assign(&mut self, rhs: FvMatrix<T>) {
        self.assert_compatible(&rhs);

        for (a, b) in self.diag.iter_mut().zip(rhs.diag.iter()) {
            *a += b;
        }
        for (a, b) in self.source.iter_mut().zip(rhs.source.iter()) {
            *a = *a + *b;
        }

        // 任一侧非对称则两侧都物化下三角
        if self.lower.is_some() || rhs.lower.is_some() {
            let lower = self.lower_mut();
            let rhs_lower = rhs.lower.as_deref().unwrap_or(&rhs.upper);
            for (a, b) in lower.iter_mut().zip(rhs_lower.iter()) {
                *a += b;
            }
        }
        for (a, b) in self.upper.iter_mut().zip(rhs.upper.iter()) {
            *a += b;
        }

        for p in 0..self.internal_coeffs.len() {
            for (a, b) in self.internal_coeffs[p]
                .iter_mut()
                .zip(rhs.internal_coeffs[p].iter())
            {
                *a = *a + *b;
            }
            for (a, b) in self.boundary_coeffs[p]
                .iter_mut()
                .zip(rhs.boundary_coeffs[p].iter())
            {
                *a = *a + *b;
            }
        }
    }
}

impl<T: FieldValue> SubAssign for FvMatrix<T> {
    fn sub_assign(&mut self, rhs: FvMatrix<T>) {
        *self += -rhs;
    }
}

impl<T: FieldValue> Add for FvMatrix<T> {
    type Output = FvMatrix<T>;

    fn add(mut self, rhs: FvMatrix<T>) -> Self::Output {
        self += rhs;
        self
    }
}

impl<T: FieldValue> Sub for FvMatrix<T> {
    type Output = FvMatrix<T>;

    fn sub(mut self, rhs: FvMatrix<T>) -> Self::Output {
        self -= rhs;
        self
    }
}

impl<T: FieldValue> Neg for FvMatrix<T> {
    type Output = FvMatrix<T>;

    fn neg(mut self) -> Self::Output {
        for d in &mut self.diag {
            *d = -*d;
        }
        for u in &mut self.upper {
            *u = -*u;
        }
        if let Some(lower) = &mut self.lower {
            for l in lower.iter_mut() {
                *l = -*l;
            }
        }
        for s in &mut self.source {
            *s = -*s;
        }
        for p in 0..self.internal_coeffs.len() {
            for c in &mut self.internal_coeffs[p] {
                *c = -*c;
            }
            for c in &mut self.boundary_coeffs[p] {
                *c = -*c;
            }
        }
        self
    }
}

// ============================================================
// 测试
// ============================================================
