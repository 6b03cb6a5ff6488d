// crates/pf_fvm/src/fields/volume.rs

//! 体场容器
//!
//! [`VolField`] 把网格实体映射到类型化的值：单元内部值、按 patch
//! 分组的边界面值、每个 patch 一个多态边界条件对象，以及时间导数
//! 格式需要的旧时间层。
//!
//! # 边界条件状态机
//!
//! 每个 patch 带 `updated` 标志：
//! [`begin_outer_iteration`](VolField::begin_outer_iteration) 复位为
//! Stale，[`update_boundary_conditions`](VolField::update_boundary_conditions)
//! 驱动 Stale → Updated（重复调用为空操作）。processor patch 的 halo
//! 交换在此一次性调度：先提交全部发送再等待接收，每外层迭代一轮，
//! 不做逐系数的同步远端读取。
//!
//! # 旧时间层
//!
//! 显式的定深环（深度 2，二阶时间格式所需）。`old_time(1)` 在只有
//! 一层历史时回退到 `old_time(0)`，没有历史时回退到当前值，
//! 二阶时间格式因此在首个时间步自动退化为一阶。
//!
//! # 单写者纪律
//!
//! 内部值仅由矩阵求解的写回步骤（crate 内）和初始化接口
//! [`set_internal`](VolField::set_internal) 修改；离散格式只读。

use crate::boundary::{transform_values, BoundaryCondition};
use crate::comm::CommContext;
use crate::fields::{FieldLookup, NoLookup};
use pf_foundation::{FieldValue, PfError, PfResult, Scalar};
use pf_mesh::{FvMesh, PatchCoupling};
use std::collections::VecDeque;
use std::sync::Arc;

/// 旧时间层最大深度（二阶时间格式需要两层）
const MAX_OLD_TIME: usize = 2;

/// 单个 patch 的边界数据
#[derive(Debug, Clone)]
struct PatchField<T: FieldValue> {
    /// 边界面值
    values: Vec<T>,
    /// 边界条件对象
    condition: BoundaryCondition<T>,
    /// 本外层迭代内是否已更新
    updated: bool,
}

/// 体场
#[derive(Debug, Clone)]
pub struct VolField<T: FieldValue> {
    name: String,
    mesh: Arc<FvMesh>,
    topo_version: u64,
    internal: Vec<T>,
    patches: Vec<PatchField<T>>,
    old_time: VecDeque<Vec<T>>,
}

impl<T: FieldValue> VolField<T> {
    /// 以均匀初值创建场
    ///
    /// `conditions` 按 mesh 的 patch 顺序给出，数量与逐 patch 面数
    /// 必须匹配；processor / cyclic patch 上必须放置对应的耦合条件，
    /// 反之亦然（配置错误在此处立即报出）。
    pub fn uniform(
        name: impl Into<String>,
        mesh: Arc<FvMesh>,
        value: T,
        conditions: Vec<BoundaryCondition<T>>,
    ) -> PfResult<Self> {
        Self::new(name, mesh, |_| value, conditions)
    }

    /// 以单元初值函数创建场
    pub fn new(
        name: impl Into<String>,
        mesh: Arc<FvMesh>,
        init: impl Fn(usize) -> T,
        conditions: Vec<BoundaryCondition<T>>,
    ) -> PfResult<Self> {
        let name = name.into();
        PfError::check_size("边界条件数量", mesh.patches().len(), conditions.len())?;

        let internal: Vec<T> = (0..mesh.n_cells()).map(init).collect();

        let mut patches = Vec::with_capacity(conditions.len());
        for (pi, condition) in conditions.into_iter().enumerate() {
            let patch = mesh.patch(pi);
            if condition.len() != patch.size() {
                return Err(PfError::patch_config(
                    &name,
                    &patch.name,
                    format!(
                        "条件面数 {} 与 patch 面数 {} 不符",
                        condition.len(),
                        patch.size()
                    ),
                ));
            }

            // 耦合类别必须与网格 patch 一致
            let mesh_coupled = patch.coupling.is_coupled();
            match (&patch.coupling, &condition) {
                (PatchCoupling::Processor { .. }, BoundaryCondition::Processor { .. }) => {}
                (PatchCoupling::Cyclic { .. }, BoundaryCondition::Cyclic { .. }) => {}
                _ if !mesh_coupled && !condition.is_coupled() => {}
                _ => {
                    return Err(PfError::patch_config(
                        &name,
                        &patch.name,
                        format!(
                            "条件类别 '{}' 与 patch 耦合类别不匹配",
                            condition.kind_name()
                        ),
                    ));
                }
            }

            patches.push(PatchField {
                values: vec![T::zero(); patch.size()],
                condition,
                updated: false,
            });
        }

        let mut field = Self {
            name,
            mesh,
            topo_version: 0,
            internal,
            patches,
            old_time: VecDeque::new(),
        };
        field.topo_version = field.mesh.topology_version();

        // 初始边界面值与条件一致（耦合 patch 的缓存尚为零，
        // 第一次 update/correct 后完全一致）
        field.evaluate_all_patches();
        Ok(field)
    }

    // ========================================================
    // 访问
    // ========================================================

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 所属网格
    #[inline]
    pub fn mesh(&self) -> &FvMesh {
        &self.mesh
    }

    /// 所属网格（共享句柄）
    #[inline]
    pub fn mesh_arc(&self) -> Arc<FvMesh> {
        Arc::clone(&self.mesh)
    }

    /// 创建时捕获的拓扑版本
    #[inline]
    pub fn topology_version(&self) -> u64 {
        self.topo_version
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.internal.len()
    }

    /// 内部值
    #[inline]
    pub fn internal(&self) -> &[T] {
        &self.internal
    }

    /// 内部值（crate 内可变访问，仅求解写回使用）
    #[inline]
    pub(crate) fn internal_mut(&mut self) -> &mut [T] {
        &mut self.internal
    }

    /// 设置内部值（初始化接口）
    pub fn set_internal(&mut self, values: Vec<T>) -> PfResult<()> {
        PfError::check_size("internal", self.internal.len(), values.len())?;
        self.internal = values;
        Ok(())
    }

    /// patch 边界面值
    #[inline]
    pub fn patch_values(&self, patch: usize) -> &[T] {
        &self.patches[patch].values
    }

    /// patch 边界条件
    #[inline]
    pub fn condition(&self, patch: usize) -> &BoundaryCondition<T> {
        &self.patches[patch].condition
    }

    /// patch 是否已完成本迭代的系数更新
    #[inline]
    pub fn patch_updated(&self, patch: usize) -> bool {
        self.patches[patch].updated
    }

    /// 收集 patch 各面邻接单元的内部值
    pub fn patch_internal(&self, patch: usize) -> Vec<T> {
        self.mesh
            .patch(patch)
            .face_cells
            .iter()
            .map(|&c| self.internal[c])
            .collect()
    }

    // ========================================================
    // 旧时间层
    // ========================================================

    /// 保存当前内部值为最新的旧时间层（时间步推进时调用）
    pub fn store_old_time(&mut self) {
        self.old_time.push_front(self.internal.clone());
        self.old_time.truncate(MAX_OLD_TIME);
    }

    /// 旧时间层数
    #[inline]
    pub fn n_old_times(&self) -> usize {
        self.old_time.len()
    }

    /// 取第 `i` 层旧时间值（0 为上一步）
    ///
    /// 层数不足时回退到最近的已有层，完全无历史时回退到当前值。
    pub fn old_time(&self, i: usize) -> &[T] {
        debug_assert!(i < MAX_OLD_TIME, "旧时间层深度上限为 {MAX_OLD_TIME}");
        if self.old_time.is_empty() {
            return &self.internal;
        }
        &self.old_time[i.min(self.old_time.len() - 1)]
    }

    // ========================================================
    // 边界条件状态机
    // ========================================================

    /// 外层迭代开始：全部 patch 复位为 Stale
    pub fn begin_outer_iteration(&mut self) {
        for p in &mut self.patches {
            p.updated = false;
        }
    }

    /// 更新全部边界条件系数（无跨场依赖的便捷形式）
    pub fn update_boundary_conditions(&mut self, ctx: &CommContext) -> PfResult<()> {
        self.update_boundary_conditions_with(ctx, &NoLookup)
    }

    /// 更新全部边界条件系数
    ///
    /// Stale → Updated，每外层迭代恰好生效一次（幂等）。
    /// processor patch 的 halo 交换在此调度：先提交全部发送，
    /// 再逐 patch 等待接收。依赖其它场的条件（进出流切换）经
    /// `lookup` 查询，查询失败立即返回致命的"缺少场"错误。
    pub fn update_boundary_conditions_with(
        &mut self,
        ctx: &CommContext,
        lookup: &dyn FieldLookup,
    ) -> PfResult<()> {
        // 阶段 1: 为全部待更新的 processor patch 提交发送
        self.post_processor_sends(ctx, true)?;

        // 阶段 2: 逐 patch 完成更新
        let mesh = Arc::clone(&self.mesh);
        for (pi, patch) in mesh.patches().iter().enumerate() {
            if self.patches[pi].updated {
                continue;
            }

            match patch.coupling {
                PatchCoupling::Processor { peer, tag } => {
                    let flat = ctx.recv(peer, tag, patch.size() * T::N_COMPONENTS)?;
                    let values = unflatten::<T>(&flat);
                    self.patches[pi].condition.set_neighbour(values);
                }
                PatchCoupling::Cyclic { partner, rotation } => {
                    let mut values = self.patch_internal(partner);
                    if let Some(rot) = rotation {
                        transform_values(&mut values, &rot);
                    }
                    self.patches[pi].condition.set_partner_values(values);
                }
                PatchCoupling::None => {
                    if let BoundaryCondition::Mixed {
                        fraction_source: Some(src),
                        ..
                    } = &self.patches[pi].condition
                    {
                        let src = src.clone();
                        let flux = lookup.boundary_scalars(&src, pi).ok_or_else(|| {
                            PfError::missing_field(&self.name, &patch.name, &src)
                        })?;
                        let flux = flux.to_vec();
                        self.patches[pi]
                            .condition
                            .update_fraction_from_flux(&flux);
                    }
                }
            }

            self.patches[pi].updated = true;
        }
        Ok(())
    }

    /// 由边界条件与邻接内部值重算全部边界面值
    ///
    /// 求解写回后调用。processor patch 先做一轮新的配对交换刷新
    /// halo 缓存（两侧 SPMD 锁步，先发后收）。场未变时重复调用
    /// 结果不变（幂等）。
    pub fn correct_boundary_conditions(&mut self, ctx: &CommContext) -> PfResult<()> {
        // 刷新 halo：此处无视 updated 标志，写回后的内部值必须重新交换
        self.post_processor_sends(ctx, false)?;

        let mesh = Arc::clone(&self.mesh);
        for (pi, patch) in mesh.patches().iter().enumerate() {
            match patch.coupling {
                PatchCoupling::Processor { peer, tag } => {
                    let flat = ctx.recv(peer, tag, patch.size() * T::N_COMPONENTS)?;
                    self.patches[pi].condition.set_neighbour(unflatten::<T>(&flat));
                }
                PatchCoupling::Cyclic { partner, rotation } => {
                    let mut values = self.patch_internal(partner);
                    if let Some(rot) = rotation {
                        transform_values(&mut values, &rot);
                    }
                    self.patches[pi].condition.set_partner_values(values);
                }
                PatchCoupling::None => {}
            }
        }

        self.evaluate_all_patches();
        Ok(())
    }

    /// 为 processor patch 提交内部邻接值的发送
    ///
    /// `only_stale` 为真时跳过已更新的 patch（update 路径），
    /// 为假时全部发送（correct 路径）。
    fn post_processor_sends(&self, ctx: &CommContext, only_stale: bool) -> PfResult<()> {
        for (pi, patch) in self.mesh.patches().iter().enumerate() {
            if only_stale && self.patches[pi].updated {
                continue;
            }
            if let PatchCoupling::Processor { peer, tag } = patch.coupling {
                let outgoing = flatten(&self.patch_internal(pi));
                ctx.send(peer, tag, &outgoing)?;
            }
        }
        Ok(())
    }

    /// 按条件重算全部 patch 的边界面值（纯本地）
    fn evaluate_all_patches(&mut self) {
        let mesh = Arc::clone(&self.mesh);
        for (pi, patch) in mesh.patches().iter().enumerate() {
            let internal = self.patch_internal(pi);
            let pf = &mut self.patches[pi];
            pf.values = pf
                .condition
                .evaluate(&internal, &patch.delta_coeffs, &patch.weights);
        }
    }
}

/// 值序列展平为分量标量序列
pub(crate) fn flatten<T: FieldValue>(values: &[T]) -> Vec<Scalar> {
    let mut out = Vec::with_capacity(values.len() * T::N_COMPONENTS);
    for v in values {
        for i in 0..T::N_COMPONENTS {
            out.push(v.component(i));
        }
    }
    out
}

/// 分量标量序列还原为值序列
pub(crate) fn unflatten<T: FieldValue>(flat: &[Scalar]) -> Vec<T> {
    debug_assert_eq!(flat.len() % T::N_COMPONENTS, 0);
    flat.chunks_exact(T::N_COMPONENTS)
        .map(T::from_components)
        .collect()
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use pf_mesh::generation::line_mesh;

    fn scalar_field(n: usize) -> VolField<Scalar> {
        let mesh = Arc::new(line_mesh(n, 1.0).unwrap());
        VolField::uniform(
            "T",
            Arc::clone(&mesh),
            1.0,
            vec![
                BoundaryCondition::fixed_value_uniform(0.0, 1),
                BoundaryCondition::zero_gradient(1),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_construction_and_initial_boundary_values() {
        let field = scalar_field(3);
        assert_eq!(field.n_cells(), 3);
        // 定值边界取给定值，零梯度边界取内部值
        assert_eq!(field.patch_values(0), &[0.0]);
        assert_eq!(field.patch_values(1), &[1.0]);
    }

    #[test]
    fn test_condition_count_mismatch_rejected() {
        let mesh = Arc::new(line_mesh(2, 1.0).unwrap());
        let result = VolField::uniform(
            "T",
            mesh,
            0.0,
            vec![BoundaryCondition::fixed_value_uniform(0.0, 1)],
        );
        assert!(matches!(result, Err(PfError::SizeMismatch { .. })));
    }

    #[test]
    fn test_coupling_kind_mismatch_rejected() {
        let mesh = Arc::new(line_mesh(2, 1.0).unwrap());
        // 常规 patch 上放 processor 条件
        let result = VolField::uniform(
            "T",
            mesh,
            0.0,
            vec![
                BoundaryCondition::processor(1),
                BoundaryCondition::zero_gradient(1),
            ],
        );
        assert!(matches!(result, Err(PfError::PatchConfig { .. })));
    }

    #[test]
    fn test_old_time_ring() {
        let mut field = scalar_field(2);
        // 无历史时回退到当前值
        assert_eq!(field.old_time(0), field.internal());
        assert_eq!(field.old_time(1), field.internal());

        field.set_internal(vec![2.0, 2.0]).unwrap();
        field.store_old_time();
        field.set_internal(vec![3.0, 3.0]).unwrap();
        field.store_old_time();
        field.set_internal(vec![4.0, 4.0]).unwrap();

        assert_eq!(field.old_time(0), &[3.0, 3.0]);
        assert_eq!(field.old_time(1), &[2.0, 2.0]);

        // 环深度为 2：再推一层后最老的被挤出
        field.store_old_time();
        assert_eq!(field.old_time(0), &[4.0, 4.0]);
        assert_eq!(field.old_time(1), &[3.0, 3.0]);
        assert_eq!(field.n_old_times(), 2);
    }

    #[test]
    fn test_update_is_idempotent_within_iteration() {
        let mut field = scalar_field(3);
        let ctx = CommContext::serial();

        field.begin_outer_iteration();
        field.update_boundary_conditions(&ctx).unwrap();
        assert!(field.patch_updated(0) && field.patch_updated(1));

        // 再次调用为空操作
        field.update_boundary_conditions(&ctx).unwrap();
        assert!(field.patch_updated(0));

        // 新一轮迭代复位
        field.begin_outer_iteration();
        assert!(!field.patch_updated(0));
    }

    #[test]
    fn test_correct_boundary_conditions_idempotent() {
        let mut field = scalar_field(3);
        let ctx = CommContext::serial();
        field.set_internal(vec![1.0, 2.0, 3.0]).unwrap();

        field.correct_boundary_conditions(&ctx).unwrap();
        let first: Vec<Scalar> = field.patch_values(1).to_vec();
        field.correct_boundary_conditions(&ctx).unwrap();
        assert_eq!(field.patch_values(1), &first[..], "无场变更时重复修正必须不变");
        // 零梯度边界取邻接内部值
        assert_eq!(field.patch_values(1), &[3.0]);
    }

    #[test]
    fn test_missing_lookup_field_is_fatal() {
        let mesh = Arc::new(line_mesh(2, 1.0).unwrap());
        let mut field = VolField::uniform(
            "T",
            mesh,
            0.0,
            vec![
                BoundaryCondition::fixed_value_uniform(0.0, 1),
                BoundaryCondition::inlet_outlet(5.0, "phi", 1),
            ],
        )
        .unwrap();
        let ctx = CommContext::serial();

        field.begin_outer_iteration();
        let err = field.update_boundary_conditions(&ctx).unwrap_err();
        match err {
            PfError::MissingField { required, .. } => assert_eq!(required, "phi"),
            other => panic!("期望 MissingField, 实际 {other:?}"),
        }
    }

    #[test]
    fn test_vector_field_boundary_evaluate() {
        let mesh = Arc::new(line_mesh(2, 1.0).unwrap());
        let field = VolField::uniform(
            "U",
            mesh,
            DVec3::new(1.0, 2.0, 0.0),
            vec![
                BoundaryCondition::fixed_value_uniform(DVec3::ZERO, 1),
                BoundaryCondition::zero_gradient(1),
            ],
        )
        .unwrap();
        assert_eq!(field.patch_values(0)[0], DVec3::ZERO);
        assert_eq!(field.patch_values(1)[0], DVec3::new(1.0, 2.0, 0.0));
    }
}
