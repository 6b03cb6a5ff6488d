// crates/pf_foundation/src/value.rs

//! 场值抽象
//!
//! 定义 [`FieldValue`] trait，统一标量、三维向量和 3×3 张量三种场值类型。
//! 矩阵组装对值类型泛型：系数逐分量存储为与场值同型的量，
//! 线性求解按分量展开为标量系统（分离式求解）。
//!
//! # 实现类型
//!
//! - `Scalar`(f64): 1 分量
//! - `glam::DVec3`: 3 分量
//! - `glam::DMat3`: 9 分量（列主序）
//!
//! # 旋转变换
//!
//! 周期边界在传输向量 / 张量时应用几何旋转：
//! 向量为 `R·v`，张量为 `R·T·Rᵀ`，标量不变。

use crate::scalar::Scalar;
use glam::{DMat3, DVec3};
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

/// 场值 trait：单元 / 面上存储的物理量类型
///
/// 要求的代数运算由标准 trait 约束给出；本 trait 补充分量访问、
/// 统一构造与旋转变换。
pub trait FieldValue:
    Copy
    + Clone
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<Scalar, Output = Self>
    + 'static
{
    /// 分量数量
    const N_COMPONENTS: usize;

    /// 零值
    fn zero() -> Self;

    /// 各分量取同一标量值
    fn uniform(s: Scalar) -> Self;

    /// 读取第 `i` 个分量
    ///
    /// # Panics
    /// - `i >= N_COMPONENTS`
    fn component(&self, i: usize) -> Scalar;

    /// 写入第 `i` 个分量
    ///
    /// # Panics
    /// - `i >= N_COMPONENTS`
    fn set_component(&mut self, i: usize, v: Scalar);

    /// 模（标量为绝对值，向量为长度，张量为 Frobenius 范数）
    fn mag(&self) -> Scalar;

    /// 逐分量取绝对值
    fn cmpt_mag(&self) -> Self;

    /// 分量平均值（用于将逐分量系数折算为单一标量系数）
    #[inline]
    fn cmpt_av(&self) -> Scalar {
        let mut sum = 0.0;
        for i in 0..Self::N_COMPONENTS {
            sum += self.component(i);
        }
        sum / Self::N_COMPONENTS as Scalar
    }

    /// 逐分量相乘
    fn cmpt_mul(&self, other: &Self) -> Self;

    /// 应用旋转变换
    fn transform(&self, rotation: &DMat3) -> Self;

    /// 从分量切片构造（长度不足的分量取 0）
    fn from_components(c: &[Scalar]) -> Self {
        let mut v = Self::zero();
        for (i, &ci) in c.iter().take(Self::N_COMPONENTS).enumerate() {
            v.set_component(i, ci);
        }
        v
    }
}

// ============================================================
// 标量实现
// ============================================================

impl FieldValue for Scalar {
    const N_COMPONENTS: usize = 1;

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn uniform(s: Scalar) -> Self {
        s
    }

    #[inline]
    fn component(&self, i: usize) -> Scalar {
        assert!(i < 1, "标量只有一个分量");
        *self
    }

    #[inline]
    fn set_component(&mut self, i: usize, v: Scalar) {
        assert!(i < 1, "标量只有一个分量");
        *self = v;
    }

    #[inline]
    fn mag(&self) -> Scalar {
        self.abs()
    }

    #[inline]
    fn cmpt_mag(&self) -> Self {
        self.abs()
    }

    #[inline]
    fn cmpt_mul(&self, other: &Self) -> Self {
        self * other
    }

    #[inline]
    fn transform(&self, _rotation: &DMat3) -> Self {
        *self
    }
}

// ============================================================
// 三维向量实现
// ============================================================

impl FieldValue for DVec3 {
    const N_COMPONENTS: usize = 3;

    #[inline]
    fn zero() -> Self {
        DVec3::ZERO
    }

    #[inline]
    fn uniform(s: Scalar) -> Self {
        DVec3::splat(s)
    }

    #[inline]
    fn component(&self, i: usize) -> Scalar {
        match i {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => panic!("向量分量索引越界: {i}"),
        }
    }

    #[inline]
    fn set_component(&mut self, i: usize, v: Scalar) {
        match i {
            0 => self.x = v,
            1 => self.y = v,
            2 => self.z = v,
            _ => panic!("向量分量索引越界: {i}"),
        }
    }

    #[inline]
    fn mag(&self) -> Scalar {
        self.length()
    }

    #[inline]
    fn cmpt_mag(&self) -> Self {
        self.abs()
    }

    #[inline]
    fn cmpt_mul(&self, other: &Self) -> Self {
        *self * *other
    }

    #[inline]
    fn transform(&self, rotation: &DMat3) -> Self {
        *rotation * *self
    }
}

// ============================================================
// 3×3 张量实现（列主序分量编号）
// ============================================================

impl FieldValue for DMat3 {
    const N_COMPONENTS: usize = 9;

    #[inline]
    fn zero() -> Self {
        DMat3::ZERO
    }

    #[inline]
    fn uniform(s: Scalar) -> Self {
        DMat3::from_cols_array(&[s; 9])
    }

    #[inline]
    fn component(&self, i: usize) -> Scalar {
        assert!(i < 9, "张量分量索引越界: {i}");
        self.to_cols_array()[i]
    }

    #[inline]
    fn set_component(&mut self, i: usize, v: Scalar) {
        assert!(i < 9, "张量分量索引越界: {i}");
        let mut a = self.to_cols_array();
        a[i] = v;
        *self = DMat3::from_cols_array(&a);
    }

    #[inline]
    fn mag(&self) -> Scalar {
        self.to_cols_array().iter().map(|c| c * c).sum::<Scalar>().sqrt()
    }

    #[inline]
    fn cmpt_mag(&self) -> Self {
        let mut a = self.to_cols_array();
        for c in &mut a {
            *c = c.abs();
        }
        DMat3::from_cols_array(&a)
    }

    #[inline]
    fn cmpt_mul(&self, other: &Self) -> Self {
        let a = self.to_cols_array();
        let b = other.to_cols_array();
        let mut out = [0.0; 9];
        for i in 0..9 {
            out[i] = a[i] * b[i];
        }
        DMat3::from_cols_array(&out)
    }

    #[inline]
    fn transform(&self, rotation: &DMat3) -> Self {
        *rotation * *self * rotation.transpose()
    }
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_scalar_components() {
        let mut s = 3.0_f64;
        assert_eq!(Scalar::N_COMPONENTS, 1);
        assert_eq!(s.component(0), 3.0);
        s.set_component(0, -1.5);
        assert_eq!(s, -1.5);
        assert_eq!(s.mag(), 1.5);
    }

    #[test]
    fn test_vector_components() {
        let mut v = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(DVec3::N_COMPONENTS, 3);
        assert_eq!(v.component(2), 3.0);
        v.set_component(1, -4.0);
        assert_eq!(v.y, -4.0);
        assert!((DVec3::new(3.0, 4.0, 0.0).mag() - 5.0).abs() < 1e-14);
    }

    #[test]
    fn test_uniform_and_from_components() {
        let v = DVec3::uniform(2.0);
        assert_eq!(v, DVec3::splat(2.0));
        let w = DVec3::from_components(&[1.0, 2.0]);
        assert_eq!(w, DVec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_cmpt_av() {
        let v = DVec3::new(1.0, 2.0, 3.0);
        assert!((v.cmpt_av() - 2.0).abs() < 1e-14);
    }

    #[test]
    fn test_vector_rotation() {
        // 绕 z 轴转 90°: x -> y
        let rot = DMat3::from_rotation_z(FRAC_PI_2);
        let v = DVec3::X.transform(&rot);
        assert!((v - DVec3::Y).length() < 1e-14, "旋转结果错误: {v:?}");
    }

    #[test]
    fn test_tensor_rotation_preserves_frobenius() {
        let rot = DMat3::from_rotation_z(0.7);
        let t = DMat3::from_cols(
            DVec3::new(1.0, 2.0, 0.0),
            DVec3::new(2.0, -1.0, 0.5),
            DVec3::new(0.0, 0.5, 3.0),
        );
        let tt = t.transform(&rot);
        assert!((t.mag() - tt.mag()).abs() < 1e-12, "旋转应保持范数");
    }

    #[test]
    fn test_tensor_components_roundtrip() {
        let mut t = DMat3::zero();
        t.set_component(4, 7.0); // 第二列第二行
        assert_eq!(t.component(4), 7.0);
        assert_eq!(t.to_cols_array()[4], 7.0);
    }
}
