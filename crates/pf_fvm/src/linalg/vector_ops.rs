// crates/pf_fvm/src/linalg/vector_ops.rs

//! 向量运算（BLAS Level 1 风格）
//!
//! 迭代求解器的基础运算。这里只做分区内的本地部分，
//! 跨分区归约由调用方经 [`crate::comm::CommContext`] 完成。
//!
//! # 函数列表
//!
//! - [`dot`]: 点积 x·y（本地）
//! - [`sum_mag`]: Σ|xᵢ|（本地，残差范数用）
//! - [`axpy`]: y = α·x + y
//! - [`xpay`]: y = x + α·y
//! - [`scale`]: x = α·x
//! - [`fill`]: x[:] = α

use pf_foundation::Scalar;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// 点积 x·y（本地部分）
#[inline]
pub fn dot(x: &[Scalar], y: &[Scalar]) -> Scalar {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y.iter()).map(|(&xi, &yi)| xi * yi).sum()
}

/// 绝对值和 Σ|xᵢ|（本地部分）
#[inline]
pub fn sum_mag(x: &[Scalar]) -> Scalar {
    x.iter().map(|&v| v.abs()).sum()
}

/// 元素和（本地部分，全局均值由调用方经归约求得）
#[inline]
pub fn local_sum(x: &[Scalar]) -> Scalar {
    x.iter().sum()
}

/// AXPY: y = α·x + y
#[inline]
pub fn axpy(alpha: Scalar, x: &[Scalar], y: &mut [Scalar]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// XPAY: y = x + α·y
#[inline]
pub fn xpay(x: &[Scalar], alpha: Scalar, y: &mut [Scalar]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi = xi + alpha * *yi;
    }
}

/// 缩放: x = α·x
#[inline]
pub fn scale(alpha: Scalar, x: &mut [Scalar]) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

/// 填充: x[:] = α
#[inline]
pub fn fill(x: &mut [Scalar], alpha: Scalar) {
    x.fill(alpha);
}

/// 并行点积（需启用 `parallel` 特性；大向量时收益明显）
#[cfg(feature = "parallel")]
#[inline]
pub fn dot_parallel(x: &[Scalar], y: &[Scalar]) -> Scalar {
    debug_assert_eq!(x.len(), y.len());
    x.par_iter().zip(y.par_iter()).map(|(&xi, &yi)| xi * yi).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot() {
        let x = vec![1.0, 2.0, 3.0];
        let y = vec![4.0, 5.0, 6.0];
        assert!((dot(&x, &y) - 32.0).abs() < 1e-14);
    }

    #[test]
    fn test_sum_mag() {
        assert!((sum_mag(&[-1.0, 2.0, -3.0]) - 6.0).abs() < 1e-14);
    }

    #[test]
    fn test_axpy_xpay() {
        let x = vec![1.0, 2.0];
        let mut y = vec![10.0, 20.0];
        axpy(2.0, &x, &mut y);
        assert_eq!(y, vec![12.0, 24.0]);

        xpay(&x, 0.5, &mut y);
        assert_eq!(y, vec![7.0, 14.0]);
    }

    #[test]
    fn test_scale_fill() {
        let mut x = vec![1.0, -2.0];
        scale(-2.0, &mut x);
        assert_eq!(x, vec![-2.0, 4.0]);
        fill(&mut x, 0.0);
        assert_eq!(x, vec![0.0, 0.0]);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_dot_parallel_matches_serial() {
        let x: Vec<Scalar> = (0..1000).map(|i| i as Scalar * 0.1).collect();
        let y: Vec<Scalar> = (0..1000).map(|i| (i % 7) as Scalar).collect();
        assert!((dot(&x, &y) - dot_parallel(&x, &y)).abs() < 1e-8, "并行结果与串行不一致");
    }
}
