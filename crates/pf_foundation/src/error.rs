// crates/pf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `PfError` 枚举和 `PfResult` 类型别名，用于整个工作区的错误处理。
//!
//! # 设计原则
//!
//! 1. **致命即显式**: 配置错误、拓扑不一致、通信不匹配在检测点立即返回错误，
//!    携带场名 / 边界名等定位信息，绝不静默替换默认值
//! 2. **非致命不入错误通道**: 数值不收敛属于诊断信息，由求解器性能结构体
//!    和日志承载，不使用本类型
//! 3. **易用性**: 提供便捷的构造方法
//!
//! # 示例
//!
//! ```
//! use pf_foundation::error::{PfError, PfResult};
//!
//! fn read_config() -> PfResult<()> {
//!     Err(PfError::config("缺少求解器配置"))
//! }
//! ```

use thiserror::Error;

/// 统一结果类型
pub type PfResult<T> = Result<T, PfError>;

/// PolyFV 错误类型
///
/// 核心错误类型，用于整个工作区。全部变体均为致命错误：
/// 调用方应终止当前运行并向用户报告。
#[derive(Error, Debug)]
pub enum PfError {
    // ========================================================================
    // 配置相关错误
    // ========================================================================
    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 缺少必需的配置项
    #[error("缺少必需的配置项: {key}")]
    MissingConfig {
        /// 配置键名
        key: String,
    },

    /// 边界条件配置错误（定位到场与边界）
    #[error("场 '{field}' 边界 '{patch}' 配置错误: {message}")]
    PatchConfig {
        /// 场名
        field: String,
        /// 边界名
        patch: String,
        /// 具体错误信息
        message: String,
    },

    /// 场注册表中缺少必需的场
    #[error("场 '{field}' 边界 '{patch}' 需要场 '{required}'，但注册表中不存在")]
    MissingField {
        /// 请求方场名
        field: String,
        /// 请求方边界名
        patch: String,
        /// 缺少的场名
        required: String,
    },

    // ========================================================================
    // 数据一致性错误
    // ========================================================================
    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 无效网格拓扑
    #[error("无效的网格拓扑: {message}")]
    InvalidMesh {
        /// 具体错误信息
        message: String,
    },

    /// 拓扑版本不一致（基于过期网格的面索引数据）
    #[error("拓扑版本不一致: {context} 构建于版本 {built}, 当前版本 {current}")]
    TopologyMismatch {
        /// 出错对象描述
        context: String,
        /// 构建时的拓扑版本
        built: u64,
        /// 当前拓扑版本
        current: u64,
    },

    // ========================================================================
    // 并行通信错误
    // ========================================================================
    /// 通信配对不匹配（标签或长度）
    #[error("通信不匹配: rank {rank} <- rank {peer}, {message}")]
    CommMismatch {
        /// 本方 rank
        rank: usize,
        /// 对方 rank
        peer: usize,
        /// 具体错误信息
        message: String,
    },

    /// 通道已断开
    #[error("通信通道断开: rank {rank} <-> rank {peer}")]
    CommDisconnected {
        /// 本方 rank
        rank: usize,
        /// 对方 rank
        peer: usize,
    },

    // ========================================================================
    // 其它
    // ========================================================================
    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl PfError {
    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 缺少配置
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    /// 边界条件配置错误
    pub fn patch_config(
        field: impl Into<String>,
        patch: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::PatchConfig {
            field: field.into(),
            patch: patch.into(),
            message: message.into(),
        }
    }

    /// 缺少必需的场
    pub fn missing_field(
        field: impl Into<String>,
        patch: impl Into<String>,
        required: impl Into<String>,
    ) -> Self {
        Self::MissingField {
            field: field.into(),
            patch: patch.into(),
            required: required.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 无效网格
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 拓扑版本不一致
    pub fn topology_mismatch(context: impl Into<String>, built: u64, current: u64) -> Self {
        Self::TopologyMismatch {
            context: context.into(),
            built,
            current,
        }
    }

    /// 通信不匹配
    pub fn comm_mismatch(rank: usize, peer: usize, message: impl Into<String>) -> Self {
        Self::CommMismatch {
            rank,
            peer,
            message: message.into(),
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl PfError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> PfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> PfResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 测试
// ========================================================================
