//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 编码引擎在深层递归中遇到的所有失败都以 [`EncodeError`] 表达，并通过 `?` 逐层上抛，
//!   由 [`Encoder::encode`](crate::Encoder::encode) 这一唯一边界交还给调用方；
//! - 每个变体对应一个稳定错误码（见 [`codes`]），沿用 `<领域>.<语义>` 命名，便于日志聚合。
//!
//! ## 设计要求（What）
//! - 错误类型派生 `thiserror::Error`，兼容 `std::error::Error` 生态；
//! - 扩展函数返回的错误按原样保存在 `source` 中，不做二次包装或字符串化；
//! - 本层不做任何重试：失败均为结构性问题（不支持的类型、损坏的输出端）。

use std::io;

use thiserror::Error;

/// 扩展编码函数可返回的错误类型，保持调用方原始错误不变。
pub type ExtensionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 编码失败的稳定错误码集合。
///
/// 错误码遵循 `<领域>.<语义>` 约定，调用方应依据错误码而非消息文本做分支判断。
pub mod codes {
    /// 值的形态没有定义编码方式。
    pub const ENCODE_UNSUPPORTED_SHAPE: &str = "encode.unsupported_shape";
    /// 用户注册的扩展编码函数返回错误。
    pub const ENCODE_EXTENSION: &str = "encode.extension";
    /// 字节汇写入的字节数少于请求数。
    pub const ENCODE_SHORT_WRITE: &str = "encode.short_write";
    /// 底层输出流 I/O 失败。
    pub const ENCODE_IO: &str = "encode.io";
    /// 结构体字段路径无法解析（嵌入字段为空或类型不符）。
    pub const ENCODE_FIELD_PATH: &str = "encode.field_path";
    /// 长度超出线格式可表示的范围。
    pub const ENCODE_LENGTH_OVERFLOW: &str = "encode.length_overflow";
    /// 嵌套深度超过配置上限。
    pub const ENCODE_DEPTH_EXCEEDED: &str = "encode.depth_exceeded";
    /// 编码过程中发生 panic，并在入口处被转换为错误。
    pub const ENCODE_PANICKED: &str = "encode.panicked";
}

/// 编码引擎的统一错误域。
///
/// # 契约说明（What）
/// - 所有变体均满足 `Send + Sync + 'static`，可跨线程传递；
/// - [`code`](Self::code) 返回与变体一一对应的稳定错误码；
/// - 出错后输出目标处于“已部分写入、内容未定义”的状态，引擎不做回滚。
#[derive(Debug, Error)]
pub enum EncodeError {
    /// 值的形态没有定义编码方式，例如 [`Shape::Opaque`](crate::Shape::Opaque)。
    #[error("unsupported kind `{kind}` for value of type `{type_name}`")]
    UnsupportedShape {
        kind: &'static str,
        type_name: &'static str,
    },

    /// 扩展编码函数失败，`source` 为函数返回的原始错误。
    #[error("extension encoder for `{type_name}` failed: {source}")]
    Extension {
        type_name: &'static str,
        #[source]
        source: ExtensionError,
    },

    /// 输出流报告的写入字节数少于请求数。
    #[error("incorrect number of bytes written: expected {expected}, wrote {written}")]
    ShortWrite { expected: usize, written: usize },

    /// 输出流 I/O 失败。
    #[error("i/o failure while writing encoded bytes: {0}")]
    Io(#[from] io::Error),

    /// 结构体字段路径解析失败。
    #[error("cannot resolve field `{field}` of `{type_name}` through index path {path:?}")]
    FieldPath {
        type_name: &'static str,
        field: &'static str,
        path: Vec<usize>,
    },

    /// 长度前导超出线格式的上限。
    #[error("length {len} exceeds the wire format limit of {max}")]
    LengthOverflow { len: usize, max: u64 },

    /// 嵌套深度超过 [`EncodeConfig::max_depth`](crate::EncodeConfig::max_depth)。
    #[error("nesting depth exceeds the configured limit of {limit}")]
    DepthExceeded { limit: u16 },

    /// 遍历、扩展回调或字节汇中发生的 panic，在入口处被捕获。
    #[error("encode aborted by panic: {message}")]
    Panicked { message: String },
}

impl EncodeError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            EncodeError::UnsupportedShape { .. } => codes::ENCODE_UNSUPPORTED_SHAPE,
            EncodeError::Extension { .. } => codes::ENCODE_EXTENSION,
            EncodeError::ShortWrite { .. } => codes::ENCODE_SHORT_WRITE,
            EncodeError::Io(_) => codes::ENCODE_IO,
            EncodeError::FieldPath { .. } => codes::ENCODE_FIELD_PATH,
            EncodeError::LengthOverflow { .. } => codes::ENCODE_LENGTH_OVERFLOW,
            EncodeError::DepthExceeded { .. } => codes::ENCODE_DEPTH_EXCEEDED,
            EncodeError::Panicked { .. } => codes::ENCODE_PANICKED,
        }
    }

    /// 将 `catch_unwind` 得到的 panic 载荷转换为错误。
    ///
    /// 载荷为 `&str` 或 `String` 时保留原文，其余类型记为未知。
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_owned()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "<unknown panic payload>".to_owned()
        };
        EncodeError::Panicked { message }
    }
}
