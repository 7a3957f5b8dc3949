//! # sink 模块说明
//!
//! ## 角色定位（Why）
//! - 原语编码器只负责“写什么”，字节汇负责“写到哪里”：同一格式既能输出到 `io::Write`，
//!   也能直接写入调用方提供的 `Vec<u8>`；
//! - 两种后端共享同一组写入原语，格式实现对后端完全无感知。
//!
//! ## 契约说明（What）
//! - 多字节整数一律按大端序写出；
//! - 每个写入操作要么完整写入，要么返回 [`EncodeError`]；
//! - [`ByteSink::flush`] 在一次编码结束时调用，负责把逻辑内容交付给最终目标。

mod buffer;
mod stream;

pub use self::buffer::BytesSink;
pub use self::stream::IoSink;

pub(crate) use self::buffer::DEFAULT_INITIAL_CAPACITY;

use crate::error::EncodeError;
use crate::sealed::Sealed;

/// 原语编码器写出字节的统一入口。
///
/// # 契约说明（What）
/// - 该 Trait 已封闭，仅有 [`IoSink`] 与 [`BytesSink`] 两种实现；
/// - `write_2bytes`/`write_3bytes`/`write_4bytes` 用于格式写出“标记 + 短载荷”这类固定组合，
///   后端可以一次性写入，避免逐字节调用。
pub trait ByteSink: Sealed {
    /// 按大端序写出 `u16`。
    fn write_u16(&mut self, v: u16) -> Result<(), EncodeError>;

    /// 按大端序写出 `u32`。
    fn write_u32(&mut self, v: u32) -> Result<(), EncodeError>;

    /// 按大端序写出 `u64`。
    fn write_u64(&mut self, v: u64) -> Result<(), EncodeError>;

    /// 原样写出一段字节。
    fn write_bytes(&mut self, b: &[u8]) -> Result<(), EncodeError>;

    /// 写出字符串的 UTF-8 字节，不附加长度或终止符。
    fn write_str(&mut self, s: &str) -> Result<(), EncodeError> {
        self.write_bytes(s.as_bytes())
    }

    fn write_byte(&mut self, b: u8) -> Result<(), EncodeError>;

    fn write_2bytes(&mut self, b1: u8, b2: u8) -> Result<(), EncodeError>;

    fn write_3bytes(&mut self, b1: u8, b2: u8, b3: u8) -> Result<(), EncodeError>;

    fn write_4bytes(&mut self, b1: u8, b2: u8, b3: u8, b4: u8) -> Result<(), EncodeError>;

    /// 交付已写入内容：流式后端刷新底层写入器，缓冲区后端把向量截断到逻辑长度。
    fn flush(&mut self) -> Result<(), EncodeError>;
}
