//! # format 模块说明
//!
//! ## 角色定位（Why）
//! - 引擎只决定“按什么顺序编码哪些原语”，具体字节布局由线格式实现 [`PrimitiveEncoder`] 提供；
//! - [`Format`] 是线格式的工厂，每个 [`Encoder`](crate::Encoder) 从中取得一个独立的原语编码器。
//!
//! ## 契约说明（What）
//! - 所有方法都对给定字节汇写入，并以 [`EncodeError`] 报告失败；
//! - 前导方法（`*_preamble`）只宣告数量，元素由引擎随后逐个编码；
//! - 方法按字节汇类型泛型化，调用链全部静态分派。

use std::any::Any;

use crate::error::EncodeError;
use crate::sink::ByteSink;

/// 字符串载荷的字符集提示。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Charset {
    /// 任意字节，不保证 UTF-8。
    Raw,
    /// UTF-8 文本。
    Utf8,
}

/// 线格式实现的原语编码器。
pub trait PrimitiveEncoder {
    /// 格式自定义的内建类型钩子。
    ///
    /// 返回 `Ok(true)` 表示已完整编码该值，引擎不再继续分派。默认不处理任何值。
    fn encode_builtin<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        value: &dyn Any,
    ) -> Result<bool, EncodeError> {
        let _ = (w, value);
        Ok(false)
    }

    fn encode_nil<W: ByteSink + ?Sized>(&mut self, w: &mut W) -> Result<(), EncodeError>;

    fn encode_int<W: ByteSink + ?Sized>(&mut self, w: &mut W, v: i64) -> Result<(), EncodeError>;

    fn encode_uint<W: ByteSink + ?Sized>(&mut self, w: &mut W, v: u64)
    -> Result<(), EncodeError>;

    fn encode_bool<W: ByteSink + ?Sized>(&mut self, w: &mut W, v: bool)
    -> Result<(), EncodeError>;

    fn encode_f32<W: ByteSink + ?Sized>(&mut self, w: &mut W, v: f32) -> Result<(), EncodeError>;

    fn encode_f64<W: ByteSink + ?Sized>(&mut self, w: &mut W, v: f64) -> Result<(), EncodeError>;

    /// 扩展前导：标签与随后原始载荷的字节长度。
    fn encode_ext_preamble<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        tag: u8,
        len: usize,
    ) -> Result<(), EncodeError>;

    fn encode_array_preamble<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        len: usize,
    ) -> Result<(), EncodeError>;

    /// 映射前导，`len` 为键值对数量。
    fn encode_map_preamble<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        len: usize,
    ) -> Result<(), EncodeError>;

    fn encode_string<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        charset: Charset,
        v: &str,
    ) -> Result<(), EncodeError>;

    /// 可被格式驻留的字符串，用于映射键与结构体字段名。
    fn encode_symbol<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        v: &str,
    ) -> Result<(), EncodeError>;

    fn encode_string_bytes<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        charset: Charset,
        v: &[u8],
    ) -> Result<(), EncodeError>;
}

/// 线格式工厂。
///
/// # 契约说明（What）
/// - 每次调用 [`new_encoder`](Self::new_encoder) 返回独立的原语编码器，
///   编码器内部状态（例如符号表）仅在一个 [`Encoder`](crate::Encoder) 内有效。
pub trait Format {
    type Encoder: PrimitiveEncoder;

    fn new_encoder(&self) -> Self::Encoder;
}
