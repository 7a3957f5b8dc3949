//! # testing 模块说明
//!
//! ## 角色定位（Why）
//! - 引擎本身不定义任何线格式，测试与基准需要一个确定、可逆的替身格式来观察原语调用序列；
//! - [`TraceFormat`] 为每个原语写出一个标记字节与大端载荷，[`parse_trace`] 把字节还原为 [`Token`] 序列。
//!
//! ## 契约说明（What）
//! - 该格式只用于断言，不承诺跨版本稳定；
//! - 扩展载荷由引擎直接写入字节汇，解析时按前导中的长度整体取回。
//!
//! | 原语 | 布局 |
//! |------|------|
//! | nil | `0x00` |
//! | bool | `0x01`, `0/1` |
//! | int / uint | `0x02` / `0x03`, 8 字节 |
//! | f32 / f64 | `0x04` / `0x05`, 位模式 |
//! | ext | `0x06`, tag, u32 长度, 载荷 |
//! | array / map | `0x07` / `0x08`, u32 数量 |
//! | string | `0x09`, 字符集, u32 长度, UTF-8 |
//! | symbol | `0x0A`, u32 长度, UTF-8 |
//! | bytes | `0x0B`, 字符集, u32 长度, 字节 |

use std::any::Any;

use bytes::Buf;
use thiserror::Error;

use crate::error::EncodeError;
use crate::format::{Charset, Format, PrimitiveEncoder};
use crate::sink::ByteSink;

mod marker {
    pub const NIL: u8 = 0x00;
    pub const BOOL: u8 = 0x01;
    pub const INT: u8 = 0x02;
    pub const UINT: u8 = 0x03;
    pub const F32: u8 = 0x04;
    pub const F64: u8 = 0x05;
    pub const EXT: u8 = 0x06;
    pub const ARRAY: u8 = 0x07;
    pub const MAP: u8 = 0x08;
    pub const STRING: u8 = 0x09;
    pub const SYMBOL: u8 = 0x0A;
    pub const BYTES: u8 = 0x0B;
}

/// 格式钩子：返回 `Some(token)` 时由钩子接管该值的编码。
pub type BuiltinHook = fn(&dyn Any) -> Option<Token>;

/// 解析得到的原语记录。
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    F32(f32),
    F64(f64),
    Ext { tag: u8, payload: Vec<u8> },
    Array(usize),
    Map(usize),
    Str { charset: Charset, value: String },
    Symbol(String),
    Bytes { charset: Charset, value: Vec<u8> },
}

impl Token {
    /// UTF-8 字符串记录的简写。
    pub fn str(value: &str) -> Self {
        Token::Str {
            charset: Charset::Utf8,
            value: value.to_owned(),
        }
    }

    pub fn symbol(value: &str) -> Self {
        Token::Symbol(value.to_owned())
    }

    /// 原始字节串记录的简写。
    pub fn raw(value: &[u8]) -> Self {
        Token::Bytes {
            charset: Charset::Raw,
            value: value.to_vec(),
        }
    }
}

/// 测试替身格式。
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceFormat {
    builtin: Option<BuiltinHook>,
}

impl TraceFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装格式钩子。
    pub fn with_builtin(hook: BuiltinHook) -> Self {
        Self {
            builtin: Some(hook),
        }
    }
}

impl Format for TraceFormat {
    type Encoder = TraceEncoder;

    fn new_encoder(&self) -> TraceEncoder {
        TraceEncoder {
            builtin: self.builtin,
            calls: 0,
        }
    }
}

/// [`TraceFormat`] 的原语编码器。
#[derive(Debug)]
pub struct TraceEncoder {
    builtin: Option<BuiltinHook>,
    calls: usize,
}

impl TraceEncoder {
    /// 自创建以来写出的原语个数（不含钩子接管的值）。
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn write_token<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        token: &Token,
    ) -> Result<(), EncodeError> {
        match token {
            Token::Nil => self.encode_nil(w),
            Token::Bool(v) => self.encode_bool(w, *v),
            Token::Int(v) => self.encode_int(w, *v),
            Token::Uint(v) => self.encode_uint(w, *v),
            Token::F32(v) => self.encode_f32(w, *v),
            Token::F64(v) => self.encode_f64(w, *v),
            Token::Ext { tag, payload } => {
                self.encode_ext_preamble(w, *tag, payload.len())?;
                w.write_bytes(payload)
            }
            Token::Array(len) => self.encode_array_preamble(w, *len),
            Token::Map(len) => self.encode_map_preamble(w, *len),
            Token::Str { charset, value } => self.encode_string(w, *charset, value),
            Token::Symbol(value) => self.encode_symbol(w, value),
            Token::Bytes { charset, value } => self.encode_string_bytes(w, *charset, value),
        }
    }
}

fn charset_byte(charset: Charset) -> u8 {
    match charset {
        Charset::Raw => 0,
        Charset::Utf8 => 1,
    }
}

/// 长度字段固定为 `u32`，超出时返回 [`EncodeError::LengthOverflow`]，且不写出任何字节。
fn wire_len(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::LengthOverflow {
        len,
        max: u64::from(u32::MAX),
    })
}

impl PrimitiveEncoder for TraceEncoder {
    fn encode_builtin<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        value: &dyn Any,
    ) -> Result<bool, EncodeError> {
        let Some(token) = self.builtin.and_then(|hook| hook(value)) else {
            return Ok(false);
        };
        self.write_token(w, &token)?;
        Ok(true)
    }

    fn encode_nil<W: ByteSink + ?Sized>(&mut self, w: &mut W) -> Result<(), EncodeError> {
        self.calls += 1;
        w.write_byte(marker::NIL)
    }

    fn encode_int<W: ByteSink + ?Sized>(&mut self, w: &mut W, v: i64) -> Result<(), EncodeError> {
        self.calls += 1;
        w.write_byte(marker::INT)?;
        w.write_u64(v as u64)
    }

    fn encode_uint<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        v: u64,
    ) -> Result<(), EncodeError> {
        self.calls += 1;
        w.write_byte(marker::UINT)?;
        w.write_u64(v)
    }

    fn encode_bool<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        v: bool,
    ) -> Result<(), EncodeError> {
        self.calls += 1;
        w.write_2bytes(marker::BOOL, u8::from(v))
    }

    fn encode_f32<W: ByteSink + ?Sized>(&mut self, w: &mut W, v: f32) -> Result<(), EncodeError> {
        self.calls += 1;
        w.write_byte(marker::F32)?;
        w.write_u32(v.to_bits())
    }

    fn encode_f64<W: ByteSink + ?Sized>(&mut self, w: &mut W, v: f64) -> Result<(), EncodeError> {
        self.calls += 1;
        w.write_byte(marker::F64)?;
        w.write_u64(v.to_bits())
    }

    fn encode_ext_preamble<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        tag: u8,
        len: usize,
    ) -> Result<(), EncodeError> {
        let len = wire_len(len)?;
        self.calls += 1;
        w.write_2bytes(marker::EXT, tag)?;
        w.write_u32(len)
    }

    fn encode_array_preamble<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        len: usize,
    ) -> Result<(), EncodeError> {
        let len = wire_len(len)?;
        self.calls += 1;
        w.write_byte(marker::ARRAY)?;
        w.write_u32(len)
    }

    fn encode_map_preamble<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        len: usize,
    ) -> Result<(), EncodeError> {
        let len = wire_len(len)?;
        self.calls += 1;
        w.write_byte(marker::MAP)?;
        w.write_u32(len)
    }

    fn encode_string<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        charset: Charset,
        v: &str,
    ) -> Result<(), EncodeError> {
        let len = wire_len(v.len())?;
        self.calls += 1;
        w.write_2bytes(marker::STRING, charset_byte(charset))?;
        w.write_u32(len)?;
        w.write_str(v)
    }

    fn encode_symbol<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        v: &str,
    ) -> Result<(), EncodeError> {
        let len = wire_len(v.len())?;
        self.calls += 1;
        w.write_byte(marker::SYMBOL)?;
        w.write_u32(len)?;
        w.write_str(v)
    }

    fn encode_string_bytes<W: ByteSink + ?Sized>(
        &mut self,
        w: &mut W,
        charset: Charset,
        v: &[u8],
    ) -> Result<(), EncodeError> {
        let len = wire_len(v.len())?;
        self.calls += 1;
        w.write_2bytes(marker::BYTES, charset_byte(charset))?;
        w.write_u32(len)?;
        w.write_bytes(v)
    }
}

/// 追踪字节解析失败。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("trace truncated at offset {offset}: need {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown marker {marker:#04x} at offset {offset}")]
    UnknownMarker { marker: u8, offset: usize },

    #[error("unknown charset {charset} at offset {offset}")]
    UnknownCharset { charset: u8, offset: usize },

    #[error("invalid utf-8 text at offset {offset}")]
    InvalidUtf8 { offset: usize },
}

struct Reader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    fn offset(&self) -> usize {
        self.total - self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<(), TraceError> {
        if self.buf.remaining() < n {
            return Err(TraceError::Truncated {
                offset: self.offset(),
                needed: n - self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, TraceError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self) -> Result<u32, TraceError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    fn u64(&mut self) -> Result<u64, TraceError> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TraceError> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn charset(&mut self) -> Result<Charset, TraceError> {
        let offset = self.offset();
        match self.u8()? {
            0 => Ok(Charset::Raw),
            1 => Ok(Charset::Utf8),
            charset => Err(TraceError::UnknownCharset { charset, offset }),
        }
    }

    fn text(&mut self) -> Result<String, TraceError> {
        let len = self.u32()? as usize;
        let offset = self.offset();
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| TraceError::InvalidUtf8 { offset })
    }
}

/// 把 [`TraceFormat`] 写出的字节还原为原语记录。
pub fn parse_trace(bytes: &[u8]) -> Result<Vec<Token>, TraceError> {
    let mut reader = Reader {
        buf: bytes,
        total: bytes.len(),
    };
    let mut tokens = Vec::new();
    while reader.buf.has_remaining() {
        let offset = reader.offset();
        let token = match reader.u8()? {
            marker::NIL => Token::Nil,
            marker::BOOL => Token::Bool(reader.u8()? != 0),
            marker::INT => Token::Int(reader.u64()? as i64),
            marker::UINT => Token::Uint(reader.u64()?),
            marker::F32 => Token::F32(f32::from_bits(reader.u32()?)),
            marker::F64 => Token::F64(f64::from_bits(reader.u64()?)),
            marker::EXT => {
                let tag = reader.u8()?;
                let len = reader.u32()? as usize;
                Token::Ext {
                    tag,
                    payload: reader.take(len)?.to_vec(),
                }
            }
            marker::ARRAY => Token::Array(reader.u32()? as usize),
            marker::MAP => Token::Map(reader.u32()? as usize),
            marker::STRING => {
                let charset = reader.charset()?;
                Token::Str {
                    charset,
                    value: reader.text()?,
                }
            }
            marker::SYMBOL => Token::Symbol(reader.text()?),
            marker::BYTES => {
                let charset = reader.charset()?;
                let len = reader.u32()? as usize;
                Token::Bytes {
                    charset,
                    value: reader.take(len)?.to_vec(),
                }
            }
            marker => return Err(TraceError::UnknownMarker { marker, offset }),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BytesSink;

    #[test]
    fn tokens_survive_the_trace_format() {
        let tokens = vec![
            Token::Nil,
            Token::Bool(true),
            Token::Int(-3),
            Token::Uint(u64::MAX),
            Token::F32(1.5),
            Token::F64(-0.25),
            Token::Ext {
                tag: 7,
                payload: vec![1, 2, 3],
            },
            Token::Array(2),
            Token::Map(0),
            Token::str("héllo"),
            Token::symbol("key"),
            Token::raw(&[0xFF, 0x00]),
        ];
        let mut out = Vec::new();
        let mut sink = BytesSink::new(&mut out);
        let mut encoder = TraceFormat::new().new_encoder();
        for token in &tokens {
            encoder.write_token(&mut sink, token).expect("写入记录");
        }
        sink.flush().expect("flush");
        assert_eq!(encoder.calls(), tokens.len());
        assert_eq!(parse_trace(&out).expect("解析追踪"), tokens);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn lengths_beyond_u32_are_rejected() {
        let mut out = Vec::new();
        let mut sink = BytesSink::new(&mut out);
        let mut encoder = TraceFormat::new().new_encoder();
        let too_long = u32::MAX as usize + 1;

        let err = encoder
            .encode_ext_preamble(&mut sink, 3, too_long)
            .expect_err("长度超出 u32");
        assert_eq!(err.code(), crate::codes::ENCODE_LENGTH_OVERFLOW);
        assert!(matches!(
            err,
            EncodeError::LengthOverflow { len, max } if len == too_long && max == u64::from(u32::MAX)
        ));
        let err = encoder
            .encode_array_preamble(&mut sink, too_long)
            .expect_err("数量超出 u32");
        assert_eq!(err.code(), crate::codes::ENCODE_LENGTH_OVERFLOW);

        // 失败的前导不写出任何字节；上限本身仍可写出。
        assert!(sink.is_empty());
        assert_eq!(encoder.calls(), 0);
        encoder
            .encode_map_preamble(&mut sink, u32::MAX as usize)
            .expect("恰好为上限");
        sink.flush().expect("flush");
        assert_eq!(parse_trace(&out).expect("解析"), vec![Token::Map(u32::MAX as usize)]);
    }

    #[test]
    fn truncated_input_is_reported() {
        let err = parse_trace(&[marker::INT, 0, 0]).expect_err("缺少 6 字节");
        assert_eq!(
            err,
            TraceError::Truncated {
                offset: 1,
                needed: 6
            }
        );
        let err = parse_trace(&[0x7F]).expect_err("未知标记");
        assert_eq!(
            err,
            TraceError::UnknownMarker {
                marker: 0x7F,
                offset: 0
            }
        );
    }
}
