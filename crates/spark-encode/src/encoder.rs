//! # encoder 模块说明
//!
//! ## 角色定位（Why）
//! - [`Encoder`] 是编码的唯一公共入口：绑定一个字节汇、一个原语编码器与共享句柄；
//! - 顶层标量走快速路径，直接调用原语，避免遍历开销；其余值交给引擎递归。
//!
//! ## 逻辑解析（How）
//! - `encode` 在 `catch_unwind` 边界内执行快速路径或引擎，随后刷新字节汇；
//! - 引擎返回的错误原样交还；遍历、扩展函数或写入器中的 panic 被捕获并转换为
//!   [`EncodeError::Panicked`]；
//! - 失败以 `tracing` 事件记录：普通错误为 `debug`，捕获的 panic 为 `warn`。
//!
//! ## 契约说明（What）
//! - 同一个 `Encoder` 可顺序复用，不可并发使用；
//! - 失败时不回滚已写出的字节，输出内容未定义。

use std::any::Any;
use std::io::{BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::engine::ValueEncoder;
use crate::error::EncodeError;
use crate::format::{Charset, Format, PrimitiveEncoder};
use crate::handle::Handle;
use crate::sink::{ByteSink, BytesSink, IoSink};
use crate::value::Encode;

/// 编码会话。
///
/// ```
/// use spark_encode::{Encoder, HandleBuilder, testing::{Token, TraceFormat, parse_trace}};
///
/// let handle = HandleBuilder::new(TraceFormat::new()).build().unwrap();
/// let mut out = Vec::new();
/// Encoder::from_bytes(&mut out, &handle).encode(&vec![1_u16, 2]).unwrap();
/// assert_eq!(
///     parse_trace(&out).unwrap(),
///     vec![Token::Array(2), Token::Uint(1), Token::Uint(2)]
/// );
/// ```
pub struct Encoder<'h, S, F: Format> {
    sink: S,
    prim: F::Encoder,
    handle: &'h Handle<F>,
}

impl<'h, W: Write, F: Format> Encoder<'h, IoSink<BufWriter<W>>, F> {
    /// 以配置的缓冲区大小包装写入器。
    pub fn new(writer: W, handle: &'h Handle<F>) -> Self {
        let sink = IoSink::buffered(writer, handle.config().stream_buffer_size);
        Self::with_sink(sink, handle)
    }
}

impl<'h, W: Write, F: Format> Encoder<'h, IoSink<W>, F> {
    /// 直接写入写入器，适合已自带缓冲的目标。
    pub fn unbuffered(writer: W, handle: &'h Handle<F>) -> Self {
        Self::with_sink(IoSink::new(writer), handle)
    }
}

impl<'h, 'b, F: Format> Encoder<'h, BytesSink<'b>, F> {
    /// 写入调用方向量；每次 `encode` 结束后向量恰好包含本会话迄今的全部输出。
    pub fn from_bytes(out: &'b mut Vec<u8>, handle: &'h Handle<F>) -> Self {
        let sink = BytesSink::with_initial_capacity(out, handle.config().initial_buffer_capacity);
        Self::with_sink(sink, handle)
    }
}

impl<'h, S: ByteSink, F: Format> Encoder<'h, S, F> {
    /// 以任意字节汇构造会话。
    pub fn with_sink(sink: S, handle: &'h Handle<F>) -> Self {
        Self {
            sink,
            prim: handle.format().new_encoder(),
            handle,
        }
    }

    /// 编码一个值并刷新字节汇。
    pub fn encode(&mut self, value: &dyn Encode) -> Result<(), EncodeError> {
        let handle = self.handle;
        let (sink, prim) = (&mut self.sink, &mut self.prim);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            encode_once(sink, prim, handle, value)?;
            sink.flush()
        }));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                debug!(code = err.code(), type_name = value.type_name(), error = %err, "encode failed");
                Err(err)
            }
            Err(payload) => {
                let err = EncodeError::from_panic(payload);
                warn!(type_name = value.type_name(), error = %err, "encode panicked");
                Err(err)
            }
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn primitive_encoder(&self) -> &F::Encoder {
        &self.prim
    }

    /// 取回字节汇。
    pub fn into_inner(self) -> S {
        self.sink
    }
}

fn encode_once<S, P, F>(
    sink: &mut S,
    prim: &mut P,
    handle: &Handle<F>,
    value: &dyn Encode,
) -> Result<(), EncodeError>
where
    S: ByteSink,
    P: PrimitiveEncoder,
    F: Format,
{
    if let Some(result) = encode_fast(sink, prim, value.as_any()) {
        return result;
    }
    let config = handle.config();
    ValueEncoder::new(
        sink,
        prim,
        handle.registry(),
        config.write_ext,
        config.max_depth,
    )
    .encode(value)
}

macro_rules! fast_scalar {
    ($any:ident, |$v:ident| $body:expr; $($ty:ty),+ $(,)?) => {
        $(
            if let Some($v) = $any
                .downcast_ref::<$ty>()
                .or_else(|| $any.downcast_ref::<Box<$ty>>().map(|boxed| &**boxed))
            {
                return Some($body);
            }
        )+
    };
}

/// 顶层内建标量的快速路径，不查询扩展注册表与格式钩子。
fn encode_fast<S, P>(sink: &mut S, prim: &mut P, any: &dyn Any) -> Option<Result<(), EncodeError>>
where
    S: ByteSink,
    P: PrimitiveEncoder,
{
    fast_scalar!(any, |v| prim.encode_int(sink, i64::from(*v)); i8, i16, i32, i64);
    fast_scalar!(any, |v| prim.encode_int(sink, *v as i64); isize);
    fast_scalar!(any, |v| prim.encode_uint(sink, u64::from(*v)); u8, u16, u32, u64);
    fast_scalar!(any, |v| prim.encode_uint(sink, *v as u64); usize);
    fast_scalar!(any, |v| prim.encode_f32(sink, *v); f32);
    fast_scalar!(any, |v| prim.encode_f64(sink, *v); f64);
    fast_scalar!(any, |v| prim.encode_bool(sink, *v); bool);
    fast_scalar!(any, |v| prim.encode_string(sink, Charset::Utf8, v); String);
    fast_scalar!(any, |v| prim.encode_string(sink, Charset::Utf8, v); &'static str);
    None
}

/// 编码到新向量。
pub fn encode_to_vec<F: Format>(
    handle: &Handle<F>,
    value: &dyn Encode,
) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    Encoder::from_bytes(&mut out, handle).encode(value)?;
    Ok(out)
}

/// 经缓冲编码到写入器，返回前已刷新。
pub fn encode_to_writer<F: Format, W: Write>(
    handle: &Handle<F>,
    writer: W,
    value: &dyn Encode,
) -> Result<(), EncodeError> {
    Encoder::new(writer, handle).encode(value)
}
