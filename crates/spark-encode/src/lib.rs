#![deny(unsafe_code)]
#![allow(private_bounds)]

//! `spark-encode` 提供与线格式无关的通用值编码引擎。
//!
//! # 背景（Why）
//! - 调用方只需为值实现（或派生）[`Encode`]，无需为每种线格式手写序列化代码；
//! - 具体线格式通过 [`Format`]/[`PrimitiveEncoder`] 接入，引擎负责遍历值的形态并驱动原语调用。
//!
//! # 使用概览（How）
//! - 以 [`HandleBuilder`] 注册扩展类型、调整 [`EncodeConfig`]，随后 `build` 得到只读的 [`Handle`]；
//! - 以 [`Encoder::new`]（缓冲流）、[`Encoder::unbuffered`] 或 [`Encoder::from_bytes`]（调用方向量）
//!   创建会话，调用 [`Encoder::encode`]；
//! - 一次性编码可使用 [`encode_to_vec`] 与 [`encode_to_writer`]。
//!
//! # 合约说明（What）
//! - 所有失败均以 [`EncodeError`] 返回，编码过程中的 panic 会在 [`Encoder::encode`] 处转换为错误；
//! - 扩展类型的覆盖优先于按形态的默认编码，[`Timestamp`] 的紧凑布局见 [`encode_time`]；
//! - [`testing`] 模块提供确定性的追踪格式，供测试与基准断言原语序列。
//!
//! # 风险提示（Trade-offs）
//! - `HashMap` 按原生迭代顺序编码，输出不具备确定性；需要稳定输出时请使用 `BTreeMap`；
//! - 出错后不回滚已写出的字节，调用方应丢弃本次输出。

mod config;
mod encoder;
mod engine;
mod error;
mod format;
mod handle;
mod registry;
mod sealed;
mod sink;
mod time;
pub mod testing;
pub mod value;

pub use crate::config::{ConfigError, DEFAULT_STREAM_BUFFER_SIZE, EncodeConfig};
pub use crate::encoder::{Encoder, encode_to_vec, encode_to_writer};
pub use crate::error::{EncodeError, ExtensionError, codes};
pub use crate::format::{Charset, Format, PrimitiveEncoder};
pub use crate::handle::{Handle, HandleBuilder};
pub use crate::registry::{
    ExtEncodeFn, ExtensionEntry, ExtensionRegistry, LINEAR_LOOKUP_THRESHOLD,
};
pub use crate::sink::{ByteSink, BytesSink, IoSink};
pub use crate::time::{MAX_TIME_LEN, Timestamp, encode_time, time_extension};
pub use crate::value::{
    Encode, EncodeAny, EncodeStruct, FieldDescriptor, FieldIndex, MapView, SeqView, Shape,
    Signed, StructSchema, StructSchemaBuilder, StructView, Unsigned, is_empty_value,
};

#[cfg(feature = "derive")]
pub use spark_macros::Encode;
