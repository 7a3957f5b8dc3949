//! 内部 sealed 标记，用于限定 [`ByteSink`](crate::ByteSink) 的实现者集合。
//!
//! # 设计背景（Why）
//! - 字节汇只有流式与缓冲区两种后端，格式实现者依赖它们的写入语义（大端序、短写检测、增长律）；
//! - 通过私有 `Sealed` 标记阻止外部类型实现 `ByteSink`，从而可以在后续版本为其补充默认方法。
//!
//! # 契约说明（What）
//! - 仅 crate 内的 [`IoSink`](crate::IoSink) 与 [`BytesSink`](crate::BytesSink) 实现该标记；
//! - 调用方无需也无法实现该 Trait。
pub(crate) trait Sealed {}
