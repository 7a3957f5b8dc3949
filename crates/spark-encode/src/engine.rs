//! # engine 模块说明
//!
//! ## 角色定位（Why）
//! - 按值的运行期形态递归分派，把容器与结构体拆解为原语调用序列；
//! - 单次编码调用内部是纯同步递归，没有挂起点。
//!
//! ## 逻辑解析（How）
//! 对每个值依次尝试：
//! 1. 格式钩子 [`PrimitiveEncoder::encode_builtin`]；
//! 2. 扩展注册表中按 `TypeId` 注册的覆盖函数；
//! 3. 按 [`Shape`] 分派：标量直接调用原语，容器先写前导再逐个递归，
//!    空引用写 nil 标记。
//!
//! ## 契约说明（What）
//! - 错误通过 `?` 原样上抛，由 [`Encoder`](crate::Encoder) 统一交还调用方；
//! - 每进入一层值深度加一，配置了上限时超限即失败。

use std::num::NonZeroU16;

use crate::error::EncodeError;
use crate::format::{Charset, PrimitiveEncoder};
use crate::registry::{ExtensionEntry, ExtensionRegistry};
use crate::sink::ByteSink;
use crate::value::{
    Encode, FieldDescriptor, MapView, SeqView, Shape, StructView, is_empty_value,
};

/// 一次编码调用的遍历状态。
pub(crate) struct ValueEncoder<'a, W: ?Sized, P> {
    sink: &'a mut W,
    prim: &'a mut P,
    registry: &'a ExtensionRegistry,
    write_ext: bool,
    max_depth: Option<NonZeroU16>,
    depth: u16,
}

impl<'a, W, P> ValueEncoder<'a, W, P>
where
    W: ByteSink + ?Sized,
    P: PrimitiveEncoder,
{
    pub(crate) fn new(
        sink: &'a mut W,
        prim: &'a mut P,
        registry: &'a ExtensionRegistry,
        write_ext: bool,
        max_depth: Option<NonZeroU16>,
    ) -> Self {
        Self {
            sink,
            prim,
            registry,
            write_ext,
            max_depth,
            depth: 0,
        }
    }

    pub(crate) fn encode(&mut self, value: &dyn Encode) -> Result<(), EncodeError> {
        if let Some(limit) = self.max_depth
            && self.depth >= limit.get()
        {
            return Err(EncodeError::DepthExceeded { limit: limit.get() });
        }
        self.depth += 1;
        let result = self.encode_value(value);
        self.depth -= 1;
        result
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<(), EncodeError> {
        let any = value.as_any();
        if self.prim.encode_builtin(self.sink, any)? {
            return Ok(());
        }
        if let Some(entry) = self.registry.lookup(any.type_id()) {
            return self.encode_extension(entry, value);
        }

        match value.shape() {
            Shape::Invalid => self.prim.encode_nil(self.sink),
            Shape::Bool(v) => self.prim.encode_bool(self.sink, v),
            Shape::Signed(v) => self.prim.encode_int(self.sink, v.widen()),
            Shape::Unsigned(v) => self.prim.encode_uint(self.sink, v.widen()),
            Shape::F32(v) => self.prim.encode_f32(self.sink, v),
            Shape::F64(v) => self.prim.encode_f64(self.sink, v),
            Shape::Str(v) => self.prim.encode_string(self.sink, Charset::Utf8, v),
            Shape::Bytes(Some(v)) => self.prim.encode_string_bytes(self.sink, Charset::Raw, v),
            Shape::Seq(Some(seq)) | Shape::Array(seq) => self.encode_seq(seq),
            Shape::Map(Some(map)) => self.encode_map(map),
            Shape::Struct(view) => self.encode_struct(view),
            Shape::Pointer(Some(target)) | Shape::Interface(Some(target)) => self.encode(target),
            Shape::Bytes(None)
            | Shape::Seq(None)
            | Shape::Map(None)
            | Shape::Pointer(None)
            | Shape::Interface(None) => self.prim.encode_nil(self.sink),
            Shape::Opaque(kind) => Err(EncodeError::UnsupportedShape {
                kind,
                type_name: value.type_name(),
            }),
        }
    }

    fn encode_extension(
        &mut self,
        entry: &ExtensionEntry,
        value: &dyn Encode,
    ) -> Result<(), EncodeError> {
        let payload = entry
            .encode(value.as_any())
            .map_err(|source| EncodeError::Extension {
                type_name: entry.type_name(),
                source,
            })?;
        let Some(bytes) = payload else {
            return self.prim.encode_nil(self.sink);
        };
        if self.write_ext {
            self.prim
                .encode_ext_preamble(self.sink, entry.tag(), bytes.len())?;
            self.sink.write_bytes(&bytes)
        } else {
            self.prim
                .encode_string_bytes(self.sink, Charset::Raw, &bytes)
        }
    }

    fn encode_seq(&mut self, seq: &dyn SeqView) -> Result<(), EncodeError> {
        self.prim.encode_array_preamble(self.sink, seq.len())?;
        seq.for_each_element(&mut |element| self.encode(element))
    }

    fn encode_map(&mut self, map: &dyn MapView) -> Result<(), EncodeError> {
        self.prim.encode_map_preamble(self.sink, map.len())?;
        map.for_each_entry(&mut |key, value| {
            match key.shape() {
                Shape::Str(name) => self.prim.encode_symbol(self.sink, name)?,
                _ => self.encode(key)?,
            }
            self.encode(value)
        })
    }

    fn encode_struct(&mut self, view: &dyn StructView) -> Result<(), EncodeError> {
        let schema = view.schema();
        let mut kept: Vec<(&'static str, &dyn Encode)> = Vec::with_capacity(schema.len());
        for field in schema.fields() {
            let value = resolve_field(view, field, schema.type_name())?;
            if field.omit_empty() && is_empty_value(value) {
                continue;
            }
            kept.push((field.name(), value));
        }

        self.prim.encode_map_preamble(self.sink, kept.len())?;
        for (name, value) in kept {
            self.prim.encode_symbol(self.sink, name)?;
            self.encode(value)?;
        }
        Ok(())
    }
}

/// 沿字段下标路径取值，中途的指针与接口会被解引用。
fn resolve_field<'v>(
    view: &'v dyn StructView,
    field: &FieldDescriptor,
    type_name: &'static str,
) -> Result<&'v dyn Encode, EncodeError> {
    let unresolved = || EncodeError::FieldPath {
        type_name,
        field: field.name(),
        path: field.index().path().to_vec(),
    };
    let (last, hops) = field.index().path().split_last().ok_or_else(unresolved)?;
    let mut current = view;
    for &index in hops {
        let hop = current.field(index).ok_or_else(unresolved)?;
        current = struct_behind(hop).ok_or_else(unresolved)?;
    }
    current.field(*last).ok_or_else(unresolved)
}

fn struct_behind(mut value: &dyn Encode) -> Option<&dyn StructView> {
    loop {
        match value.shape() {
            Shape::Struct(view) => return Some(view),
            Shape::Pointer(Some(target)) | Shape::Interface(Some(target)) => value = target,
            _ => return None,
        }
    }
}
