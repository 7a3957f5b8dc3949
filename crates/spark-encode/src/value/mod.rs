//! # value 模块说明
//!
//! ## 角色定位（Why）
//! - 引擎需要在运行期了解任意值的“形态”：是标量、字节串、序列、映射、结构体还是间接引用；
//! - Rust 没有运行期反射，因此由 [`Encode`] 把值投影为封闭的 [`Shape`] 枚举，
//!   容器通过 [`SeqView`]/[`MapView`]/[`StructView`] 暴露元素，引擎据此递归。
//!
//! ## 逻辑解析（How）
//! - 类型身份来自 [`EncodeAny`]：它对所有 `'static` 类型自动实现，提供 `&dyn Any` 与类型名，
//!   供扩展注册表与格式钩子按 `TypeId` 匹配；
//! - `Option<T>`、`Box<T>`、`Arc<T>` 映射为 [`Shape::Pointer`]，`Box<dyn Encode>` 映射为 [`Shape::Interface`]，
//!   二者为空时编码为 nil；
//! - 结构体字段元数据见 [`field`] 子模块，由 `#[derive(Encode)]` 生成并按类型缓存。
//!
//! ## 契约说明（What）
//! - `shape` 只读借用值，不得修改；
//! - 带 `Option` 的变体表示“可为空”的种类，`None` 一律编码为 nil 标记，而非长度为零的前导。

pub mod field;
mod impls;

use std::any::Any;

use crate::error::EncodeError;

pub use self::field::{FieldDescriptor, FieldIndex, StructSchema, StructSchemaBuilder, is_empty_value};

/// 为所有 `'static` 类型提供类型擦除访问。
///
/// 该 Trait 通过 blanket 实现自动满足，调用方无需手写。
pub trait EncodeAny: Any {
    fn as_any(&self) -> &dyn Any;

    /// 具体类型的名称，仅用于错误消息与日志。
    fn type_name(&self) -> &'static str;
}

impl<T: Any> EncodeAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// 可被引擎编码的值。
///
/// # 契约说明（What）
/// - 同一个值多次调用 `shape` 必须返回相同形态；
/// - 自定义实现通常只需返回一个变体，容器类型同时实现对应的视图 Trait。
pub trait Encode: EncodeAny {
    fn shape(&self) -> Shape<'_>;
}

/// 值在运行期的形态。
#[derive(Clone, Copy)]
pub enum Shape<'a> {
    /// 无效值（例如 `()`），编码为 nil。
    Invalid,
    Bool(bool),
    Signed(Signed),
    Unsigned(Unsigned),
    F32(f32),
    F64(f64),
    Str(&'a str),
    /// 原始字节串；`None` 表示空引用。
    Bytes(Option<&'a [u8]>),
    /// 变长序列；`None` 表示空引用。
    Seq(Option<&'a dyn SeqView>),
    /// 定长数组，永不为空引用。
    Array(&'a dyn SeqView),
    Map(Option<&'a dyn MapView>),
    Struct(&'a dyn StructView),
    /// 指向单个值的间接引用。
    Pointer(Option<&'a dyn Encode>),
    /// 动态类型的值。
    Interface(Option<&'a dyn Encode>),
    /// 没有编码方式的种类，编码时返回 [`EncodeError::UnsupportedShape`]。
    Opaque(&'static str),
}

impl Shape<'_> {
    /// 形态种类名，用于错误消息。
    pub fn kind(&self) -> &'static str {
        match *self {
            Shape::Invalid => "invalid",
            Shape::Bool(_) => "bool",
            Shape::Signed(_) => "int",
            Shape::Unsigned(_) => "uint",
            Shape::F32(_) => "float32",
            Shape::F64(_) => "float64",
            Shape::Str(_) => "string",
            Shape::Bytes(_) => "bytes",
            Shape::Seq(_) => "slice",
            Shape::Array(_) => "array",
            Shape::Map(_) => "map",
            Shape::Struct(_) => "struct",
            Shape::Pointer(_) => "pointer",
            Shape::Interface(_) => "interface",
            Shape::Opaque(kind) => kind,
        }
    }
}

/// 有符号整数族，编码前统一加宽为 `i64`。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signed {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Isize(isize),
}

impl Signed {
    pub fn widen(self) -> i64 {
        match self {
            Signed::I8(v) => i64::from(v),
            Signed::I16(v) => i64::from(v),
            Signed::I32(v) => i64::from(v),
            Signed::I64(v) => v,
            Signed::Isize(v) => v as i64,
        }
    }
}

/// 无符号整数族，编码前统一加宽为 `u64`。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unsigned {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
}

impl Unsigned {
    pub fn widen(self) -> u64 {
        match self {
            Unsigned::U8(v) => u64::from(v),
            Unsigned::U16(v) => u64::from(v),
            Unsigned::U32(v) => u64::from(v),
            Unsigned::U64(v) => v,
            Unsigned::Usize(v) => v as u64,
        }
    }
}

/// 序列元素访问。
///
/// `for_each_element` 必须按下标顺序恰好访问 `len()` 个元素。
pub trait SeqView {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn for_each_element(
        &self,
        f: &mut dyn FnMut(&dyn Encode) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError>;
}

/// 映射条目访问。
///
/// 条目按容器的原生迭代顺序访问，`HashMap` 的顺序不确定。
pub trait MapView {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn for_each_entry(
        &self,
        f: &mut dyn FnMut(&dyn Encode, &dyn Encode) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError>;
}

/// 结构体字段访问。
///
/// `field(i)` 中的下标对应 [`FieldIndex`] 中记录的声明位置，而非输出顺序。
pub trait StructView {
    fn schema(&self) -> &'static StructSchema;

    fn field(&self, index: usize) -> Option<&dyn Encode>;
}

/// 可在编译期取得字段元数据的结构体类型，供 `#[encode(flatten)]` 展开嵌入字段。
pub trait EncodeStruct {
    fn struct_schema() -> &'static StructSchema;
}
