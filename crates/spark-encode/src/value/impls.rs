//! 标准库与 `bytes` 类型的 [`Encode`] 实现。

use std::any::Any;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::BuildHasher;
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::EncodeError;

use super::{Encode, EncodeStruct, MapView, SeqView, Shape, Signed, StructSchema, Unsigned};

macro_rules! encode_scalar {
    ($($ty:ty => |$v:ident| $shape:expr),+ $(,)?) => {
        $(
            impl Encode for $ty {
                fn shape(&self) -> Shape<'_> {
                    let $v = *self;
                    $shape
                }
            }
        )+
    };
}

encode_scalar! {
    bool => |v| Shape::Bool(v),
    i8 => |v| Shape::Signed(Signed::I8(v)),
    i16 => |v| Shape::Signed(Signed::I16(v)),
    i32 => |v| Shape::Signed(Signed::I32(v)),
    i64 => |v| Shape::Signed(Signed::I64(v)),
    isize => |v| Shape::Signed(Signed::Isize(v)),
    u8 => |v| Shape::Unsigned(Unsigned::U8(v)),
    u16 => |v| Shape::Unsigned(Unsigned::U16(v)),
    u32 => |v| Shape::Unsigned(Unsigned::U32(v)),
    u64 => |v| Shape::Unsigned(Unsigned::U64(v)),
    usize => |v| Shape::Unsigned(Unsigned::Usize(v)),
    f32 => |v| Shape::F32(v),
    f64 => |v| Shape::F64(v),
}

impl Encode for () {
    fn shape(&self) -> Shape<'_> {
        Shape::Invalid
    }
}

impl Encode for String {
    fn shape(&self) -> Shape<'_> {
        Shape::Str(self)
    }
}

impl Encode for &'static str {
    fn shape(&self) -> Shape<'_> {
        Shape::Str(self)
    }
}

impl Encode for Box<str> {
    fn shape(&self) -> Shape<'_> {
        Shape::Str(self)
    }
}

impl Encode for Cow<'static, str> {
    fn shape(&self) -> Shape<'_> {
        Shape::Str(self)
    }
}

impl Encode for Bytes {
    fn shape(&self) -> Shape<'_> {
        Shape::Bytes(Some(&self[..]))
    }
}

// 序列：`u8` 元素的连续存储按字节串编码，其余按元素逐个编码。

impl<T: Encode> Encode for Vec<T> {
    fn shape(&self) -> Shape<'_> {
        match (self as &dyn Any).downcast_ref::<Vec<u8>>() {
            Some(bytes) => Shape::Bytes(Some(&bytes[..])),
            None => Shape::Seq(Some(self)),
        }
    }
}

impl<T: Encode> SeqView for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn for_each_element(
        &self,
        f: &mut dyn FnMut(&dyn Encode) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.iter().try_for_each(|v| f(v))
    }
}

impl<T: Encode> Encode for Box<[T]> {
    fn shape(&self) -> Shape<'_> {
        match (self as &dyn Any).downcast_ref::<Box<[u8]>>() {
            Some(bytes) => Shape::Bytes(Some(&bytes[..])),
            None => Shape::Seq(Some(self)),
        }
    }
}

impl<T: Encode> SeqView for Box<[T]> {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn for_each_element(
        &self,
        f: &mut dyn FnMut(&dyn Encode) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.iter().try_for_each(|v| f(v))
    }
}

impl<T: Encode> Encode for VecDeque<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Seq(Some(self))
    }
}

impl<T: Encode> SeqView for VecDeque<T> {
    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn for_each_element(
        &self,
        f: &mut dyn FnMut(&dyn Encode) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.iter().try_for_each(|v| f(v))
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn shape(&self) -> Shape<'_> {
        match (self as &dyn Any).downcast_ref::<[u8; N]>() {
            Some(bytes) => Shape::Bytes(Some(&bytes[..])),
            None => Shape::Array(self),
        }
    }
}

impl<T: Encode, const N: usize> SeqView for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn for_each_element(
        &self,
        f: &mut dyn FnMut(&dyn Encode) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.iter().try_for_each(|v| f(v))
    }
}

// 映射

impl<K: Encode, V: Encode, S: BuildHasher + 'static> Encode for HashMap<K, V, S> {
    fn shape(&self) -> Shape<'_> {
        Shape::Map(Some(self))
    }
}

impl<K: Encode, V: Encode, S: BuildHasher + 'static> MapView for HashMap<K, V, S> {
    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn for_each_entry(
        &self,
        f: &mut dyn FnMut(&dyn Encode, &dyn Encode) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.iter().try_for_each(|(k, v)| f(k, v))
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn shape(&self) -> Shape<'_> {
        Shape::Map(Some(self))
    }
}

impl<K: Encode, V: Encode> MapView for BTreeMap<K, V> {
    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn for_each_entry(
        &self,
        f: &mut dyn FnMut(&dyn Encode, &dyn Encode) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.iter().try_for_each(|(k, v)| f(k, v))
    }
}

// 间接引用

impl<T: Encode> Encode for Option<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Pointer(self.as_ref().map(|v| v as &dyn Encode))
    }
}

impl<T: Encode> Encode for Box<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Pointer(Some(&**self))
    }
}

impl<T: Encode> Encode for Arc<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Pointer(Some(&**self))
    }
}

impl<T: Encode> Encode for Rc<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Pointer(Some(&**self))
    }
}

impl Encode for Box<dyn Encode> {
    fn shape(&self) -> Shape<'_> {
        Shape::Interface(Some(&**self))
    }
}

impl Encode for Arc<dyn Encode + Send + Sync> {
    fn shape(&self) -> Shape<'_> {
        Shape::Interface(Some(&**self))
    }
}

// 展开嵌入字段时穿过指针取得内层结构体的元数据。

impl<T: EncodeStruct> EncodeStruct for Box<T> {
    fn struct_schema() -> &'static StructSchema {
        T::struct_schema()
    }
}

impl<T: EncodeStruct> EncodeStruct for Option<T> {
    fn struct_schema() -> &'static StructSchema {
        T::struct_schema()
    }
}

impl<T: EncodeStruct> EncodeStruct for Arc<T> {
    fn struct_schema() -> &'static StructSchema {
        T::struct_schema()
    }
}
