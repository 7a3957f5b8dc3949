//! 结构体字段元数据。
//!
//! # 设计背景（Why）
//! - 结构体按“字段名 → 值”的映射编码，字段顺序、输出名与空值省略规则在类型层面固定；
//! - 元数据由 `#[derive(Encode)]` 在首次使用时构建一次并缓存在 `OnceLock` 中，此后只读共享。
//!
//! # 逻辑解析（How）
//! - 普通字段记录声明位置 [`FieldIndex::Direct`]；
//! - 展开（flatten）的嵌入结构体字段记录下标路径 [`FieldIndex::Path`]，
//!   引擎沿路径逐层取字段，途中可穿过指针与接口；
//! - 同名字段按嵌入深度决定可见性：浅层字段遮蔽深层字段，最浅一层仍有多个同名字段时
//!   该名称有歧义，全部丢弃。输出映射因此不会出现重复键。

use tracing::debug;

use super::{Encode, Shape};

/// 字段在结构体中的位置。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldIndex {
    Direct(usize),
    /// 从外层到内层的下标路径，至少包含两段。
    Path(Box<[usize]>),
}

impl FieldIndex {
    /// 以切片形式返回下标路径。
    pub fn path(&self) -> &[usize] {
        match self {
            FieldIndex::Direct(index) => std::slice::from_ref(index),
            FieldIndex::Path(path) => path,
        }
    }
}

/// 单个输出字段的描述。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: &'static str,
    omit_empty: bool,
    index: FieldIndex,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, index: FieldIndex, omit_empty: bool) -> Self {
        Self {
            name,
            omit_empty,
            index,
        }
    }

    /// 输出键名。
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn omit_empty(&self) -> bool {
        self.omit_empty
    }

    pub fn index(&self) -> &FieldIndex {
        &self.index
    }
}

/// 一个结构体类型的有序字段列表。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructSchema {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl StructSchema {
    pub fn builder(type_name: &'static str) -> StructSchemaBuilder {
        StructSchemaBuilder {
            type_name,
            fields: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 按输出顺序排列的字段。
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// [`StructSchema`] 的构建器，字段按调用顺序输出。
#[derive(Debug)]
pub struct StructSchemaBuilder {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl StructSchemaBuilder {
    /// 追加一个直接字段。
    pub fn field(mut self, name: &'static str, index: usize, omit_empty: bool) -> Self {
        self.fields
            .push(FieldDescriptor::new(name, FieldIndex::Direct(index), omit_empty));
        self
    }

    /// 把位于 `index` 的嵌入结构体的全部字段展开到当前层级。
    ///
    /// 内层字段的下标路径前缀为 `index`；`omit_empty` 为真时强制内层字段全部省略空值。
    pub fn flatten(mut self, index: usize, inner: &StructSchema, omit_empty: bool) -> Self {
        for field in inner.fields() {
            let mut path = Vec::with_capacity(field.index.path().len() + 1);
            path.push(index);
            path.extend_from_slice(field.index.path());
            self.fields.push(FieldDescriptor::new(
                field.name,
                FieldIndex::Path(path.into_boxed_slice()),
                omit_empty || field.omit_empty,
            ));
        }
        self
    }

    /// 按嵌入深度解析同名字段后冻结。
    pub fn build(self) -> StructSchema {
        let type_name = self.type_name;
        let visible = |field: &FieldDescriptor| {
            let depth = field.index.path().len();
            // 自身总会计入一次；再有同名且不更深的字段即被遮蔽或有歧义。
            self.fields
                .iter()
                .filter(|other| other.name == field.name && other.index.path().len() <= depth)
                .count()
                == 1
        };
        let fields: Vec<FieldDescriptor> = self
            .fields
            .iter()
            .filter(|field| {
                let keep = visible(*field);
                if !keep {
                    debug!(
                        type_name,
                        field = field.name,
                        path = ?field.index.path(),
                        "field hidden by name clash"
                    );
                }
                keep
            })
            .cloned()
            .collect();
        StructSchema { type_name, fields }
    }
}

/// 判断值是否为“空”，用于 `omit_empty` 字段。
///
/// 空值包括：`false`、数值零、空引用（指针、接口、字节串、序列、映射）、
/// 长度为零的数组/序列/映射/字符串/字节串。结构体永不为空。
pub fn is_empty_value(value: &dyn Encode) -> bool {
    match value.shape() {
        Shape::Bool(v) => !v,
        Shape::Signed(v) => v.widen() == 0,
        Shape::Unsigned(v) => v.widen() == 0,
        Shape::F32(v) => v == 0.0,
        Shape::F64(v) => v == 0.0,
        Shape::Str(v) => v.is_empty(),
        Shape::Bytes(v) => v.is_none_or(|b| b.is_empty()),
        Shape::Seq(v) => v.is_none_or(|s| s.is_empty()),
        Shape::Array(v) => v.is_empty(),
        Shape::Map(v) => v.is_none_or(|m| m.is_empty()),
        Shape::Pointer(v) | Shape::Interface(v) => v.is_none(),
        Shape::Invalid | Shape::Struct(_) | Shape::Opaque(_) => false,
    }
}
