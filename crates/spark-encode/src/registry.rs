//! # registry 模块说明
//!
//! ## 角色定位（Why）
//! - 用户类型可以注册“扩展编码函数”，覆盖引擎按形态的默认编码；
//! - 查找位于每个值的编码热路径上，因此需要在“条目很少”与“条目很多”两种规模下都足够快。
//!
//! ## 逻辑解析（How）
//! - 有序列表是权威视图，每次变更后据此重建 `TypeId → 下标` 的哈希视图；
//! - 条目数低于 [`LINEAR_LOOKUP_THRESHOLD`] 时线性比较 `TypeId`，否则走哈希视图；
//! - 哈希视图容量不足时按所需大小的 1.5 倍重新分配，摊薄连续注册的开销。
//!
//! ## 契约说明（What）
//! - 同一类型至多一个条目，重复注册覆盖旧条目且保留其在列表中的位置；
//! - 以 `None` 注册即删除；
//! - 注册表在 [`HandleBuilder::build`](crate::HandleBuilder::build) 后冻结，编码期间只读。

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::error::ExtensionError;

/// 条目数少于该值时使用线性扫描。
pub const LINEAR_LOOKUP_THRESHOLD: usize = 4;

/// 扩展编码函数。
///
/// - `Ok(Some(bytes))`：载荷字节；
/// - `Ok(None)`：该值编码为 nil；
/// - `Err(_)`：编码失败，错误原样交还调用方。
pub type ExtEncodeFn =
    Arc<dyn Fn(&dyn Any) -> Result<Option<Bytes>, ExtensionError> + Send + Sync + 'static>;

/// 单个扩展类型的注册信息。
#[derive(Clone)]
pub struct ExtensionEntry {
    type_id: TypeId,
    type_name: &'static str,
    tag: u8,
    encode: ExtEncodeFn,
}

impl ExtensionEntry {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 写入扩展前导时使用的标签。
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// 调用扩展编码函数。
    pub fn encode(&self, value: &dyn Any) -> Result<Option<Bytes>, ExtensionError> {
        (self.encode)(value)
    }
}

impl fmt::Debug for ExtensionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionEntry")
            .field("type_name", &self.type_name)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// 类型到扩展编码函数的注册表。
#[derive(Clone, Debug, Default)]
pub struct ExtensionRegistry {
    linear: Vec<ExtensionEntry>,
    by_type: HashMap<TypeId, usize>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按类型标识注册或删除扩展。
    ///
    /// `encode` 为 `None` 时删除该类型的既有条目；类型未注册时为空操作。
    pub fn set(
        &mut self,
        type_id: TypeId,
        type_name: &'static str,
        tag: u8,
        encode: Option<ExtEncodeFn>,
    ) {
        let position = self.linear.iter().position(|e| e.type_id == type_id);
        match (encode, position) {
            (Some(encode), Some(at)) => {
                self.linear[at] = ExtensionEntry {
                    type_id,
                    type_name,
                    tag,
                    encode,
                };
                debug!(type_name, tag, "extension replaced");
            }
            (Some(encode), None) => {
                self.linear.push(ExtensionEntry {
                    type_id,
                    type_name,
                    tag,
                    encode,
                });
                debug!(type_name, tag, "extension registered");
            }
            (None, Some(at)) => {
                self.linear.remove(at);
                debug!(type_name, "extension removed");
            }
            (None, None) => return,
        }
        self.rebuild_index();
    }

    /// 为类型 `T` 注册扩展编码函数，函数收到的值保证是 `T`。
    pub fn register<T, F>(&mut self, tag: u8, encode: F)
    where
        T: Any,
        F: Fn(&T) -> Result<Option<Bytes>, ExtensionError> + Send + Sync + 'static,
    {
        let erased: ExtEncodeFn = Arc::new(move |value: &dyn Any| match value.downcast_ref::<T>() {
            Some(typed) => encode(typed),
            None => Err(format!(
                "extension for `{}` received a value of another type",
                type_name::<T>()
            )
            .into()),
        });
        self.set(TypeId::of::<T>(), type_name::<T>(), tag, Some(erased));
    }

    /// 删除类型 `T` 的扩展。
    pub fn unregister<T: Any>(&mut self) {
        self.set(TypeId::of::<T>(), type_name::<T>(), 0, None);
    }

    /// 查找类型的扩展条目。
    pub fn lookup(&self, type_id: TypeId) -> Option<&ExtensionEntry> {
        if self.linear.is_empty() {
            return None;
        }
        if self.linear.len() < LINEAR_LOOKUP_THRESHOLD {
            return self.linear.iter().find(|e| e.type_id == type_id);
        }
        self.by_type.get(&type_id).map(|&at| &self.linear[at])
    }

    pub fn len(&self) -> usize {
        self.linear.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linear.is_empty()
    }

    /// 按注册顺序遍历条目。
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionEntry> {
        self.linear.iter()
    }

    fn rebuild_index(&mut self) {
        let needed = self.linear.len();
        if self.by_type.capacity() < needed {
            self.by_type = HashMap::with_capacity(needed + needed / 2);
        } else {
            self.by_type.clear();
        }
        for (at, entry) in self.linear.iter().enumerate() {
            self.by_type.insert(entry.type_id, at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    struct A;
    struct B;
    struct C;
    struct D;
    struct E;

    fn payload(byte: u8) -> impl Fn(&dyn Any) -> Result<Option<Bytes>, ExtensionError> {
        move |_| Ok(Some(Bytes::copy_from_slice(&[byte])))
    }

    fn register_all(registry: &mut ExtensionRegistry) {
        registry.register::<A, _>(1, |_| Ok(Some(Bytes::from_static(b"a"))));
        registry.register::<B, _>(2, |_| Ok(Some(Bytes::from_static(b"b"))));
        registry.register::<C, _>(3, |_| Ok(None));
        registry.register::<D, _>(4, |_| Ok(Some(Bytes::from_static(b"d"))));
        registry.register::<E, _>(5, |_| Ok(Some(Bytes::from_static(b"e"))));
    }

    fn assert_views_agree(registry: &ExtensionRegistry) {
        assert_eq!(registry.by_type.len(), registry.linear.len());
        for (at, entry) in registry.linear.iter().enumerate() {
            assert_eq!(registry.by_type.get(&entry.type_id), Some(&at));
        }
    }

    #[test]
    fn empty_registry_finds_nothing() {
        let registry = ExtensionRegistry::new();
        assert!(registry.lookup(TypeId::of::<A>()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn removal_keeps_other_tags() {
        let mut registry = ExtensionRegistry::new();
        register_all(&mut registry);
        assert_views_agree(&registry);

        registry.unregister::<C>();
        assert_views_agree(&registry);
        assert!(registry.lookup(TypeId::of::<C>()).is_none());
        for (id, tag) in [
            (TypeId::of::<A>(), 1),
            (TypeId::of::<B>(), 2),
            (TypeId::of::<D>(), 4),
            (TypeId::of::<E>(), 5),
        ] {
            assert_eq!(registry.lookup(id).map(ExtensionEntry::tag), Some(tag));
        }
    }

    #[test]
    fn lookup_agrees_below_and_above_threshold() {
        let mut registry = ExtensionRegistry::new();
        registry.set(TypeId::of::<A>(), "A", 9, Some(Arc::new(payload(1))));
        registry.set(TypeId::of::<B>(), "B", 8, Some(Arc::new(payload(2))));
        assert!(registry.len() < LINEAR_LOOKUP_THRESHOLD);
        assert_eq!(registry.lookup(TypeId::of::<B>()).map(|e| e.tag()), Some(8));

        registry.set(TypeId::of::<C>(), "C", 7, Some(Arc::new(payload(3))));
        registry.set(TypeId::of::<D>(), "D", 6, Some(Arc::new(payload(4))));
        assert!(registry.len() >= LINEAR_LOOKUP_THRESHOLD);
        assert_eq!(registry.lookup(TypeId::of::<B>()).map(|e| e.tag()), Some(8));
        assert!(registry.lookup(TypeId::of::<E>()).is_none());
        assert_views_agree(&registry);
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let mut registry = ExtensionRegistry::new();
        register_all(&mut registry);
        registry.register::<B, _>(42, |_| Ok(None));
        assert_eq!(registry.len(), 5);
        let tags: Vec<u8> = registry.iter().map(ExtensionEntry::tag).collect();
        assert_eq!(tags, vec![1, 42, 3, 4, 5]);
    }

    #[test]
    fn typed_function_receives_its_type() {
        let mut registry = ExtensionRegistry::new();
        registry.register::<u32, _>(3, |v| Ok(Some(Bytes::copy_from_slice(&v.to_be_bytes()))));
        let entry = registry.lookup(TypeId::of::<u32>()).expect("registered");
        let bytes = entry.encode(&7_u32).expect("encode").expect("payload");
        assert_eq!(&bytes[..], &[0, 0, 0, 7]);
        assert!(entry.encode(&"other").is_err());
    }

    #[test]
    #[traced_test]
    fn mutations_are_logged() {
        let mut registry = ExtensionRegistry::new();
        registry.register::<A, _>(1, |_| Ok(None));
        registry.unregister::<A>();
        assert!(logs_contain("extension registered"));
        assert!(logs_contain("extension removed"));
    }
}
