//! # handle 模块说明
//!
//! ## 角色定位（Why）
//! - 句柄把扩展注册表、编码配置与线格式工厂打包成一份进程级共享的只读配置；
//! - 采用“先配置、后冻结”：[`HandleBuilder`] 可变，[`HandleBuilder::build`] 之后的 [`Handle`]
//!   不再提供任何可变入口，编码期间修改注册表在编译期即被拒绝。
//!
//! ## 契约说明（What）
//! - 格式类型满足 `Send + Sync` 时句柄亦然，可通过 `Arc` 在线程间共享；
//! - `build` 会校验配置，失败时返回 [`ConfigError`]。

use std::any::Any;
use std::num::NonZeroU16;

use bytes::Bytes;

use crate::config::{ConfigError, EncodeConfig};
use crate::error::ExtensionError;
use crate::format::Format;
use crate::registry::ExtensionRegistry;
use crate::time::time_extension;

/// 句柄构建器。
///
/// ```
/// use spark_encode::{HandleBuilder, testing::TraceFormat};
///
/// struct Money(i64);
///
/// let handle = HandleBuilder::new(TraceFormat::new())
///     .extension::<Money, _>(1, |m| Ok(Some(m.0.to_be_bytes().to_vec().into())))
///     .time_extension(2)
///     .build()
///     .unwrap();
/// assert_eq!(handle.registry().len(), 2);
/// ```
#[derive(Debug)]
pub struct HandleBuilder<F> {
    format: F,
    registry: ExtensionRegistry,
    config: EncodeConfig,
}

impl<F: Format> HandleBuilder<F> {
    pub fn new(format: F) -> Self {
        Self {
            format,
            registry: ExtensionRegistry::new(),
            config: EncodeConfig::default(),
        }
    }

    /// 替换整份配置。
    pub fn config(mut self, config: EncodeConfig) -> Self {
        self.config = config;
        self
    }

    /// 扩展类型写为带标签的二进制块（`true`）还是原始字节串（`false`）。
    pub fn write_ext(mut self, enabled: bool) -> Self {
        self.config.write_ext = enabled;
        self
    }

    pub fn max_depth(mut self, limit: NonZeroU16) -> Self {
        self.config.max_depth = Some(limit);
        self
    }

    /// 为类型 `T` 注册扩展编码函数。
    pub fn extension<T, E>(mut self, tag: u8, encode: E) -> Self
    where
        T: Any,
        E: Fn(&T) -> Result<Option<Bytes>, ExtensionError> + Send + Sync + 'static,
    {
        self.registry.register::<T, E>(tag, encode);
        self
    }

    /// 删除类型 `T` 的扩展。
    pub fn remove_extension<T: Any>(mut self) -> Self {
        self.registry.unregister::<T>();
        self
    }

    /// 以 `tag` 注册 [`Timestamp`](crate::Timestamp) 的紧凑编码。
    pub fn time_extension(mut self, tag: u8) -> Self {
        time_extension(&mut self.registry, tag);
        self
    }

    /// 直接访问注册表，适合批量注册。
    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }

    /// 校验配置并冻结。
    pub fn build(self) -> Result<Handle<F>, ConfigError> {
        self.config.validate()?;
        Ok(Handle {
            format: self.format,
            registry: self.registry,
            config: self.config,
        })
    }
}

/// 冻结后的编码句柄。
#[derive(Debug)]
pub struct Handle<F> {
    format: F,
    registry: ExtensionRegistry,
    config: EncodeConfig,
}

impl<F: Format> Handle<F> {
    pub fn builder(format: F) -> HandleBuilder<F> {
        HandleBuilder::new(format)
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EncodeConfig {
        &self.config
    }

    pub fn write_ext(&self) -> bool {
        self.config.write_ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TraceFormat;
    use std::sync::Arc;

    struct Tagged;

    #[test]
    fn builder_applies_registry_mutations_in_order() {
        let handle = HandleBuilder::new(TraceFormat::new())
            .extension::<Tagged, _>(3, |_| Ok(None))
            .remove_extension::<Tagged>()
            .write_ext(false)
            .build()
            .expect("默认配置合法");
        assert!(handle.registry().is_empty());
        assert!(!handle.write_ext());
    }

    #[test]
    fn invalid_config_is_rejected_at_build() {
        let config = EncodeConfig {
            initial_buffer_capacity: 0,
            ..EncodeConfig::default()
        };
        let err = HandleBuilder::new(TraceFormat::new())
            .config(config)
            .build()
            .expect_err("零容量应被拒绝");
        assert_eq!(err.code(), "config.invalid");
    }

    #[test]
    fn handle_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>(_: &T) {}
        let handle = Arc::new(
            Handle::builder(TraceFormat::new())
                .time_extension(1)
                .build()
                .expect("句柄"),
        );
        assert_send_sync(&handle);
        let worker = {
            let handle = Arc::clone(&handle);
            std::thread::spawn(move || handle.registry().len())
        };
        assert_eq!(worker.join().expect("线程正常结束"), 1);
    }
}
