//! # config 模块说明
//!
//! ## 角色定位（Why）
//! - 汇总编码会话的可调参数，既可在代码中构造，也可从 TOML 片段加载；
//! - 配置在 [`HandleBuilder::build`](crate::HandleBuilder::build) 时校验一次，此后随句柄冻结。
//!
//! ## 契约说明（What）
//! - 缺省字段取 [`EncodeConfig::default`] 的值，未知字段直接拒绝，避免拼写错误被静默忽略；
//! - 校验失败返回 [`ConfigError`]，携带出错字段名。

use std::num::NonZeroU16;

use thiserror::Error;

/// 流式输出默认的缓冲区大小。
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 64;

/// 编码配置。
///
/// ```
/// use spark_encode::EncodeConfig;
///
/// let config = EncodeConfig::from_toml_str("write_ext = false\nmax_depth = 32").unwrap();
/// assert!(!config.write_ext);
/// assert_eq!(config.stream_buffer_size, 64);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeConfig {
    /// 为 `true` 时扩展类型写为“标签 + 长度 + 载荷”，否则写为原始字节串。
    pub write_ext: bool,
    /// [`Encoder::new`](crate::Encoder::new) 包装写入器时使用的缓冲区大小。
    pub stream_buffer_size: usize,
    /// 调用方向量没有容量时预分配的字节数。
    pub initial_buffer_capacity: usize,
    /// 值的最大嵌套深度，`None` 表示不限制；零在类型层面不可表示。
    pub max_depth: Option<NonZeroU16>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            write_ext: true,
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            initial_buffer_capacity: crate::sink::DEFAULT_INITIAL_CAPACITY,
            max_depth: None,
        }
    }
}

impl EncodeConfig {
    /// 解析 TOML 片段并校验。
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EncodeConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 拒绝零大小的缓冲区。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "stream_buffer_size",
                reason: "must be greater than zero",
            });
        }
        if self.initial_buffer_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "initial_buffer_capacity",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

/// 配置加载与校验错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse encode config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid encode config field `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    /// 稳定错误码，沿用 `<领域>.<语义>` 约定。
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Parse(_) => "config.parse",
            ConfigError::Invalid { .. } => "config.invalid",
        }
    }
}
