//! # time 模块说明
//!
//! ## 角色定位（Why）
//! - 给出扩展载荷的一个完整示例：把“时间点 + 可选时区偏移”压缩为 4 到 14 字节的二进制块；
//! - 解码端按总长度推断各字段是否出现，因此布局必须严格确定。
//!
//! ## 逻辑解析（How）
//! 依次写出（全部大端序）：
//! 1. 秒数：严格落在 `(i32::MIN, i32::MAX)` 内写 4 字节，否则写 8 字节并记为长格式；
//! 2. 纳秒非零时写 4 字节；
//! 3. 非 UTC 时写 2 字节偏移分钟数：最高位为符号，其余位为绝对值；
//! 4. 长格式且纳秒为零时追加 1 个零字节。
//!
//! ## 契约说明（What）
//! - `offset == Some(0)` 视为带时区，仍写出偏移字段；
//! - 偏移秒数按截断除法换算为分钟。

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

use crate::registry::ExtensionRegistry;
use crate::value::{Encode, Shape, StructSchema, StructView};

/// 编码结果的最大长度：8 字节秒 + 4 字节纳秒 + 2 字节偏移。
pub const MAX_TIME_LEN: usize = 14;

const OFFSET_SIGN_BIT: u16 = 1 << 15;

/// 带可选时区偏移的时间点。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// 距 Unix 纪元的秒数。
    pub secs: i64,
    /// 秒内纳秒，取值 `0..1_000_000_000`。
    pub nanos: u32,
    /// 相对 UTC 的偏移秒数（东为正），`None` 表示 UTC。
    pub offset: Option<i32>,
}

impl Timestamp {
    pub fn utc(secs: i64, nanos: u32) -> Self {
        Self {
            secs,
            nanos,
            offset: None,
        }
    }

    pub fn with_offset(secs: i64, nanos: u32, offset_secs: i32) -> Self {
        Self {
            secs,
            nanos,
            offset: Some(offset_secs),
        }
    }

    pub fn is_utc(&self) -> bool {
        self.offset.is_none()
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Timestamp::utc(after.as_secs() as i64, after.subsec_nanos()),
            Err(err) => {
                let before = err.duration();
                let mut secs = -(before.as_secs() as i64);
                let mut nanos = before.subsec_nanos();
                if nanos > 0 {
                    secs -= 1;
                    nanos = 1_000_000_000 - nanos;
                }
                Timestamp::utc(secs, nanos)
            }
        }
    }
}

/// 按紧凑布局编码时间点。
pub fn encode_time(t: &Timestamp) -> Bytes {
    let mut buf = BytesMut::with_capacity(MAX_TIME_LEN);
    let mut pad_zero = false;

    if t.secs > i64::from(i32::MIN) && t.secs < i64::from(i32::MAX) {
        buf.put_i32(t.secs as i32);
    } else {
        buf.put_i64(t.secs);
        pad_zero = t.nanos == 0;
    }
    if t.nanos != 0 {
        buf.put_u32(t.nanos);
    }
    if let Some(offset) = t.offset {
        let minutes = offset / 60;
        let mut field = minutes.unsigned_abs() as u16 & !OFFSET_SIGN_BIT;
        if minutes < 0 {
            field |= OFFSET_SIGN_BIT;
        }
        buf.put_u16(field);
    }
    if pad_zero {
        buf.put_u8(0);
    }
    buf.freeze()
}

/// 以 `tag` 把 [`Timestamp`] 的紧凑编码注册为扩展。
pub fn time_extension(registry: &mut ExtensionRegistry, tag: u8) {
    registry.register::<Timestamp, _>(tag, |t| Ok(Some(encode_time(t))));
}

// 未注册扩展时按结构体编码：`secs` 必出，`nanos` 与 `offset` 为空时省略。

impl Encode for Timestamp {
    fn shape(&self) -> Shape<'_> {
        Shape::Struct(self)
    }
}

impl StructView for Timestamp {
    fn schema(&self) -> &'static StructSchema {
        static SCHEMA: OnceLock<StructSchema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            StructSchema::builder("Timestamp")
                .field("secs", 0, false)
                .field("nanos", 1, true)
                .field("offset", 2, true)
                .build()
        })
    }

    fn field(&self, index: usize) -> Option<&dyn Encode> {
        match index {
            0 => Some(&self.secs),
            1 => Some(&self.nanos),
            2 => Some(&self.offset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn utc_in_range_without_nanos_is_four_bytes() {
        let bytes = encode_time(&Timestamp::utc(1_000, 0));
        assert_eq!(&bytes[..], &[0, 0, 0x03, 0xE8]);
    }

    #[test]
    fn nanos_add_four_bytes() {
        let bytes = encode_time(&Timestamp::utc(1_000, 5));
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[4..], &[0, 0, 0, 5]);
    }

    #[test]
    fn zoned_instant_adds_offset_field() {
        let bytes = encode_time(&Timestamp::with_offset(1_000, 0, -90 * 60));
        assert_eq!(bytes.len(), 6);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), OFFSET_SIGN_BIT | 90);

        // Why: 零偏移的非 UTC 时区同样写出偏移字段。
        let bytes = encode_time(&Timestamp::with_offset(1_000, 0, 0));
        assert_eq!(&bytes[4..], &[0, 0]);
    }

    #[test]
    fn long_form_without_nanos_is_padded() {
        let secs = i64::from(i32::MAX) + 10;
        let bytes = encode_time(&Timestamp::utc(secs, 0));
        assert_eq!(bytes.len(), 9);
        assert_eq!(&bytes[..8], &secs.to_be_bytes());
        assert_eq!(bytes[8], 0);

        // 边界值本身走长格式。
        assert_eq!(encode_time(&Timestamp::utc(i64::from(i32::MAX), 0)).len(), 9);
        assert_eq!(encode_time(&Timestamp::utc(i64::from(i32::MIN), 0)).len(), 9);
    }

    #[test]
    fn largest_layout_is_fourteen_bytes() {
        let bytes = encode_time(&Timestamp::with_offset(i64::MIN, 1, 3_600));
        assert_eq!(bytes.len(), MAX_TIME_LEN);
        assert_eq!(&bytes[12..], &[0, 60]);
    }

    #[test]
    fn offset_minutes_truncate() {
        let bytes = encode_time(&Timestamp::with_offset(0, 0, -59));
        assert_eq!(&bytes[4..], &[0, 0]);
    }

    #[test]
    fn system_time_before_epoch_borrows_a_second() {
        let t = Timestamp::from(UNIX_EPOCH - Duration::from_millis(1_500));
        assert_eq!(t, Timestamp::utc(-2, 500_000_000));
        let t = Timestamp::from(UNIX_EPOCH + Duration::new(7, 9));
        assert_eq!(t, Timestamp::utc(7, 9));
    }
}
