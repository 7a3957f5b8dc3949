use tracing::trace;

use crate::error::EncodeError;
use crate::sealed::Sealed;

use super::ByteSink;

/// 调用方向量没有容量时分配的初始大小。
pub(crate) const DEFAULT_INITIAL_CAPACITY: usize = 64;

/// 直接写入调用方 `Vec<u8>` 的缓冲区字节汇。
///
/// # 设计背景（Why）
/// - 调用方在多次编码之间复用同一个向量，容量足够时整个编码过程零额外分配；
/// - 增长采用 `2 × 容量 + n` 的固定规律，在频繁追加小块数据的场景下总拷贝量最小。
///
/// # 逻辑解析（How）
/// - 向量的 `len` 作为“可见窗口”，`cursor` 记录逻辑长度，写入总是落在 `[cursor, cursor + n)`；
/// - [`grow`](Self::grow) 在逻辑长度超过容量时按增长律重新分配并拷贝已写入前缀，
///   仅超过窗口时把窗口扩展到整个容量；
/// - [`ByteSink::flush`] 把向量截断到逻辑长度，容量保留给下一次编码。
///
/// # 契约说明（What）
/// - 任意写入序列后 `len() <= capacity()`，且单次会话内容量单调不减；
/// - 构造时会清空向量原有内容。
#[derive(Debug)]
pub struct BytesSink<'a> {
    buf: &'a mut Vec<u8>,
    cursor: usize,
}

impl<'a> BytesSink<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self::with_initial_capacity(buf, DEFAULT_INITIAL_CAPACITY)
    }

    /// 向量没有容量时先分配 `initial` 字节；已有容量则原样复用。
    pub fn with_initial_capacity(buf: &'a mut Vec<u8>, initial: usize) -> Self {
        if buf.capacity() == 0 {
            *buf = Vec::with_capacity(initial);
        }
        buf.clear();
        Self { buf, cursor: 0 }
    }

    /// 当前逻辑长度。
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// 当前物理容量。
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// 已写入的逻辑前缀。
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.cursor]
    }

    /// 为 `n` 个新字节预留空间，返回写入起点。
    pub fn grow(&mut self, n: usize) -> usize {
        let offset = self.cursor;
        let end = offset + n;
        let capacity = self.buf.capacity();
        if end > capacity {
            let target = 2 * capacity + n;
            let mut next = Vec::with_capacity(target);
            next.extend_from_slice(&self.buf[..offset]);
            next.resize(next.capacity(), 0);
            trace!(from = capacity, to = next.capacity(), "bytes sink reallocated");
            *self.buf = next;
        } else if end > self.buf.len() {
            self.buf.resize(capacity, 0);
        }
        self.cursor = end;
        offset
    }

    fn put(&mut self, src: &[u8]) {
        let at = self.grow(src.len());
        self.buf[at..at + src.len()].copy_from_slice(src);
    }
}

impl Sealed for BytesSink<'_> {}

impl ByteSink for BytesSink<'_> {
    fn write_u16(&mut self, v: u16) -> Result<(), EncodeError> {
        self.put(&v.to_be_bytes());
        Ok(())
    }

    fn write_u32(&mut self, v: u32) -> Result<(), EncodeError> {
        self.put(&v.to_be_bytes());
        Ok(())
    }

    fn write_u64(&mut self, v: u64) -> Result<(), EncodeError> {
        self.put(&v.to_be_bytes());
        Ok(())
    }

    fn write_bytes(&mut self, b: &[u8]) -> Result<(), EncodeError> {
        self.put(b);
        Ok(())
    }

    fn write_byte(&mut self, b: u8) -> Result<(), EncodeError> {
        let at = self.grow(1);
        self.buf[at] = b;
        Ok(())
    }

    fn write_2bytes(&mut self, b1: u8, b2: u8) -> Result<(), EncodeError> {
        self.put(&[b1, b2]);
        Ok(())
    }

    fn write_3bytes(&mut self, b1: u8, b2: u8, b3: u8) -> Result<(), EncodeError> {
        self.put(&[b1, b2, b3]);
        Ok(())
    }

    fn write_4bytes(&mut self, b1: u8, b2: u8, b3: u8, b4: u8) -> Result<(), EncodeError> {
        self.put(&[b1, b2, b3, b4]);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EncodeError> {
        self.buf.truncate(self.cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_vector_gets_initial_capacity() {
        let mut out = Vec::new();
        let sink = BytesSink::new(&mut out);
        assert!(sink.capacity() >= DEFAULT_INITIAL_CAPACITY);
        assert!(sink.is_empty());
    }

    #[test]
    fn growth_follows_two_c_plus_n() {
        let mut out = Vec::with_capacity(8);
        let mut sink = BytesSink::new(&mut out);
        let c = sink.capacity();
        sink.write_bytes(&vec![1; c - 2]).expect("fits");
        assert_eq!(sink.capacity(), c);

        // Why: 剩余 2 字节，写入 5 字节必须触发一次按 2C + n 的重新分配。
        sink.write_bytes(&[7; 5]).expect("grows");
        assert_eq!(sink.capacity(), 2 * c + 5);
        assert_eq!(sink.len(), c + 3);
        assert_eq!(&sink.as_slice()[c - 2..], &[7; 5]);
    }

    #[test]
    fn flush_truncates_and_keeps_capacity() {
        let mut out = vec![0xFF; 32];
        {
            let mut sink = BytesSink::new(&mut out);
            sink.write_u32(0xDEAD_BEEF).expect("u32");
            sink.write_byte(1).expect("byte");
            sink.flush().expect("flush");
        }
        assert_eq!(out, vec![0xDE, 0xAD, 0xBE, 0xEF, 1]);
        assert!(out.capacity() >= 32);
    }

    #[test]
    fn reuse_across_sessions_does_not_reallocate() {
        let mut out = Vec::with_capacity(16);
        let first_capacity;
        {
            let mut sink = BytesSink::new(&mut out);
            first_capacity = sink.capacity();
            sink.write_str("hello").expect("str");
            sink.flush().expect("flush");
        }
        {
            let mut sink = BytesSink::new(&mut out);
            sink.write_str("hey").expect("str");
            sink.flush().expect("flush");
            assert_eq!(sink.capacity(), first_capacity);
        }
        assert_eq!(out, b"hey");
    }
}
