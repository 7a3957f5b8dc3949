use std::io::{self, BufWriter, Write};

use crate::error::EncodeError;
use crate::sealed::Sealed;

use super::ByteSink;

/// 基于 `io::Write` 的流式字节汇。
///
/// # 逻辑解析（How）
/// - 每次写入只调用一次 [`Write::write`]，仅在 [`io::ErrorKind::Interrupted`] 时重试；
/// - 若写入器返回的字节数少于请求数，视为输出端损坏并返回 [`EncodeError::ShortWrite`]，
///   不会尝试补写剩余部分；
/// - 对小块写入开销较大的目标（文件、套接字），使用 [`IoSink::buffered`] 包装一层 `BufWriter`。
///
/// # 契约说明（What）
/// - [`ByteSink::flush`] 直接委托给写入器的 `flush`；
/// - 出错后已写入的字节不会回滚。
#[derive(Debug)]
pub struct IoSink<W: Write> {
    w: W,
}

impl<W: Write> IoSink<W> {
    /// 直接使用调用方的写入器，不做额外缓冲。
    pub fn new(w: W) -> Self {
        Self { w }
    }

    /// 以容量为 `capacity` 的 `BufWriter` 包装写入器。
    pub fn buffered(w: W, capacity: usize) -> IoSink<BufWriter<W>> {
        IoSink {
            w: BufWriter::with_capacity(capacity, w),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.w
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.w
    }

    /// 取回写入器。缓冲后端需先调用 [`ByteSink::flush`]，否则残留数据由 `BufWriter` 的析构负责。
    pub fn into_inner(self) -> W {
        self.w
    }

    fn write_checked(&mut self, buf: &[u8]) -> Result<(), EncodeError> {
        if buf.is_empty() {
            return Ok(());
        }
        let written = loop {
            match self.w.write(buf) {
                Ok(n) => break n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(EncodeError::Io(err)),
            }
        };
        if written != buf.len() {
            return Err(EncodeError::ShortWrite {
                expected: buf.len(),
                written,
            });
        }
        Ok(())
    }
}

impl<W: Write> Sealed for IoSink<W> {}

impl<W: Write> ByteSink for IoSink<W> {
    fn write_u16(&mut self, v: u16) -> Result<(), EncodeError> {
        self.write_checked(&v.to_be_bytes())
    }

    fn write_u32(&mut self, v: u32) -> Result<(), EncodeError> {
        self.write_checked(&v.to_be_bytes())
    }

    fn write_u64(&mut self, v: u64) -> Result<(), EncodeError> {
        self.write_checked(&v.to_be_bytes())
    }

    fn write_bytes(&mut self, b: &[u8]) -> Result<(), EncodeError> {
        self.write_checked(b)
    }

    fn write_byte(&mut self, b: u8) -> Result<(), EncodeError> {
        self.write_checked(&[b])
    }

    fn write_2bytes(&mut self, b1: u8, b2: u8) -> Result<(), EncodeError> {
        self.write_checked(&[b1, b2])
    }

    fn write_3bytes(&mut self, b1: u8, b2: u8, b3: u8) -> Result<(), EncodeError> {
        self.write_checked(&[b1, b2, b3])
    }

    fn write_4bytes(&mut self, b1: u8, b2: u8, b3: u8, b4: u8) -> Result<(), EncodeError> {
        self.write_checked(&[b1, b2, b3, b4])
    }

    fn flush(&mut self) -> Result<(), EncodeError> {
        self.w.flush().map_err(EncodeError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 每次最多接受 `limit` 个字节的写入器，用于模拟短写。
    struct Trickle {
        limit: usize,
        out: Vec<u8>,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// 第一次写入返回 `Interrupted`，之后正常写入。
    struct InterruptOnce {
        fired: bool,
        out: Vec<u8>,
    }

    impl Write for InterruptOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.fired {
                self.fired = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn integers_are_big_endian() {
        let mut sink = IoSink::new(Vec::new());
        sink.write_u16(0x0102).expect("u16");
        sink.write_u32(0x0304_0506).expect("u32");
        sink.write_u64(0x0708_090a_0b0c_0d0e).expect("u64");
        sink.write_4bytes(1, 2, 3, 4).expect("4 bytes");
        assert_eq!(
            sink.into_inner(),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 1, 2, 3, 4]
        );
    }

    #[test]
    fn short_write_is_reported() {
        let mut sink = IoSink::new(Trickle {
            limit: 1,
            out: Vec::new(),
        });
        sink.write_byte(9).expect("single byte fits");
        let err = sink.write_str("abc").expect_err("写入器只接受 1 字节");
        assert!(matches!(
            err,
            EncodeError::ShortWrite {
                expected: 3,
                written: 1
            }
        ));
        // Why: 短写后不补写，输出端内容即为已接受的部分。
        assert_eq!(sink.get_ref().out, vec![9, b'a']);
    }

    #[test]
    fn interrupted_write_is_retried() {
        let mut sink = IoSink::new(InterruptOnce {
            fired: false,
            out: Vec::new(),
        });
        sink.write_2bytes(0xAA, 0xBB).expect("retried after interrupt");
        assert_eq!(sink.into_inner().out, vec![0xAA, 0xBB]);
    }

    #[test]
    fn buffered_sink_delivers_on_flush() {
        let mut sink = IoSink::buffered(Vec::new(), 64);
        sink.write_3bytes(1, 2, 3).expect("buffered write");
        assert!(sink.get_ref().get_ref().is_empty());
        sink.flush().expect("flush");
        assert_eq!(sink.get_ref().get_ref(), &vec![1, 2, 3]);
    }
}
