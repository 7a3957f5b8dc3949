//! 字节汇与时间布局的性质验证。
//!
//! - 缓冲区后端：任意写入序列后 `len <= capacity`、容量单调不减、内容等于各次写入的拼接，
//!   且每次重新分配都遵循 `2 × 容量 + n` 的增长律；
//! - 两种后端对同一写入序列产出相同字节；
//! - 时间布局的长度只由秒数范围、纳秒是否为零与是否带时区决定。

use proptest::prelude::*;
use spark_encode::{ByteSink, BytesSink, IoSink, MAX_TIME_LEN, Timestamp, encode_time};

#[derive(Clone, Debug)]
enum Op {
    Byte(u8),
    Pair(u8, u8),
    Triple(u8, u8, u8),
    Quad(u8, u8, u8, u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Chunk(Vec<u8>),
    Text(String),
}

impl Op {
    /// 大端序下该写入产出的字节。
    fn expected(&self) -> Vec<u8> {
        match self {
            Op::Byte(b) => vec![*b],
            Op::Pair(a, b) => vec![*a, *b],
            Op::Triple(a, b, c) => vec![*a, *b, *c],
            Op::Quad(a, b, c, d) => vec![*a, *b, *c, *d],
            Op::U16(v) => v.to_be_bytes().to_vec(),
            Op::U32(v) => v.to_be_bytes().to_vec(),
            Op::U64(v) => v.to_be_bytes().to_vec(),
            Op::Chunk(bytes) => bytes.clone(),
            Op::Text(text) => text.as_bytes().to_vec(),
        }
    }

    fn apply<S: ByteSink>(&self, sink: &mut S) {
        let result = match self {
            Op::Byte(b) => sink.write_byte(*b),
            Op::Pair(a, b) => sink.write_2bytes(*a, *b),
            Op::Triple(a, b, c) => sink.write_3bytes(*a, *b, *c),
            Op::Quad(a, b, c, d) => sink.write_4bytes(*a, *b, *c, *d),
            Op::U16(v) => sink.write_u16(*v),
            Op::U32(v) => sink.write_u32(*v),
            Op::U64(v) => sink.write_u64(*v),
            Op::Chunk(bytes) => sink.write_bytes(bytes),
            Op::Text(text) => sink.write_str(text),
        };
        result.expect("内存目标不会失败");
    }
}

fn writes() -> impl Strategy<Value = Vec<Op>> {
    let write = prop_oneof![
        any::<u8>().prop_map(Op::Byte),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::Pair(a, b)),
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(a, b, c)| Op::Triple(a, b, c)),
        any::<[u8; 4]>().prop_map(|[a, b, c, d]| Op::Quad(a, b, c, d)),
        any::<u16>().prop_map(Op::U16),
        any::<u32>().prop_map(Op::U32),
        any::<u64>().prop_map(Op::U64),
        prop::collection::vec(any::<u8>(), 0..300).prop_map(Op::Chunk),
        "[a-z]{0,40}".prop_map(Op::Text),
    ];
    prop::collection::vec(write, 0..64)
}

proptest! {
    #[test]
    fn buffer_sink_keeps_its_invariants(ops in writes(), initial in 1_usize..128) {
        let mut out = Vec::new();
        let mut expected = Vec::new();
        {
            let mut sink = BytesSink::with_initial_capacity(&mut out, initial);
            prop_assert!(sink.capacity() >= initial);
            for op in &ops {
                let before = sink.capacity();
                let len_before = sink.len();
                let n = op.expected().len();
                op.apply(&mut sink);
                let after = sink.capacity();

                prop_assert!(sink.len() <= after);
                prop_assert!(after >= before);
                prop_assert_eq!(sink.len(), len_before + n);
                if len_before + n > before {
                    prop_assert!(after >= 2 * before + n);
                } else {
                    prop_assert_eq!(after, before);
                }
                expected.extend(op.expected());
            }
            sink.flush().expect("flush");
            prop_assert_eq!(sink.as_slice(), &expected[..]);
        }
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn both_backends_produce_the_same_bytes(ops in writes()) {
        let mut buffered = Vec::new();
        let mut bytes_sink = BytesSink::new(&mut buffered);
        let mut io_sink = IoSink::buffered(Vec::new(), 16);
        for op in &ops {
            op.apply(&mut bytes_sink);
            op.apply(&mut io_sink);
        }
        bytes_sink.flush().expect("flush");
        io_sink.flush().expect("flush");
        let streamed = io_sink.into_inner().into_inner().expect("已刷新");
        drop(bytes_sink);
        prop_assert_eq!(buffered, streamed);
    }

    #[test]
    fn time_layout_length_follows_the_fields(
        secs in any::<i64>(),
        nanos in prop_oneof![Just(0_u32), 1_u32..1_000_000_000],
        offset in prop::option::of(-64_800_i32..=64_800),
    ) {
        let t = Timestamp { secs, nanos, offset };
        let payload = encode_time(&t);

        let short = secs > i64::from(i32::MIN) && secs < i64::from(i32::MAX);
        let mut len = if short { 4 } else { 8 };
        if nanos != 0 {
            len += 4;
        }
        if offset.is_some() {
            len += 2;
        }
        if !short && nanos == 0 {
            len += 1;
        }
        prop_assert_eq!(payload.len(), len);
        prop_assert!(payload.len() <= MAX_TIME_LEN);

        let head = if short {
            i64::from(i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]))
        } else {
            let mut raw = [0_u8; 8];
            raw.copy_from_slice(&payload[..8]);
            i64::from_be_bytes(raw)
        };
        prop_assert_eq!(head, secs);
    }
}
