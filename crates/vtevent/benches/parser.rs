use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use vtevent::{Extracted, InputMode, extract_event};

fn xterm_keys() -> Vec<String> {
    [
        "\x1bOP", "\x1bOQ", "\x1bOR", "\x1bOS", "\x1b[15~", "\x1b[17~", "\x1b[18~", "\x1b[19~",
        "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~", "\x1bOH", "\x1bOF",
        "\x1b[5~", "\x1b[6~", "\x1bOA", "\x1bOB", "\x1bOD", "\x1bOC",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn drain(buf: &[u8], keys: &[String], mode: InputMode) -> usize {
    let mut consumed = 0;
    let mut events = 0;
    while consumed < buf.len() {
        match extract_event(&buf[consumed..], keys, mode, false) {
            Extracted::Event { n, .. } => {
                consumed += n;
                events += 1;
            }
            Extracted::None { n: 0 } | Extracted::EscWait => break,
            Extracted::None { n } => consumed += n,
        }
    }
    events
}

fn bench_extract(c: &mut Criterion) {
    let keys = xterm_keys();
    let mode = InputMode::ESC | InputMode::MOUSE;

    let mut ascii = Vec::new();
    for _ in 0..256 {
        ascii.extend_from_slice(b"the quick brown fox ");
    }

    let mut mixed = Vec::new();
    for _ in 0..128 {
        mixed.extend_from_slice(b"\x1bOD");
        mixed.extend_from_slice(b"\x1b[<35;110;11M");
        mixed.extend_from_slice(b"\x1b[MC\x95(");
        mixed.extend_from_slice("あいうえお".as_bytes());
    }

    let mut group = c.benchmark_group("extract");
    group.throughput(Throughput::Bytes(ascii.len() as u64));
    group.bench_function("ascii", |b| b.iter(|| drain(&ascii, &keys, mode)));
    group.throughput(Throughput::Bytes(mixed.len() as u64));
    group.bench_function("mixed", |b| b.iter(|| drain(&mixed, &keys, mode)));
    group.finish();
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
