use criterion::{Criterion, black_box, criterion_group, criterion_main};
use chronicle_types::{Message, TokenCounter, Transcript};

fn make_conversation(n: usize) -> Transcript {
    (0..n)
        .map(|i| {
            let text = format!(
                "Message {i}: This is a moderately sized message with enough content \
                 to be realistic for token counting benchmarks."
            );
            if i % 2 == 0 {
                Message::user(format!("m{i}"), text)
            } else {
                Message::assistant(format!("m{i}"), text)
            }
        })
        .collect()
}

fn bench_token_counting(c: &mut Criterion) {
    let counter = TokenCounter::default();
    let mut group = c.benchmark_group("token_count");
    for n in [100, 1000, 10000] {
        let transcript = make_conversation(n);
        group.bench_function(format!("{n}_messages"), |b| {
            b.iter(|| counter.estimate_transcript(black_box(&transcript)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_token_counting);
criterion_main!(benches);
