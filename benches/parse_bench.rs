//! Markdown ingestion and grouping benchmarks

use std::fmt::Write;

use abstractu_content::markdown::parse_markdown;
use abstractu_content::render::group;
use abstractu_content::{Cid, Sentence};
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn generate_document(sections: usize) -> String {
    let mut source = String::new();
    for i in 0..sections {
        let _ = write!(
            source,
            "## Section {i}\n\nOpening paragraph for section {i},\nwrapped over two lines.\n\n\
             1. First step\n2. Second step\n   - detail a\n   - detail b\n3. Third step\n\n\
             > A quoted remark.\n\n```rust\nfn main() {{}}\n```\n\n---\n\n"
        );
    }
    source
}

fn bench_parse_small(c: &mut Criterion) {
    let cid = Cid::parse("b").expect("cid");
    let source = "# Title\n\nFirst para.\n\n- item A\n- item B\n";

    c.bench_function("parse_small_document", |b| {
        b.iter(|| parse_markdown(black_box(source), cid))
    });
}

fn bench_parse_large(c: &mut Criterion) {
    let cid = Cid::parse("b").expect("cid");
    let source = generate_document(100);

    c.bench_function("parse_large_document", |b| {
        b.iter(|| parse_markdown(black_box(&source), cid))
    });
}

fn bench_group(c: &mut Criterion) {
    let cid = Cid::parse("b").expect("cid");
    let now = Utc::now();
    let sentences: Vec<Sentence> = parse_markdown(&generate_document(100), cid)
        .into_iter()
        .zip(0u32..)
        .map(|(fragment, sid)| Sentence {
            cid,
            sid,
            psid: sid.checked_sub(1),
            nsid: Some(sid + 1),
            kind: fragment.kind,
            content: fragment.content,
            published_at: now,
        })
        .collect();

    c.bench_function("group_large_chain", |b| b.iter(|| group(black_box(&sentences))));
}

criterion_group!(benches, bench_parse_small, bench_parse_large, bench_group);
criterion_main!(benches);
