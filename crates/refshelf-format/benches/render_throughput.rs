//! Render Throughput Benchmark
//!
//! Measures bibliography and inline rendering with the built-in styles, and
//! the cost of encoding the same entries with the native and interchange codecs.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use refshelf_core::{Entry, EntryId, EntryType};
use refshelf_format::{
    BibtexCodec, BuiltinCatalog, CancelFlag, CitationEngine, Codec, CslJsonCodec, RenderMode,
};

const FAMILIES: &[&str] = &[
    "Doe", "Smith", "van Beethoven", "Lee", "Garcia", "M\u{fc}ller", "Nakamura", "Okafor",
];

const JOURNALS: &[&str] = &[
    "Journal of Stuff",
    "Transactions on Things",
    "Proceedings of the Society",
];

/// Generates a varied but reproducible set of entries.
fn generate_entries(count: usize) -> Vec<Entry> {
    (0..count)
        .map(|i| {
            let family = FAMILIES[i % FAMILIES.len()];
            let coauthor = FAMILIES[(i * 7 + 3) % FAMILIES.len()];
            let key = format!("entry{}", i);
            let entry_type = if i % 3 == 0 { EntryType::Book } else { EntryType::Article };
            Entry::new(EntryId::new(key).unwrap(), entry_type)
                .with_field("author", format!("{}, Jane and {}, Alan Mark", family, coauthor))
                .with_field("title", format!("On the {{Structure}} of Problem {}", i))
                .with_field("journal", JOURNALS[i % JOURNALS.len()])
                .with_field("publisher", "Pan Books")
                .with_field("year", (1950 + i % 70).to_string())
                .with_field("volume", (i % 40).to_string())
                .with_field("pages", format!("{}--{}", i, i + 12))
        })
        .collect()
}

fn render_benchmark(c: &mut Criterion) {
    let engine = CitationEngine::new(Arc::new(
        BuiltinCatalog::load().unwrap(),
    ));
    let cancel = CancelFlag::new();
    let mut group = c.benchmark_group("render_bibliography");

    for size in [10, 100, 1000] {
        let entries = generate_entries(size);
        group.throughput(Throughput::Elements(size as u64));
        for style in ["apa", "ieee", "chicago-author-date"] {
            let handle = engine.resolve(style).unwrap();
            group.bench_with_input(BenchmarkId::new(style, size), &size, |b, _| {
                b.iter(|| {
                    black_box(engine.render(&entries, &handle, RenderMode::Bibliography, &cancel))
                })
            });
        }
    }
    group.finish();

    let mut group = c.benchmark_group("render_inline");
    let entries = generate_entries(100);
    let apa = engine.resolve("apa").unwrap();
    group.bench_function("apa_100", |b| {
        b.iter(|| black_box(engine.render(&entries, &apa, RenderMode::Inline, &cancel)))
    });
    group.finish();
}

fn codec_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let entries = generate_entries(1000);
    group.throughput(Throughput::Elements(entries.len() as u64));

    let codecs: [(&str, &dyn Codec); 2] = [("bibtex", &BibtexCodec), ("csl-json", &CslJsonCodec)];
    for (name, codec) in codecs {
        group.bench_function(name, |b| b.iter(|| black_box(codec.encode_entries(&entries))));
    }
    group.finish();

    let bytes = BibtexCodec.encode_entries(&entries).unwrap();
    c.bench_function("decode_bibtex_1000", |b| {
        b.iter(|| black_box(BibtexCodec.decode(&bytes)))
    });
}

criterion_group!(benches, render_benchmark, codec_benchmark);
criterion_main!(benches);
