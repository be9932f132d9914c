use criterion::{criterion_group, criterion_main, Criterion};
use lrtable::grammar::{Grammar, GrammarDef, GrammarDefError};
use lrtable_tests::grammars;
use std::hint::black_box;

criterion_main!(benches);
criterion_group!(benches, bench_simple, bench_conflicts, bench_min_caml);

fn bench_simple(c: &mut Criterion) {
    bench_table_gen(c, "g_simple1", grammars::g_simple1);
    bench_table_gen(c, "g_simple2", grammars::g_simple2);
    bench_table_gen(c, "g2", grammars::g2);
    bench_table_gen(c, "with_nullable", grammars::with_nullable);
}

fn bench_conflicts(c: &mut Criterion) {
    bench_table_gen(c, "arithmetic", grammars::arithmetic);
    bench_table_gen(c, "dangling_else", grammars::dangling_else);
}

fn bench_min_caml(c: &mut Criterion) {
    bench_table_gen(c, "min_caml", grammars::min_caml);
}

fn bench_table_gen(
    c: &mut Criterion,
    name: &str,
    f: impl FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
) {
    let grammar = Grammar::define(f).unwrap();
    c.bench_function(name, |b| {
        b.iter(|| {
            let _output = black_box(lrtable::compute(&grammar).unwrap());
        });
    });
}
