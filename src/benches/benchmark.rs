use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use dbus_signature::{Signature, iterate, validate};

const NETWORK_MANAGER_SETTINGS: &str = "a{sa{sv}}";
const OBJECT_MANAGER_REPLY: &str = "a{oa{sa{sv}}}";
const WIDE_STRUCT: &str = "a(sasbttttbbuuuaaynaay)a{sv}(sa(iiay)ss)ayay";

fn split_all(sig: &str) -> usize {
    iterate(sig).unwrap().map(|t| t.as_str().len()).sum()
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("validate object manager reply", |b| {
        b.iter(|| validate(black_box(OBJECT_MANAGER_REPLY)))
    });

    c.bench_function("validate wide struct", |b| {
        b.iter(|| validate(black_box(WIDE_STRUCT)))
    });

    c.bench_function("split wide struct", |b| b.iter(|| split_all(black_box(WIDE_STRUCT))));

    let signature = Signature::new(NETWORK_MANAGER_SETTINGS).unwrap();
    c.bench_function("iterate shared signature", move |b| {
        b.iter(|| signature.iter().count())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
