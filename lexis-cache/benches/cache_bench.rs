use criterion::{criterion_group, criterion_main, Criterion};
use lexis_cache::{key, EmbeddingCache};
use lexis_core::config::CacheConfig;
use lexis_core::Provenance;

const MODEL: &str = "bce-embedding-base_v1";

fn bench_key_derive(c: &mut Criterion) {
    c.bench_function("key_derive", |b| {
        b.iter(|| key::derive("  Benevolent  ", MODEL))
    });
}

fn bench_cache_hit(c: &mut Criterion) {
    let cache = EmbeddingCache::in_memory(CacheConfig::in_memory(10_000, 0.0));
    for i in 0..1_000 {
        cache.put(&format!("word-{i}"), vec![0.1; 768], MODEL, Provenance::User);
    }
    c.bench_function("cache_get_hit_768", |b| {
        b.iter(|| cache.get("word-500", MODEL))
    });
}

fn bench_put_with_eviction(c: &mut Criterion) {
    let cache = EmbeddingCache::in_memory(CacheConfig::in_memory(500, 0.0));
    let mut i = 0u64;
    c.bench_function("cache_put_evicting", |b| {
        b.iter(|| {
            i += 1;
            cache.put(&format!("word-{i}"), vec![0.1; 768], MODEL, Provenance::User)
        })
    });
}

criterion_group!(benches, bench_key_derive, bench_cache_hit, bench_put_with_eviction);
criterion_main!(benches);
