use criterion::{criterion_group, criterion_main, Criterion};
use dao_cache::{Cache, CacheEntity, Field, FieldValue};
use std::hint::black_box;

#[derive(Clone)]
struct Customer {
    id: u64,
    region: &'static str,
}

impl CacheEntity for Customer {
    fn table_name() -> &'static str {
        "Customer"
    }

    fn field_value(&self, field: &Field) -> Option<FieldValue> {
        match field.as_str() {
            "ID" => Some(self.id.into()),
            "Region" => Some(self.region.into()),
            _ => None,
        }
    }
}

const REGIONS: [&str; 4] = ["north", "south", "east", "west"];

fn populated_cache(size: u64) -> Cache {
    let cache = Cache::default();
    cache
        .table::<Customer>()
        .with_key("ID")
        .with_index("Region")
        .activate()
        .expect("activate table");
    cache
        .add_entries((0..size).map(|id| Customer {
            id,
            region: REGIONS[(id % 4) as usize],
        }))
        .expect("populate table");
    cache
}

fn bench_add_entry(c: &mut Criterion) {
    let cache = populated_cache(0);
    let mut next = 0u64;

    c.bench_function("cache/add_entry", |b| {
        b.iter(|| {
            next += 1;
            cache
                .add_entry(black_box(Customer {
                    id: next % 10_000,
                    region: "north",
                }))
                .expect("add entry");
        });
    });
}

fn bench_get(c: &mut Criterion) {
    let cache = populated_cache(10_000);

    c.bench_function("cache/get_hit", |b| {
        b.iter(|| {
            let customer: Customer = cache.get(black_box(4_321u64)).expect("get");
            black_box(customer.id);
        });
    });

    c.bench_function("cache/get_miss", |b| {
        b.iter(|| {
            black_box(cache.get::<Customer>(black_box(99_999u64)).is_err());
        });
    });
}

fn bench_get_all_where(c: &mut Criterion) {
    let cache = populated_cache(10_000);

    c.bench_function("cache/get_all_where_scan", |b| {
        b.iter(|| {
            let found = cache
                .get_all_where::<Customer>("Region", black_box("east"))
                .expect("scan");
            black_box(found.len());
        });
    });
}

fn bench_purge(c: &mut Criterion) {
    let cache = populated_cache(10_000);

    c.bench_function("cache/purge_nothing_expired", |b| {
        b.iter(|| black_box(cache.purge_expired_entries()));
    });
}

criterion_group!(
    benches,
    bench_add_entry,
    bench_get,
    bench_get_all_where,
    bench_purge
);
criterion_main!(benches);
