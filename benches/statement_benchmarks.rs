//! Benchmarks for statement building and result table naming.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sempala_runner::db::Platform;
use sempala_runner::naming::{result_table_name, sanitize_table_name, OutputFormat};
use sempala_runner::statement::{StatementBuilder, StorageFormat};

const TRANSLATED_QUERY: &str = "(SELECT DISTINCT bigtable.s AS s, bigtable.o AS comment \
    FROM rdf.bigtable_parquet bigtable \
    WHERE (bigtable.p = '<http://purl.org/dc/terms/date>'))";

// ---------------------------------------------------------------------------
// Benchmark groups
// ---------------------------------------------------------------------------

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");
    for platform in [Platform::Network, Platform::Embedded] {
        let builder = StatementBuilder::new(platform);
        group.bench_with_input(
            BenchmarkId::from_parameter(platform),
            &builder,
            |b, builder| {
                b.iter(|| {
                    builder
                        .select()
                        .distinct()
                        .parenthesized()
                        .column_as("t.s", "s")
                        .column_as("t.o", "comment")
                        .column_as("t2.o", "date")
                        .from("rdf.bigtable_parquet t")
                        .filter(black_box("t.p = 'x'"))
                        .filter("t2.o IS NOT NULL")
                        .order_by("s")
                        .limit(100)
                        .build()
                })
            },
        );
    }
    group.finish();
}

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create");
    let network = StatementBuilder::new(Platform::Network);
    group.bench_function("ctas", |b| {
        b.iter(|| {
            network
                .create_table(black_box("sempala_results.q1_sparql_1"))
                .as_select(TRANSLATED_QUERY)
                .build()
        })
    });
    group.bench_function("external_partitioned", |b| {
        b.iter(|| {
            network
                .create_external_table()
                .column("s", "STRING")
                .column("o", "STRING")
                .partitioned_by("p", "STRING")
                .fields_terminated_by('\t')
                .stored_as(StorageFormat::Parquet)
                .location(black_box("/user/hive/warehouse/triples"))
                .build()
        })
    });
    group.finish();
}

fn bench_count_wrapping(c: &mut Criterion) {
    let builder = StatementBuilder::new(Platform::Network);
    c.bench_function("count_rows", |b| {
        b.iter(|| builder.count_rows(black_box(TRANSLATED_QUERY)))
    });
}

fn bench_table_naming(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_naming");
    group.bench_function("sanitize", |b| {
        b.iter(|| sanitize_table_name(black_box(" <q1.sparql>--lubm  query ")))
    });
    group.bench_function("extvp", |b| {
        b.iter(|| {
            result_table_name(
                OutputFormat::ExtVp,
                black_box("q7.sparql"),
                Some("extvp_base"),
                1_700_000_000_000,
            )
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_select,
    bench_create,
    bench_count_wrapping,
    bench_table_naming
);
criterion_main!(benches);
