//! Benchmarks for graph parsing and layout.
//!
//! Run with: `cargo bench --bench layout`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use turbo_devtools::{extract_graph_description, layout_graph, parse_edges};

/// Turbo-style graph output: `apps` apps each depending on every library,
/// libraries chained, the last one depending on the root sentinel.
fn turbo_output(apps: usize, libraries: usize) -> String {
    let mut out = String::from("• Running build\n\ndigraph {\n\tcompound = \"true\"\n");
    out.push_str("\tsubgraph \"root\" {\n");

    for app in 0..apps {
        for lib in 0..libraries {
            out.push_str(&format!(
                "\t\t\"[root] app-{}#build\" -> \"[root] @repo/lib-{}#build\"\n",
                app, lib
            ));
        }
    }
    for lib in 1..libraries {
        out.push_str(&format!(
            "\t\t\"[root] @repo/lib-{}#build\" -> \"[root] @repo/lib-{}#build\"\n",
            lib,
            lib - 1
        ));
    }
    out.push_str("\t\t\"[root] @repo/lib-0#build\" -> \"[root] ___ROOT___\"\n");
    out.push_str("\t}\n}\n");
    out
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_edges");

    for (apps, libraries) in [(5, 10), (20, 40), (50, 100)] {
        let raw = turbo_output(apps, libraries);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", apps, libraries)),
            &raw,
            |b, raw| {
                b.iter(|| {
                    let description = extract_graph_description(black_box(raw)).unwrap();
                    parse_edges(&description)
                })
            },
        );
    }

    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_graph");

    for (apps, libraries) in [(5, 10), (20, 40), (50, 100)] {
        let raw = turbo_output(apps, libraries);
        let graph = parse_edges(&extract_graph_description(&raw).unwrap());

        group.bench_with_input(
            BenchmarkId::from_parameter(graph.node_count()),
            &graph,
            |b, graph| b.iter(|| layout_graph(black_box(graph)).to_svg()),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_layout);
criterion_main!(benches);
