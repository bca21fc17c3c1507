//! Benchmarks for the Duck compiler.
//!
//! Run with: `cargo bench` in the core/ directory.
//!
//! Benchmark groups:
//! 1. compile_only: Compiling pre-parsed classes, sequential vs parallel
//! 2. full_pipeline: Parse + compile together
//! 3. execute: Running compiled code on the VM

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use duck_core::{CompilerOptions, VM, compile_class, parser};

/// Generate a class with `n` methods, each a small loop calling the previous one.
fn generate_class(n: usize) -> String {
    let mut source = String::from("class Gen {\n    int base = 100000;\n");
    source.push_str("    int m0(int a) { return a + base; }\n");
    for i in 1..n {
        source.push_str(&format!(
            "    int m{i}(int a) {{\n        int s = 0;\n        while (a > 0) {{ s = s + m{prev}(a) % 7; a = a - 1; }}\n        return s;\n    }}\n",
            i = i,
            prev = i - 1
        ));
    }
    source.push_str("}\n");
    source
}

fn bench_compile_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_only");

    for size in [10, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        let source = generate_class(size);
        let class = parser::parse(&source).unwrap().remove(0);

        for parallel in [false, true] {
            let options = CompilerOptions {
                parallel,
                ..CompilerOptions::default()
            };
            let id = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(id, size), &class, |b, class| {
                b.iter(|| compile_class(black_box(class), &options).unwrap());
            });
        }
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");

    for size in [10, 100] {
        let source = generate_class(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| {
                let classes = parser::parse(black_box(source)).unwrap();
                compile_class(&classes[0], &CompilerOptions::default()).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let source = include_str!("../../testcases/Fib.java");
    let class = parser::parse(source).unwrap().remove(0);
    let compiled = compile_class(&class, &CompilerOptions::default()).unwrap();
    let vm = VM::new(&compiled);

    let mut group = c.benchmark_group("execute");
    group.bench_function("fib_rec_20", |b| {
        b.iter(|| vm.invoke("rec", black_box(&[20])).unwrap())
    });
    group.bench_function("fib_iter_40", |b| {
        b.iter(|| vm.invoke("iter", black_box(&[40])).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_compile_only,
    bench_full_pipeline,
    bench_execute
);
criterion_main!(benches);
