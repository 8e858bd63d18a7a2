use appjar::analysis::{ClassPool, ReachabilityAnalyzer};
use appjar::archive::VirtualArchive;
use appjar::classfile::builder::{ClassBuilder, Op};
use appjar::classfile::{ACC_PUBLIC, ACC_STATIC};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// `c0.run` calls `c1.run` calls ... `c{n-1}.run`; every class also has an
/// override-bearing subclass and an unused method.
fn call_chain(length: usize) -> VirtualArchive {
    let mut archive = VirtualArchive::new();
    archive
        .write(
            "java/lang/Object.class",
            ClassBuilder::new("java/lang/Object").no_super_class().build(),
        )
        .unwrap();
    let names: Vec<String> = (0..length).map(|i| format!("chain/C{}", i)).collect();
    for (i, name) in names.iter().enumerate() {
        let mut body = Vec::new();
        if let Some(next) = names.get(i + 1) {
            body.push(Op::New(next.as_str()));
            body.push(Op::Pop);
            body.push(Op::InvokeStatic(next.as_str(), "run", "()V"));
            body.push(Op::InvokeVirtual(next.as_str(), "step", "()V"));
        }
        body.push(Op::Return);
        let class = ClassBuilder::new(name)
            .method(ACC_PUBLIC | ACC_STATIC, "run", "()V", body)
            .method(ACC_PUBLIC, "step", "()V", vec![Op::Return])
            .method(ACC_PUBLIC, "unused", "()V", vec![Op::Return])
            .build();
        archive.write(&format!("{}.class", name), class).unwrap();

        let sub = format!("{}Sub", name);
        let subclass = ClassBuilder::new(&sub)
            .super_class(name)
            .method(ACC_PUBLIC, "step", "()V", vec![Op::Return])
            .build();
        archive.write(&format!("{}.class", sub), subclass).unwrap();
    }
    archive
}

fn bench_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("closure");
    for length in [100, 1000] {
        let archive = call_chain(length);
        group.bench_with_input(BenchmarkId::from_parameter(length), &archive, |b, archive| {
            b.iter(|| {
                let mut analyzer = ReachabilityAnalyzer::new(ClassPool::new(archive));
                analyzer.add_root("chain.C0.run").unwrap();
                for i in 0..length {
                    analyzer.add_class(&format!("chain.C{}Sub", i)).unwrap();
                }
                black_box(analyzer.finish().unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_closure);
criterion_main!(benches);
