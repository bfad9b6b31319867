use classifier::Classifier;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const COMMANDS: [&str; 6] = [
    "/software/hgi/softpack/installs/groups/hgi/xenium-scripts/python",
    "/software/hgi/installs/conda-audited/miniconda/bin/conda activate /lustre/envs/rnaseq",
    "/software/hgi/installs/micromamba/bin/micromamba activate /lustre/p/.snakemake/conda/1a2b",
    "/software/hgi/installs/samtools-scripts/samtools",
    "/usr/local/bin/python3",
    "ls",
];

fn bench_classify_mixed(c: &mut Criterion) {
    let classifier = Classifier::default();

    c.bench_function("classifier/classify_mixed", |b| {
        b.iter(|| {
            for command in COMMANDS {
                black_box(classifier.classify(black_box(command)));
            }
        });
    });
}

fn bench_classify_legacy_fallback(c: &mut Criterion) {
    let classifier = Classifier::default();
    let command = "/nfs/users/nfs_a/ab1/src/project/tools/bin/run-analysis --input /data/x";

    c.bench_function("classifier/classify_legacy_fallback", |b| {
        b.iter(|| black_box(classifier.classify(black_box(command))));
    });
}

criterion_group!(benches, bench_classify_mixed, bench_classify_legacy_fallback);
criterion_main!(benches);
