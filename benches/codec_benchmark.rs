use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use store_backup::backup::codec::{decode, encode};
use store_backup::backup::{filename_for, BackupFile, BackupRecord, KeyValueBackupManager};
use store_backup::pattern::glob_match;
use store_backup::store::MemoryStore;
use tokio::runtime::Runtime;

// Filename derivation benchmarks
fn benchmark_filenames(c: &mut Criterion) {
    let mut group = c.benchmark_group("filenames");

    group.bench_function("short_pattern", |b| {
        b.iter(|| black_box(filename_for(black_box("session:*"))))
    });

    let long = format!("tenant:{}:*", "a".repeat(200));
    group.bench_function("hashed_pattern", |b| {
        b.iter(|| black_box(filename_for(black_box(&long))))
    });

    group.finish();
}

// Glob matching benchmarks
fn benchmark_glob(c: &mut Criterion) {
    let mut group = c.benchmark_group("glob_match");

    let cases = [
        ("prefix", "session:*", "session:8f14e45fceea167a5a36dedd4bea2543"),
        ("class", "user:[0-9]*:profile", "user:42:profile"),
        ("backtracking", "*a*a*a*b", "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaac"),
    ];

    for (name, pattern, key) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &(pattern, key), |b, (p, k)| {
            b.iter(|| black_box(glob_match(black_box(p), black_box(k))))
        });
    }

    group.finish();
}

// Backup file encoding benchmarks
fn benchmark_file_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_codec");

    for size in [10usize, 1_000, 10_000] {
        let file: BackupFile = (0..size)
            .map(|i| {
                (
                    format!("session:{}", i),
                    BackupRecord {
                        value: "AAUAdmFsdWULAF7bUOhc2ZR4".to_string(),
                        ttl: if i % 2 == 0 { -1 } else { 60_000 },
                    },
                )
            })
            .collect();
        let bytes = encode(&file).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", size), &file, |b, file| {
            b.iter(|| black_box(encode(file).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(decode(bytes).unwrap()))
        });
    }

    group.finish();
}

// End-to-end backup against the in-memory store
fn benchmark_memory_backup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let store = MemoryStore::new().with_page_size(100);
    for i in 0..1_000 {
        store.set(format!("bench:{}", i), vec![b'x'; 256]);
    }
    let manager = KeyValueBackupManager::new(Box::new(store));

    c.bench_function("memory_backup_1000_keys", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(manager.backup("bench:*", dir.path()).await.unwrap())
            })
        })
    });
}

criterion_group!(
    benches,
    benchmark_filenames,
    benchmark_glob,
    benchmark_file_codec,
    benchmark_memory_backup
);
criterion_main!(benches);
