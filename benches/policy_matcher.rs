//! Benchmarks for policy matching and the repository cache.
//!
//! Benchmark targets:
//! - Tip matching against a handful of policies: <1us
//! - Containment matching over 100 branches: <10us
//! - Pattern compilation for 50 policies: <100us

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]

use codeintel_retention::gc::{
    CompiledPatterns, RepositoryCache, contains_policy_matches, tip_policy_matches,
};
use codeintel_retention::{PolicyKind, RefDescription, RetentionPolicy};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

fn policies(count: usize) -> Vec<RetentionPolicy> {
    (0..count)
        .map(|i| {
            let kind = match i % 3 {
                0 => PolicyKind::GitTree,
                1 => PolicyKind::GitTag,
                _ => PolicyKind::GitCommit,
            };
            let id = i64::try_from(i).unwrap_or(i64::MAX);
            RetentionPolicy::new(id, kind, format!("team-{i}/*"))
                .with_retain_intermediate_commits(i % 2 == 0)
        })
        .collect()
}

fn branches(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("feature/branch-{i}")).collect()
}

fn bench_pattern_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_compilation");
    group.measurement_time(Duration::from_secs(5));

    for count in [5, 50, 500] {
        let policies = policies(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &policies, |b, p| {
            b.iter(|| CompiledPatterns::compile(black_box(p)));
        });
    }

    group.finish();
}

fn bench_tip_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("tip_matching");
    group.measurement_time(Duration::from_secs(5));

    let mut all = policies(20);
    all.push(RetentionPolicy::new(99, PolicyKind::GitTag, "v*"));
    let patterns = CompiledPatterns::compile(&all).unwrap_or_default();
    let refs: Vec<&RetentionPolicy> = all.iter().collect();
    let tips = vec![
        RefDescription::branch("develop"),
        RefDescription::tag("v1.2.3"),
    ];

    group.bench_function("match", |b| {
        b.iter(|| tip_policy_matches(black_box(&refs), &patterns, "deadbeef01", black_box(&tips)));
    });
    group.bench_function("miss", |b| {
        b.iter(|| tip_policy_matches(black_box(&refs[..20]), &patterns, "deadbeef01", black_box(&tips)));
    });

    group.finish();
}

fn bench_containment_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("containment_matching");
    group.measurement_time(Duration::from_secs(5));

    let all = policies(20);
    let patterns = CompiledPatterns::compile(&all).unwrap_or_default();
    let refs: Vec<&RetentionPolicy> = all.iter().filter(|p| p.retain_intermediate_commits).collect();

    for count in [10, 100, 1000] {
        let branches = branches(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &branches, |b, br| {
            b.iter(|| contains_policy_matches(black_box(&refs), &patterns, black_box(br)));
        });
    }

    group.finish();
}

fn bench_repository_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository_cache");
    group.measurement_time(Duration::from_secs(5));

    let commits: Vec<String> = (0..20_000).map(|i| format!("{i:040x}")).collect();

    group.bench_function("insert_with_eviction", |b| {
        b.iter(|| {
            let mut cache = RepositoryCache::new();
            for commit in &commits {
                cache.insert_branches_containing(commit.as_str(), vec!["main".to_string()]);
            }
            black_box(cache.branches_containing_len())
        });
    });

    let mut cache = RepositoryCache::new();
    for commit in commits.iter().step_by(2) {
        cache.mark_protected(commit.as_str());
    }
    group.bench_function("any_protected", |b| {
        b.iter(|| black_box(cache.any_protected(black_box(&commits[1..101]))));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_pattern_compilation,
    bench_tip_matching,
    bench_containment_matching,
    bench_repository_cache
);
criterion_main!(benches);
