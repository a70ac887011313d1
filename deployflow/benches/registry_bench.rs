//! Benchmarks for stage registration and contract validation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use deployflow::contracts::{FieldKind, Schema};
use deployflow::pipeline::StageRegistry;
use deployflow::stages::BasePlatformStages;
use deployflow::testing::ScriptedStage;
use serde_json::json;
use std::sync::Arc;

fn registry_benchmark(c: &mut Criterion) {
    c.bench_function("register_chain_64", |b| {
        b.iter(|| {
            let mut registry = StageRegistry::new();
            for i in 0..64 {
                let mut stage = ScriptedStage::new(format!("{i:02}-stage"), i * 10);
                if i > 0 {
                    stage = stage.depends_on(format!("{:02}-stage", i - 1));
                }
                let _ = registry.register(Arc::new(stage));
            }
            black_box(registry.ordered_stages().count())
        });
    });

    c.bench_function("register_base_platform", |b| {
        b.iter(|| {
            let mut registry = StageRegistry::new();
            let _ = registry.register_provider(&BasePlatformStages);
            black_box(registry.len())
        });
    });
}

fn schema_benchmark(c: &mut Criterion) {
    let schema = Schema::new()
        .required("kubeconfig_filename", FieldKind::String)
        .required("node_selectors", FieldKind::map_of(FieldKind::map_of(FieldKind::String)))
        .optional("nfs_endpoint", FieldKind::String);
    let value = json!({
        "kubeconfig_filename": "/tmp/kubeconfig",
        "node_selectors": {
            "general": {"key": "kubernetes.io/os", "value": "linux"},
            "user": {"key": "kubernetes.io/os", "value": "linux"},
            "worker": {"key": "kubernetes.io/os", "value": "linux"}
        }
    });
    let Some(map) = value.as_object() else {
        return;
    };

    c.bench_function("validate_infrastructure_outputs", |b| {
        b.iter(|| black_box(schema.validate(black_box(map)).is_ok()));
    });
}

criterion_group!(benches, registry_benchmark, schema_benchmark);
criterion_main!(benches);
