use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use telemetry_conditions::{
    compute_condition, Condition, ConditionConfiguration, ConditionContext, CriterionConfiguration, CriterionId,
    Datum, DomainObject, EngineConfig, Identifier, InMemoryObjects, InMemoryTelemetry, Predicate, TelemetryMetadata,
    Trigger, Value, ValueMetadata,
};

fn bench_compute_condition(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_condition");

    // 64 criteria, every other one true, the last one missing.
    let ids: Vec<CriterionId> = (0..64).map(CriterionId::new).collect();
    let results: HashMap<CriterionId, bool> = ids[..63].iter().map(|id| (*id, id.get() % 2 == 0)).collect();

    group.throughput(Throughput::Elements(ids.len() as u64));
    group.bench_function("all_64", |b| {
        b.iter(|| compute_condition(black_box(&ids), black_box(&results), true));
    });
    group.bench_function("any_64", |b| {
        b.iter(|| compute_condition(black_box(&ids), black_box(&results), false));
    });
    group.finish();
}

fn bench_predicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate_test");
    group.throughput(Throughput::Elements(1));

    let between = Predicate::compile("between", &[Value::Int(-1), Value::from("1")]).unwrap();
    let matches = Predicate::compile("textMatches", &[Value::from("^ERR-[0-9]+$")]).unwrap();
    let number = Value::Float(0.25);
    let text = Value::from("ERR-1042");

    group.bench_function("between", |b| b.iter(|| between.test(black_box(Some(&number)))));
    group.bench_function("text_matches", |b| b.iter(|| matches.test(black_box(Some(&text)))));
    group.finish();
}

fn bench_condition_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_pipeline");
    group.throughput(Throughput::Elements(1));

    group.bench_function("publish_and_process_8_criteria", |b| {
        b.iter_custom(|iters| {
            let objects = InMemoryObjects::new();
            let telemetry = InMemoryTelemetry::new();
            let sine = Identifier::new("bench", "sine");
            objects
                .insert(DomainObject::new(sine.clone(), "generator").with_telemetry(TelemetryMetadata::new(vec![
                    ValueMetadata::new("utc").domain(1),
                    ValueMetadata::new("sin").range(1),
                ])))
                .unwrap();

            let mut configuration = ConditionConfiguration::new(Identifier::from_key("bench"), Trigger::All);
            for i in 0..8 {
                configuration = configuration.with_criterion(CriterionConfiguration::new(
                    "greaterThan",
                    vec![Value::Float(-1.0 + f64::from(i) * 0.1)],
                    "sin",
                    "bench:sine",
                ));
            }
            let context = ConditionContext::new(Arc::new(objects), Arc::new(telemetry.clone()));
            let mut condition = Condition::new(configuration, context, EngineConfig::default());
            condition.subscribe();
            condition.process_events();

            let start = Instant::now();
            for i in 0..iters {
                #[allow(clippy::cast_precision_loss)]
                let datum = Datum::new().with("utc", 0).with("sin", (i as f64).sin());
                telemetry.publish(&sine, datum).unwrap();
                condition.process_events();
            }
            start.elapsed()
        });
    });
    group.finish();
}

criterion_group!(evaluate, bench_compute_condition, bench_predicates, bench_condition_pipeline);
criterion_main!(evaluate);
