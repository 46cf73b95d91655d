//! Benchmarks for study composition and workflow resolution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use niflow::config::NiflowConfig;
use niflow::studies::{create_motion_detection_study, t1_study, MotionDetectionScans, ReferenceType};

fn config() -> NiflowConfig {
    let mut config = NiflowConfig::default().with_fsl_dir("/opt/fsl");
    config.reference_data_dir = Some("/data/reference".into());
    config
}

fn session(scans: usize) -> MotionDetectionScans {
    (0..scans).fold(
        MotionDetectionScans::new("t1_ref", ReferenceType::T1),
        |scans, i| scans.with_t1(format!("t1_{i}")).with_epi(format!("bold_{i}")),
    )
}

fn composition_benchmark(c: &mut Criterion) {
    let config = config();

    c.bench_function("compose_t1", |b| {
        b.iter(|| black_box(t1_study(&config)))
    });

    let scans = session(4);
    c.bench_function("compose_motion_detection_8_scans", |b| {
        b.iter(|| black_box(create_motion_detection_study(&config, "md", &scans)))
    });

    let setup = create_motion_detection_study(&config, "md", &scans).unwrap();
    let study = setup.study("subject").unwrap();
    c.bench_function("resolve_motion_detection_output", |b| {
        b.iter(|| black_box(study.workflow(&["motion_detection_output"])))
    });
}

criterion_group!(benches, composition_benchmark);
criterion_main!(benches);
