use dpmatch::{
    Anchor, Component, DeformationCost, Detector, Filter, ImageView, MatchConfig, Model,
    Projection, PyramidBuilder, PyramidConfig, DEFAULT_OVERLAP_THRESHOLD, HOG_FEATURES,
    PYRAMID_FEATURES,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn make_image(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let value = ((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF;
            data.extend_from_slice(&[value as u8, (255 - value) as u8, (value / 3) as u8]);
        }
    }
    data
}

fn make_weights(len: usize, seed: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (((i * 31 + seed * 17) % 101) as f32 / 101.0) - 0.5)
        .collect()
}

fn make_model() -> Model {
    let nf = PYRAMID_FEATURES;
    let parts = (0..6)
        .map(|p| {
            Filter::part(
                6,
                6,
                nf,
                make_weights(36 * nf, p + 2),
                DeformationCost([0.0, 0.1, 0.0, 0.1]),
                Anchor {
                    x: (p % 3) as i32 * 4,
                    y: (p / 3) as i32 * 6,
                    level_offset: 10,
                },
            )
            .unwrap()
        })
        .collect();
    let root = Filter::new(7, 11, nf, make_weights(77 * nf, 1)).unwrap();
    Model::new(
        vec![Component::new(root, parts, 0.0)],
        -0.5,
        Projection::truncating(HOG_FEATURES, 6).unwrap(),
    )
    .unwrap()
}

fn bench_pipeline(c: &mut Criterion) {
    let (width, height) = (320, 240);
    let image = make_image(width, height);
    let view = ImageView::from_slice(&image, width, height, 3).unwrap();
    let model = make_model();

    let builder = PyramidBuilder::new(PyramidConfig::default());
    c.bench_function("build_pyramid_320x240", |b| {
        b.iter(|| {
            black_box(
                builder
                    .build(view, model.max_filter_dims(), model.projection())
                    .unwrap(),
            )
        });
    });

    let detector = Detector::new(PyramidConfig::default(), MatchConfig::default());
    c.bench_function("detect_320x240", |b| {
        b.iter(|| black_box(detector.detect(view, &model, DEFAULT_OVERLAP_THRESHOLD).unwrap()));
    });

    let no_prefilter = Detector::new(
        PyramidConfig::default(),
        MatchConfig {
            prefilter_slack: f32::INFINITY,
            ..MatchConfig::default()
        },
    );
    c.bench_function("detect_320x240_no_prefilter", |b| {
        b.iter(|| {
            black_box(
                no_prefilter
                    .detect(view, &model, DEFAULT_OVERLAP_THRESHOLD)
                    .unwrap(),
            )
        });
    });

    if cfg!(feature = "rayon") {
        let parallel = Detector::new(
            PyramidConfig::default(),
            MatchConfig {
                parallel: true,
                ..MatchConfig::default()
            },
        );
        c.bench_function("detect_320x240_parallel", |b| {
            b.iter(|| black_box(parallel.detect(view, &model, DEFAULT_OVERLAP_THRESHOLD).unwrap()));
        });
    }
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
