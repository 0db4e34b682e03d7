use criterion::{Criterion, black_box, criterion_group, criterion_main};
use visreg::{DiffOptions, IgnoreMode, Raster, diff_images};

fn benchmark_diff(c: &mut Criterion) {
    let baseline = Raster::with_color(800, 600, [50, 50, 50, 255]).into_image();
    let mut changed = Raster::from_image(baseline.clone());
    changed.draw_rect(100, 100, 200, 80, [255, 255, 255, 255]);
    let changed = changed.into_image();

    for mode in [IgnoreMode::Nothing, IgnoreMode::Antialiasing] {
        let options = DiffOptions::new(mode, 0.2);
        c.bench_function(&format!("diff_800x600_{}", mode), |b| {
            b.iter(|| {
                let result = diff_images(black_box(&baseline), black_box(&changed), &options);
                assert!(result.mis_match_percentage() > 0.0);
            })
        });
    }
}

criterion_group!(benches, benchmark_diff);
criterion_main!(benches);
