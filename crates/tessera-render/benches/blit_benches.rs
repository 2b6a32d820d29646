use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tessera_core::{Color, FrameBuffer};
use tessera_render::{BlendFunc, RenderInstance, RenderParams};

fn bench_software_alpha_over(c: &mut Criterion) {
    let mut group = c.benchmark_group("tessera_software_blit");
    group.sample_size(20); // A 1080p blit is a few milliseconds

    let (width, height) = (1920, 1080);
    let mut instance = RenderInstance::software(RenderParams::new(width, height));
    let base = instance
        .texture_from_frame(&FrameBuffer::solid(width, height, Color::rgba(0.8, 0.2, 0.2, 1.0)))
        .unwrap();
    let blend = instance
        .texture_from_frame(&FrameBuffer::solid(
            width,
            height,
            Color::rgba(0.0, 0.0, 1.0, 0.5).premultiplied(),
        ))
        .unwrap();

    group.bench_function("alpha_over_1080p", |b| {
        b.iter(|| {
            let mut attached = instance.attach_target(black_box(&base)).unwrap();
            let mut bound = attached.bind().unwrap();
            let mut source = bound.bind_source(black_box(&blend)).unwrap();
            source.set_blend_func(BlendFunc::ALPHA_OVER).unwrap();
            source.blit().unwrap();
        })
    });

    group.bench_function("copy_on_write_1080p", |b| {
        b.iter(|| {
            let shared = base.clone();
            black_box(instance.make_exclusive(shared).unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_software_alpha_over);
criterion_main!(benches);
