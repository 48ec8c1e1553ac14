use cell_core::probe::PacketReader;
use cell_core::{CalibrationConfig, OxygenCalculation, OxygenInput, SampleWindow};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// One measurement answer as it arrives from the probe.
fn answer_frames() -> Vec<Vec<u8>> {
    let mut header = vec![0u8; 64];
    header[..2].copy_from_slice(&[0xFF, 0x01]);
    header[40..42].copy_from_slice(&17u16.to_le_bytes());
    let data = |p: &[u8]| [&[0xFF, 0x03][..], p].concat();
    vec![
        header,
        data(&[0; 8]),
        data(&26.82f64.to_le_bytes()),
        data(&[0; 8]),
        data(&293.15f64.to_le_bytes()),
        data(&967.0f64.to_le_bytes()),
        data(&0u32.to_le_bytes()),
        vec![0xFF, 0x02, 0x07, 0x00],
    ]
}

pub fn bench_oxygen(c: &mut Criterion) {
    let mut g = c.benchmark_group("oxygen");
    if let Some(n) = std::env::var("BENCH_SAMPLE_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    {
        g.sample_size(n.max(10));
    }

    let cfg = CalibrationConfig::default();
    g.bench_function("stern_volmer", |b| {
        let calc = OxygenCalculation::new(&cfg);
        let mut phase = 20.0;
        b.iter(|| {
            phase = if phase > 60.0 { 20.0 } else { phase + 0.01 };
            black_box(calc.compute(OxygenInput {
                phase: black_box(phase),
                temperature_c: 21.3,
                pressure_pa: 96_650.0,
            }))
        })
    });

    let frames = answer_frames();
    g.bench_function("decode_answer", |b| {
        b.iter_batched(
            PacketReader::new,
            |mut r| {
                let mut out = None;
                for f in &frames {
                    out = r.process(black_box(f));
                }
                out
            },
            BatchSize::SmallInput,
        )
    });

    g.bench_function("window_average", |b| {
        let mut w = SampleWindow::new(10, 2);
        for i in 0..20 {
            w.add(96_700.0 + f64::from(i));
        }
        b.iter(|| black_box(&w).average())
    });

    g.finish();
}

criterion_group!(benches, bench_oxygen);
criterion_main!(benches);
