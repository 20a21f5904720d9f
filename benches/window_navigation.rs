use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use frame_explorer::test_fixtures::{create_test_wav_file, generate_white_noise};
use frame_explorer::{MemorySource, Session, SpectrogramAnalyzer, WavFileSource, WaveformChannel};

const SAMPLE_RATE: u32 = 16000;

/// Walk every window of the source once, front to back.
fn walk(session: &mut Session) -> usize {
    let mut windows = 1;
    while !session.advance().unwrap().boundary_reached() {
        windows += 1;
    }
    windows
}

fn benchmark_navigation(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_navigation");
    let samples = generate_white_noise(120.0, SAMPLE_RATE, 0.5);
    group.throughput(Throughput::Bytes(
        (samples.len() * std::mem::size_of::<f32>()) as u64,
    ));

    for window_secs in [1.0, 10.0, 30.0] {
        group.bench_with_input(
            BenchmarkId::new("memory", window_secs),
            &window_secs,
            |b, &secs| {
                b.iter(|| {
                    let mut session = Session::without_analyzer();
                    session
                        .open(Box::new(MemorySource::new(samples.clone(), SAMPLE_RATE)), secs)
                        .unwrap();
                    black_box(walk(&mut session));
                });
            },
        );
    }

    let wav = create_test_wav_file(&samples, SAMPLE_RATE, 1);
    group.bench_function("wav_file_10s", |b| {
        b.iter(|| {
            let source = WavFileSource::open(wav.path(), WaveformChannel::Left).unwrap();
            let mut session = Session::without_analyzer();
            session.open(Box::new(source), 10.0).unwrap();
            black_box(walk(&mut session));
        });
    });

    group.finish();
}

fn benchmark_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_analysis");
    group.sample_size(20);
    let samples = generate_white_noise(60.0, SAMPLE_RATE, 0.5);

    group.bench_function("spectrogram_30s", |b| {
        b.iter(|| {
            let analyzer = SpectrogramAnalyzer::new(1024, 0.1, 10);
            let mut session = Session::new(Box::new(analyzer));
            session
                .open(Box::new(MemorySource::new(samples.clone(), SAMPLE_RATE)), 30.0)
                .unwrap();
            black_box(walk(&mut session));
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_navigation, benchmark_analysis);
criterion_main!(benches);
