use adcp::ensemble::{rtb, BeamData, Ensemble, EnsembleData};
use adcp::framing::{ChecksumKind, Format, Outcome, Synchronizer, DEFAULT_MAX_PAYLOAD};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rand::Rng;

fn frame(number: i32) -> Vec<u8> {
    let bins = 30;
    let beams = 4;
    rtb::encode_ensemble(&Ensemble {
        beam_velocity: Some(
            BeamData::from_beam_major(bins, beams, &vec![0.5; bins * beams]).unwrap(),
        ),
        ensemble_data: Some(EnsembleData {
            ensemble_number: number,
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn bench_synchronization(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let mut data = Vec::new();
    for number in 0..100 {
        data.extend(frame(number));
        // noise that never contains a sync byte
        data.extend((0..64).map(|_| rng.gen_range(0..0x80u8)));
    }

    let mut group = c.benchmark_group("synchronize");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("rtb", |b| {
        b.iter(|| {
            let mut sync = Synchronizer::new(Format::Rtb.codec(DEFAULT_MAX_PAYLOAD));
            let mut buf = &data[..];
            let mut frames = 0;
            while !buf.is_empty() {
                let pass = sync.pass(buf, 0);
                if matches!(pass.outcome, Outcome::Frame(_)) {
                    frames += 1;
                }
                if pass.consumed == 0 {
                    break;
                }
                buf = &buf[pass.consumed..];
            }
            assert_eq!(frames, 100);
        });
    });
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let frame = frame(1);
    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("rtb", |b| {
        b.iter(|| rtb::parse(&frame).unwrap());
    });
    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let mut buf = [0u8; 4096];
    rng.fill(&mut buf[..]);

    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("additive32", |b| {
        b.iter(|| ChecksumKind::Additive32.compute(&buf));
    });
    group.bench_function("additive16", |b| {
        b.iter(|| ChecksumKind::Additive16.compute(&buf));
    });
    group.finish();
}

criterion_group!(benches, bench_synchronization, bench_parse, bench_checksum);
criterion_main!(benches);
