#![allow(dead_code)]
use std::time::Duration;

use adcp::ensemble::{
    rtb, Ancillary, BeamData, BottomTrack, Ensemble, EnsembleData, Firmware, Nmea,
};
use adcp::DecodeEvent;
use crossbeam::channel::Receiver;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Upper bound on waiting for any single event.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Ensemble with every commonly used data set populated.
pub fn sample_ensemble(number: i32) -> Ensemble {
    let bins = 3;
    let beams = 4;
    let velocity: Vec<f32> = (0..bins * beams).map(|v| v as f32 * 0.25).collect();
    Ensemble {
        beam_velocity: Some(BeamData::from_beam_major(bins, beams, &velocity).unwrap()),
        amplitude: Some(BeamData::from_beam_major(bins, beams, &vec![40.5; bins * beams]).unwrap()),
        good_beam: Some(BeamData::from_beam_major(bins, beams, &vec![1; bins * beams]).unwrap()),
        ensemble_data: Some(EnsembleData {
            ensemble_number: number,
            num_bins: bins as i32,
            num_beams: beams as i32,
            desired_ping_count: 10,
            actual_ping_count: 10,
            year: 2024,
            month: 5,
            day: 17,
            hour: 8,
            minute: 15,
            second: 2,
            hundredths: 33,
            serial_number: "01300000000000000000000000000042".into(),
            firmware: Firmware {
                major: 0,
                minor: 2,
                revision: 140,
                subsystem: b'3',
            },
            ..Default::default()
        }),
        ancillary: Some(Ancillary {
            first_bin_range: 1.2,
            bin_size: 0.5,
            heading: 274.07,
            pitch: -1.5,
            roll: 0.25,
            water_temp: 14.5,
            speed_of_sound: 1490.0,
            ..Default::default()
        }),
        bottom_track: Some(BottomTrack {
            heading: 274.07,
            status: 0.0,
            actual_ping_count: 4.0,
            range: vec![10.1, 10.2, 10.3, 10.4],
            snr: vec![30.0; 4],
            amplitude: vec![80.0; 4],
            correlation: vec![0.9; 4],
            beam_velocity: vec![0.1, -0.2, 0.3, adcp::ensemble::BAD_VELOCITY],
            beam_good: vec![4.0; 4],
            instrument_velocity: vec![0.5; 4],
            instrument_good: vec![4.0; 4],
            earth_velocity: vec![-0.5; 4],
            earth_good: vec![4.0; 4],
            ..Default::default()
        }),
        nmea: Some(Nmea::new("$GPHDT,274.07,T*03\r\n")),
        ..Default::default()
    }
}

pub fn rtb_frame(number: i32) -> Vec<u8> {
    rtb::encode_ensemble(&sample_ensemble(number))
}

/// Frame with sequence number 1 and a 40 byte payload.
pub fn small_frame() -> Vec<u8> {
    let payload = rtb::encode_data_set(*b"E000099\0", rtb::ValueType::Float, 3, 1, &[0u8; 12]);
    rtb::encode_frame(1, &payload)
}

/// Deterministic random bytes that never contain a native sync byte.
pub fn garbage(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| loop {
            let b: u8 = rng.gen();
            if b != 0x80 {
                break b;
            }
        })
        .collect()
}

/// Collect events until none arrive for `idle`.
pub fn collect_until_idle(rx: &Receiver<DecodeEvent>, idle: Duration) -> Vec<DecodeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(idle) {
        events.push(event);
    }
    events
}

/// Wait for `n` ensembles, returning them with their raw frames.
pub fn wait_for_ensembles(rx: &Receiver<DecodeEvent>, n: usize) -> Vec<(Vec<u8>, Ensemble)> {
    let mut found = Vec::with_capacity(n);
    while found.len() < n {
        let event = rx
            .recv_timeout(TIMEOUT)
            .unwrap_or_else(|_| panic!("timed out with {} of {n} ensembles", found.len()));
        if let DecodeEvent::Ensemble { raw, ensemble, .. } = event {
            found.push((raw, *ensemble));
        }
    }
    found
}

pub fn ensembles(events: &[DecodeEvent]) -> Vec<Ensemble> {
    events
        .iter()
        .filter_map(|e| match e {
            DecodeEvent::Ensemble { ensemble, .. } => Some(ensemble.as_ref().clone()),
            _ => None,
        })
        .collect()
}

pub fn bad_frames(events: &[DecodeEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, DecodeEvent::BadFrame { .. }))
        .count()
}
