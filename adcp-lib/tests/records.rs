mod common;

use std::time::Duration;

use adcp::ensemble::{pd0, prti, rtb, DataSetId, Dvl, DvlFrame, Nmea};
use adcp::{ChannelListener, DecodeEvent, DecoderConfig, Format, FormatDecoder};
use crossbeam::channel::Receiver;
use common::{collect_until_idle, rtb_frame, sample_ensemble, small_frame, wait_for_ensembles};

fn start(config: DecoderConfig) -> (FormatDecoder, Receiver<DecodeEvent>) {
    let (listener, rx) = ChannelListener::new();
    (FormatDecoder::start(config, listener).unwrap(), rx)
}

#[test]
fn bottom_track_and_nmea_survive_decoding() {
    let expected = sample_ensemble(11);
    let (decoder, rx) = start(DecoderConfig::new(Format::Rtb));
    decoder.ingest(&rtb_frame(11)).unwrap();

    let (raw, ens) = wait_for_ensembles(&rx, 1).remove(0);
    assert_eq!(raw, rtb_frame(11));
    assert_eq!(ens.bottom_track, expected.bottom_track);
    assert_eq!(ens.nmea, expected.nmea);
    assert_eq!(ens, expected);
    assert_eq!(
        ens.available(),
        [
            DataSetId::BeamVelocity,
            DataSetId::Amplitude,
            DataSetId::GoodBeam,
            DataSetId::EnsembleData,
            DataSetId::Ancillary,
            DataSetId::BottomTrack,
            DataSetId::Nmea,
        ]
    );
    let ts = ens.ensemble_data.unwrap().timestamp().unwrap();
    assert_eq!(ts.to_string(), "2024-05-17 08:15:02.330");
}

#[test]
fn beam_arrays_are_bins_by_beams() {
    let ens = rtb::parse(&rtb_frame(1)).unwrap();
    let vel = ens.beam_velocity.unwrap();
    assert_eq!(vel.values.dim(), (3, 4));
    // beam-major on the wire: beam 1, bin 2 is value 1 * 3 + 2
    assert_eq!(vel.values[[2, 1]], 5.0 * 0.25);
}

#[test]
fn side_channel_is_merged_into_next_ensemble() {
    let (decoder, rx) = start(DecoderConfig::new(Format::Rtb));
    let queued = decoder
        .ingest_side_channel("$GPGGA,1*00\r\nnot nmea\r\n$GPHDT,274.07,T*03\r\n")
        .unwrap();
    assert_eq!(queued, 1);

    decoder.ingest(&rtb_frame(1)).unwrap();
    decoder.ingest(&rtb_frame(2)).unwrap();
    let got = wait_for_ensembles(&rx, 2);

    let first: Vec<&str> = got[0].1.nmea.as_ref().unwrap().sentences().collect();
    assert_eq!(first, ["$GPHDT,274.07,T*03", "$GPHDT,274.07,T*03"]);
    // not enriched by default
    assert_eq!(got[0].0, rtb_frame(1));
    // drained by the first ensemble
    assert_eq!(got[1].1.nmea, sample_ensemble(2).nmea);
}

#[test]
fn enriched_raw_frame_carries_side_channel() {
    let config = DecoderConfig::builder()
        .format(Format::Rtb)
        .enrich_raw(true)
        .build();
    let (decoder, rx) = start(config);
    decoder.ingest_side_channel("$GPHDT,1.0,T*34").unwrap();
    decoder.ingest(&rtb_frame(5)).unwrap();

    let (raw, ens) = wait_for_ensembles(&rx, 1).remove(0);
    let reparsed = rtb::parse(&raw).unwrap();
    assert_eq!(reparsed, ens);
    assert_eq!(
        reparsed.nmea.unwrap().sentences().collect::<Vec<_>>(),
        ["$GPHDT,274.07,T*03", "$GPHDT,1.0,T*34"]
    );
}

#[test]
fn side_channel_capacity_evicts_oldest() {
    let config = DecoderConfig::builder()
        .format(Format::Rtb)
        .side_channel_capacity(2)
        .build();
    let (decoder, rx) = start(config);
    let text = ["$GPHDT,274.07,T*03", "$GPHDT,1.0,T*34", "$GPGGA,1*4B"]
        .iter()
        .map(|s| format!("{s}\r\n"))
        .collect::<String>();
    decoder.ingest_side_channel(&text).unwrap();
    decoder.ingest(&small_frame()).unwrap();

    let (_, ens) = wait_for_ensembles(&rx, 1).remove(0);
    assert_eq!(
        ens.nmea.unwrap().sentences().collect::<Vec<_>>(),
        ["$GPHDT,1.0,T*34", "$GPGGA,1*4B"]
    );
}

#[test]
fn pd0_stream_is_decoded() {
    let fixed = pd0::FixedLeader {
        num_beams: 4,
        num_cells: 1,
        coordinate_frame: pd0::CoordinateFrame::Beam,
        ..Default::default()
    };
    let frames: Vec<Vec<u8>> = (0..3u32)
        .map(|number| {
            let variable = pd0::VariableLeader {
                ensemble_number: number,
                rtc: [24, 1, 1, 0, 0, 0, 0],
                ..Default::default()
            };
            pd0::encode_frame(&[
                fixed.encode(),
                variable.encode(),
                pd0::encode_velocity(&[1, 2, 3, pd0::BAD_VELOCITY]),
            ])
        })
        .collect();

    let (decoder, rx) = start(DecoderConfig::new(Format::Pd0));
    let stream: Vec<u8> = frames.concat();
    for chunk in stream.chunks(33) {
        decoder.ingest(chunk).unwrap();
    }
    let got = wait_for_ensembles(&rx, 3);

    for (idx, (raw, ens)) in got.iter().enumerate() {
        assert_eq!(raw, &frames[idx]);
        assert_eq!(ens.number(), Some(idx as i64));
        let vel = ens.beam_velocity.as_ref().unwrap();
        assert_eq!(vel.values[[0, 3]], -32768.0);
    }
}

#[test]
fn prti_sentences_are_decoded() {
    let dvl = |sample: i64| Dvl {
        frame: DvlFrame::Earth,
        start_time: Some(100 * sample),
        sample_number: Some(sample),
        temperature: Some(1520),
        bottom_velocity: [Some(10), Some(-10), Some(0)],
        bottom_depth: Some(5000),
        water_velocity: [None, None, None],
        water_depth: None,
        status: Some(0),
    };
    let text: String = (1..=3).map(|s| prti::encode(&dvl(s))).collect();
    let mut stream = b"$GPHDT,274.07,T*03\r\n".to_vec();
    stream.extend(text.as_bytes());

    let (decoder, rx) = start(DecoderConfig::new(Format::Prti));
    decoder.ingest(&stream).unwrap();
    let got = wait_for_ensembles(&rx, 3);

    for (idx, (_, ens)) in got.iter().enumerate() {
        let sample = idx as i64 + 1;
        assert_eq!(ens.dvl, Some(dvl(sample)));
        assert_eq!(ens.nmea, Some(Nmea::new(prti::encode(&dvl(sample)).trim_end())));
    }
    assert!(collect_until_idle(&rx, Duration::from_millis(200))
        .iter()
        .all(|e| !matches!(e, DecodeEvent::BadFrame { .. })));
}
