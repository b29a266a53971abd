//! TRDI PD0 binary ensembles.
//!
//! A PD0 ensemble is a header with an offset table followed by typed blocks, each starting
//! with a 16-bit id. Profile blocks are laid out bin by bin. Integer values are kept in the
//! units the instrument sent: velocities in mm/s, distances in cm, angles in hundredths of
//! a degree, and `-32768` for bad velocities.
use tracing::trace;

use super::{Ancillary, BeamData, BottomTrack, Ensemble, EnsembleData, Firmware};
use crate::framing::header::{validate_pd0, PD0_CHECKSUM, PD0_FIXED_HEADER_LEN, PD0_SYNC};
use crate::framing::{BadFrame, Format, FrameFormat, Validation};
use crate::prelude::*;

pub const FIXED_LEADER: u16 = 0x0000;
pub const VARIABLE_LEADER: u16 = 0x0080;
pub const VELOCITY: u16 = 0x0100;
pub const CORRELATION: u16 = 0x0200;
pub const ECHO_INTENSITY: u16 = 0x0300;
pub const PERCENT_GOOD: u16 = 0x0400;
pub const BOTTOM_TRACK: u16 = 0x0600;

/// Velocity value marking a bad measurement.
pub const BAD_VELOCITY: i16 = -32768;

/// Number of beams bottom tracking always reports.
const BT_BEAMS: usize = 4;

fn u16_at(dat: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([dat[offset], dat[offset + 1]])
}

fn i16_at(dat: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([dat[offset], dat[offset + 1]])
}

fn put_u16(dat: &mut [u8], offset: usize, x: u16) {
    dat[offset..offset + 2].copy_from_slice(&x.to_le_bytes());
}

fn check_len(id: u16, dat: &[u8], minimum: usize) -> Result<()> {
    if dat.len() < minimum {
        return Err(Error::malformed(
            0,
            format!(
                "block {id:#06x} has {} bytes, expected at least {minimum}",
                dat.len()
            ),
        ));
    }
    Ok(())
}

/// Coordinate frame velocities were transformed into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinateFrame {
    #[default]
    Beam,
    Instrument,
    Ship,
    Earth,
}

impl CoordinateFrame {
    fn from_bits(coord_transform: u8) -> Self {
        match (coord_transform & 0x18) >> 3 {
            0 => CoordinateFrame::Beam,
            1 => CoordinateFrame::Instrument,
            2 => CoordinateFrame::Ship,
            _ => CoordinateFrame::Earth,
        }
    }

    fn to_bits(self) -> u8 {
        let bits = match self {
            CoordinateFrame::Beam => 0,
            CoordinateFrame::Instrument => 1,
            CoordinateFrame::Ship => 2,
            CoordinateFrame::Earth => 3,
        };
        bits << 3
    }
}

/// Instrument configuration, constant for a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedLeader {
    pub firmware_version: u8,
    pub firmware_revision: u8,
    pub num_beams: u8,
    pub num_cells: u8,
    pub pings_per_ensemble: u16,
    /// cm
    pub depth_cell_length: u16,
    pub coordinate_frame: CoordinateFrame,
    /// cm
    pub bin1_distance: u16,
}

impl FixedLeader {
    /// Bytes needed to decode every field used here.
    pub const MIN_LEN: usize = 34;
    /// Length of the block as instruments emit it.
    pub const LEN: usize = 59;

    /// # Errors
    /// [Error::MalformedRecord] if the block is too short.
    pub fn decode(dat: &[u8]) -> Result<Self> {
        check_len(FIXED_LEADER, dat, Self::MIN_LEN)?;
        Ok(FixedLeader {
            firmware_version: dat[2],
            firmware_revision: dat[3],
            num_beams: dat[8],
            num_cells: dat[9],
            pings_per_ensemble: u16_at(dat, 10),
            depth_cell_length: u16_at(dat, 12),
            coordinate_frame: CoordinateFrame::from_bits(dat[25]),
            bin1_distance: u16_at(dat, 32),
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        put_u16(&mut buf, 0, FIXED_LEADER);
        buf[2] = self.firmware_version;
        buf[3] = self.firmware_revision;
        buf[8] = self.num_beams;
        buf[9] = self.num_cells;
        put_u16(&mut buf, 10, self.pings_per_ensemble);
        put_u16(&mut buf, 12, self.depth_cell_length);
        buf[25] = self.coordinate_frame.to_bits();
        put_u16(&mut buf, 32, self.bin1_distance);
        buf
    }
}

/// Per-ensemble counters, clock and sensors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableLeader {
    /// Ensemble number including the rollover byte.
    pub ensemble_number: u32,
    /// Two digit year, month, day, hour, minute, second, hundredths.
    pub rtc: [u8; 7],
    /// m/s
    pub speed_of_sound: u16,
    /// dm
    pub transducer_depth: u16,
    /// Hundredths of a degree.
    pub heading: u16,
    pub pitch: i16,
    pub roll: i16,
    /// ppt
    pub salinity: u16,
    /// Hundredths of a degree C.
    pub temperature: i16,
}

impl VariableLeader {
    pub const MIN_LEN: usize = 28;
    pub const LEN: usize = 65;

    /// # Errors
    /// [Error::MalformedRecord] if the block is too short.
    pub fn decode(dat: &[u8]) -> Result<Self> {
        check_len(VARIABLE_LEADER, dat, Self::MIN_LEN)?;
        let mut rtc = [0u8; 7];
        rtc.copy_from_slice(&dat[4..11]);
        Ok(VariableLeader {
            ensemble_number: u32::from(u16_at(dat, 2)) | (u32::from(dat[11]) << 16),
            rtc,
            speed_of_sound: u16_at(dat, 14),
            transducer_depth: u16_at(dat, 16),
            heading: u16_at(dat, 18),
            pitch: i16_at(dat, 20),
            roll: i16_at(dat, 22),
            salinity: u16_at(dat, 24),
            temperature: i16_at(dat, 26),
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        put_u16(&mut buf, 0, VARIABLE_LEADER);
        put_u16(&mut buf, 2, (self.ensemble_number & 0xffff) as u16);
        buf[4..11].copy_from_slice(&self.rtc);
        buf[11] = (self.ensemble_number >> 16) as u8;
        put_u16(&mut buf, 14, self.speed_of_sound);
        put_u16(&mut buf, 16, self.transducer_depth);
        put_u16(&mut buf, 18, self.heading);
        buf[20..22].copy_from_slice(&self.pitch.to_le_bytes());
        buf[22..24].copy_from_slice(&self.roll.to_le_bytes());
        put_u16(&mut buf, 24, self.salinity);
        buf[26..28].copy_from_slice(&self.temperature.to_le_bytes());
        buf
    }
}

/// Bottom tracking block. Values are per beam.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BottomTrackBlock {
    pub pings: u16,
    /// cm
    pub range: [u16; BT_BEAMS],
    /// mm/s
    pub velocity: [i16; BT_BEAMS],
    pub correlation: [u8; BT_BEAMS],
    pub amplitude: [u8; BT_BEAMS],
    pub percent_good: [u8; BT_BEAMS],
}

impl BottomTrackBlock {
    pub const MIN_LEN: usize = 44;
    pub const LEN: usize = 81;

    /// # Errors
    /// [Error::MalformedRecord] if the block is too short.
    pub fn decode(dat: &[u8]) -> Result<Self> {
        check_len(BOTTOM_TRACK, dat, Self::MIN_LEN)?;
        let mut bt = BottomTrackBlock {
            pings: u16_at(dat, 2),
            ..Default::default()
        };
        for beam in 0..BT_BEAMS {
            bt.range[beam] = u16_at(dat, 16 + 2 * beam);
            bt.velocity[beam] = i16_at(dat, 24 + 2 * beam);
            bt.correlation[beam] = dat[32 + beam];
            bt.amplitude[beam] = dat[36 + beam];
            bt.percent_good[beam] = dat[40 + beam];
        }
        Ok(bt)
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        put_u16(&mut buf, 0, BOTTOM_TRACK);
        put_u16(&mut buf, 2, self.pings);
        for beam in 0..BT_BEAMS {
            put_u16(&mut buf, 16 + 2 * beam, self.range[beam]);
            buf[24 + 2 * beam..26 + 2 * beam].copy_from_slice(&self.velocity[beam].to_le_bytes());
            buf[32 + beam] = self.correlation[beam];
            buf[36 + beam] = self.amplitude[beam];
            buf[40 + beam] = self.percent_good[beam];
        }
        buf
    }
}

/// Encode a velocity block from values ordered bin by bin.
#[must_use]
pub fn encode_velocity(values: &[i16]) -> Vec<u8> {
    let mut buf = VELOCITY.to_le_bytes().to_vec();
    buf.extend(values.iter().flat_map(|v| v.to_le_bytes()));
    buf
}

/// Encode a correlation, echo intensity or percent good block from values ordered bin by
/// bin.
#[must_use]
pub fn encode_byte_block(id: u16, values: &[u8]) -> Vec<u8> {
    let mut buf = id.to_le_bytes().to_vec();
    buf.extend_from_slice(values);
    buf
}

/// Assemble `blocks` into a complete frame, offset table and checksum included.
#[must_use]
pub fn encode_frame(blocks: &[Vec<u8>]) -> Vec<u8> {
    let header_len = PD0_FIXED_HEADER_LEN + 2 * blocks.len();
    let num_bytes = header_len + blocks.iter().map(Vec::len).sum::<usize>();

    let mut buf = Vec::with_capacity(num_bytes + PD0_CHECKSUM.width());
    buf.extend_from_slice(&PD0_SYNC);
    buf.extend_from_slice(&(num_bytes as u16).to_le_bytes());
    buf.push(0); // spare
    buf.push(blocks.len() as u8);
    let mut offset = header_len;
    for block in blocks {
        buf.extend_from_slice(&(offset as u16).to_le_bytes());
        offset += block.len();
    }
    for block in blocks {
        buf.extend_from_slice(block);
    }
    PD0_CHECKSUM.append(&mut buf);
    buf
}

struct Block<'a> {
    offset: usize,
    id: u16,
    data: &'a [u8],
}

fn blocks(frame: &[u8]) -> Result<Vec<Block<'_>>> {
    let num_bytes = frame.len().saturating_sub(PD0_CHECKSUM.width());
    if num_bytes < PD0_FIXED_HEADER_LEN {
        return Err(Error::NotEnoughData {
            actual: frame.len(),
            minimum: PD0_FIXED_HEADER_LEN + PD0_CHECKSUM.width(),
        });
    }
    let num_types = usize::from(frame[5]);
    let header_len = PD0_FIXED_HEADER_LEN + 2 * num_types;
    if header_len > num_bytes {
        return Err(Error::malformed(5, "offset table runs past the frame"));
    }

    let offsets: Vec<usize> = (0..num_types)
        .map(|idx| usize::from(u16_at(frame, PD0_FIXED_HEADER_LEN + 2 * idx)))
        .collect();
    let mut blocks = Vec::with_capacity(num_types);
    for (idx, &start) in offsets.iter().enumerate() {
        let end = offsets.get(idx + 1).copied().unwrap_or(num_bytes);
        if start < header_len || start + 2 > end || end > num_bytes {
            return Err(Error::malformed(start, "block runs past the frame"));
        }
        blocks.push(Block {
            offset: start,
            id: u16_at(frame, start),
            data: &frame[start..end],
        });
    }
    Ok(blocks)
}

/// Profile values of `block`, `width` bytes each, ordered bin by bin.
fn profile<'a>(block: &Block<'a>, fixed: &FixedLeader, width: usize) -> Result<&'a [u8]> {
    let count = usize::from(fixed.num_cells) * usize::from(fixed.num_beams) * width;
    check_len(block.id, block.data, 2 + count)?;
    Ok(&block.data[2..2 + count])
}

fn ensemble_data(fixed: &FixedLeader, var: &VariableLeader) -> EnsembleData {
    let [yy, month, day, hour, minute, second, hundredths] = var.rtc.map(i32::from);
    EnsembleData {
        ensemble_number: var.ensemble_number as i32,
        num_bins: i32::from(fixed.num_cells),
        num_beams: i32::from(fixed.num_beams),
        desired_ping_count: i32::from(fixed.pings_per_ensemble),
        actual_ping_count: i32::from(fixed.pings_per_ensemble),
        status: 0,
        year: 2000 + yy,
        month,
        day,
        hour,
        minute,
        second,
        hundredths,
        serial_number: String::new(),
        firmware: Firmware {
            major: fixed.firmware_version,
            minor: fixed.firmware_revision,
            ..Default::default()
        },
    }
}

fn ancillary(fixed: &FixedLeader, var: &VariableLeader) -> Ancillary {
    Ancillary {
        first_bin_range: f32::from(fixed.bin1_distance),
        bin_size: f32::from(fixed.depth_cell_length),
        heading: f32::from(var.heading),
        pitch: f32::from(var.pitch),
        roll: f32::from(var.roll),
        water_temp: f32::from(var.temperature),
        salinity: f32::from(var.salinity),
        transducer_depth: f32::from(var.transducer_depth),
        speed_of_sound: f32::from(var.speed_of_sound),
        ..Default::default()
    }
}

fn bottom_track(bt: &BottomTrackBlock, anc: &Ancillary, frame: CoordinateFrame) -> BottomTrack {
    let zeros = vec![0.0; BT_BEAMS];
    let velocity: Vec<f32> = bt.velocity.iter().map(|v| f32::from(*v)).collect();
    let good: Vec<f32> = bt.percent_good.iter().map(|v| f32::from(*v)).collect();
    let mut track = BottomTrack {
        heading: anc.heading,
        pitch: anc.pitch,
        roll: anc.roll,
        water_temp: anc.water_temp,
        salinity: anc.salinity,
        transducer_depth: anc.transducer_depth,
        speed_of_sound: anc.speed_of_sound,
        actual_ping_count: f32::from(bt.pings),
        range: bt.range.iter().map(|v| f32::from(*v)).collect(),
        snr: zeros.clone(),
        amplitude: bt.amplitude.iter().map(|v| f32::from(*v)).collect(),
        correlation: bt.correlation.iter().map(|v| f32::from(*v)).collect(),
        beam_velocity: zeros.clone(),
        beam_good: zeros.clone(),
        instrument_velocity: zeros.clone(),
        instrument_good: zeros.clone(),
        earth_velocity: zeros.clone(),
        earth_good: zeros,
        ..Default::default()
    };
    match frame {
        CoordinateFrame::Beam => {
            track.beam_velocity = velocity;
            track.beam_good = good;
        }
        CoordinateFrame::Instrument | CoordinateFrame::Ship => {
            track.instrument_velocity = velocity;
            track.instrument_good = good;
        }
        CoordinateFrame::Earth => {
            track.earth_velocity = velocity;
            track.earth_good = good;
        }
    }
    track
}

/// Parse a complete PD0 frame.
///
/// Blocks with unknown ids are skipped. Profile blocks require a fixed leader to give their
/// dimensions.
///
/// # Errors
/// [Error::MalformedRecord] if the offset table or any known block is inconsistent.
pub fn parse(frame: &[u8]) -> Result<Ensemble> {
    let blocks = blocks(frame)?;
    let at = |offset: usize| {
        move |err: Error| match err {
            Error::MalformedRecord { reason, .. } => Error::malformed(offset, reason),
            other => other,
        }
    };

    let fixed = blocks
        .iter()
        .find(|b| b.id == FIXED_LEADER)
        .map(|b| FixedLeader::decode(b.data).map_err(at(b.offset)))
        .transpose()?;

    let mut ens = Ensemble::default();
    let mut variable = None;
    let mut bottom = None;
    for block in &blocks {
        match block.id {
            FIXED_LEADER => {}
            VARIABLE_LEADER => {
                variable = Some(VariableLeader::decode(block.data).map_err(at(block.offset))?);
            }
            VELOCITY | CORRELATION | ECHO_INTENSITY | PERCENT_GOOD => {
                let Some(fixed) = &fixed else {
                    return Err(Error::malformed(
                        block.offset,
                        "profile block without a fixed leader",
                    ));
                };
                let bins = usize::from(fixed.num_cells);
                let beams = usize::from(fixed.num_beams);
                let width = if block.id == VELOCITY { 2 } else { 1 };
                let dat = profile(block, fixed, width).map_err(at(block.offset))?;

                if block.id == VELOCITY {
                    let values: Vec<f32> = dat
                        .chunks_exact(2)
                        .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])))
                        .collect();
                    let data = Some(BeamData::from_bin_major(bins, beams, &values)?);
                    match fixed.coordinate_frame {
                        CoordinateFrame::Beam => ens.beam_velocity = data,
                        CoordinateFrame::Instrument | CoordinateFrame::Ship => {
                            ens.instrument_velocity = data;
                        }
                        CoordinateFrame::Earth => ens.earth_velocity = data,
                    }
                } else if block.id == PERCENT_GOOD {
                    let values: Vec<i32> = dat.iter().map(|v| i32::from(*v)).collect();
                    let data = Some(BeamData::from_bin_major(bins, beams, &values)?);
                    if fixed.coordinate_frame == CoordinateFrame::Beam {
                        ens.good_beam = data;
                    } else {
                        ens.good_earth = data;
                    }
                } else {
                    let values: Vec<f32> = dat.iter().map(|v| f32::from(*v)).collect();
                    let data = Some(BeamData::from_bin_major(bins, beams, &values)?);
                    if block.id == CORRELATION {
                        ens.correlation = data;
                    } else {
                        ens.amplitude = data;
                    }
                }
            }
            BOTTOM_TRACK => {
                bottom = Some(BottomTrackBlock::decode(block.data).map_err(at(block.offset))?);
            }
            id => trace!(offset = block.offset, "skipping unknown block {id:#06x}"),
        }
    }

    if fixed.is_some() || variable.is_some() {
        let fixed = fixed.clone().unwrap_or_default();
        let variable = variable.unwrap_or_default();
        ens.ensemble_data = Some(ensemble_data(&fixed, &variable));
        ens.ancillary = Some(ancillary(&fixed, &variable));
    }
    if let Some(bt) = bottom {
        let anc = ens.ancillary.clone().unwrap_or_default();
        let frame = fixed.map(|f| f.coordinate_frame).unwrap_or_default();
        ens.bottom_track = Some(bottom_track(&bt, &anc, frame));
    }
    Ok(ens)
}

/// [FrameFormat] for PD0 ensembles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pd0Format;

impl FrameFormat for Pd0Format {
    fn format(&self) -> Format {
        Format::Pd0
    }

    fn sync_pattern(&self) -> &[u8] {
        &PD0_SYNC
    }

    fn min_frame_len(&self) -> usize {
        // header with one offset, one block id, checksum
        PD0_FIXED_HEADER_LEN + 2 + 2 + PD0_CHECKSUM.width()
    }

    fn validate(&self, window: &[u8]) -> Validation {
        validate_pd0(window)
    }

    fn verify(&self, frame: &[u8]) -> std::result::Result<(), BadFrame> {
        PD0_CHECKSUM.verify(frame)
    }

    fn parse(&self, frame: &[u8]) -> Result<Ensemble> {
        parse(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::CandidateHeader;

    fn fixed() -> FixedLeader {
        FixedLeader {
            firmware_version: 51,
            firmware_revision: 40,
            num_beams: 4,
            num_cells: 2,
            pings_per_ensemble: 30,
            depth_cell_length: 100,
            coordinate_frame: CoordinateFrame::Earth,
            bin1_distance: 176,
        }
    }

    fn variable() -> VariableLeader {
        VariableLeader {
            ensemble_number: 0x0001_0002,
            rtc: [24, 3, 15, 12, 30, 45, 50],
            speed_of_sound: 1500,
            transducer_depth: 12,
            heading: 27_407,
            pitch: -150,
            roll: 210,
            salinity: 35,
            temperature: 1234,
        }
    }

    fn bottom() -> BottomTrackBlock {
        BottomTrackBlock {
            pings: 6,
            range: [1000, 1010, 1020, 1030],
            velocity: [10, -20, 30, BAD_VELOCITY],
            correlation: [250, 251, 252, 253],
            amplitude: [80, 81, 82, 83],
            percent_good: [100, 100, 100, 0],
        }
    }

    fn sample_frame() -> Vec<u8> {
        let velocity: Vec<i16> = (0..8).map(|v| v * 10).collect();
        encode_frame(&[
            fixed().encode(),
            variable().encode(),
            encode_velocity(&velocity),
            encode_byte_block(CORRELATION, &[1, 2, 3, 4, 5, 6, 7, 8]),
            encode_byte_block(ECHO_INTENSITY, &[9; 8]),
            encode_byte_block(PERCENT_GOOD, &[100; 8]),
            bottom().encode(),
        ])
    }

    #[test]
    fn encoded_frame_validates() {
        let frame = sample_frame();
        assert!(PD0_CHECKSUM.verify(&frame).is_ok());
        assert_eq!(
            validate_pd0(&frame),
            Validation::Valid(CandidateHeader {
                sequence_number: None,
                payload_size: frame.len() - 2 - (PD0_FIXED_HEADER_LEN + 14),
                frame_len: frame.len(),
            })
        );
    }

    #[test]
    fn leaders_survive_encoding() {
        assert_eq!(FixedLeader::decode(&fixed().encode()).unwrap(), fixed());
        assert_eq!(VariableLeader::decode(&variable().encode()).unwrap(), variable());
        assert_eq!(BottomTrackBlock::decode(&bottom().encode()).unwrap(), bottom());
    }

    #[test]
    fn parse_full_ensemble() {
        let ens = parse(&sample_frame()).unwrap();

        let ed = ens.ensemble_data.as_ref().unwrap();
        assert_eq!(ed.ensemble_number, 0x0001_0002);
        assert_eq!(ed.num_bins, 2);
        assert_eq!(ed.num_beams, 4);
        assert_eq!(ed.firmware.major, 51);
        assert_eq!(
            ed.timestamp().unwrap().to_string(),
            "2024-03-15 12:30:45.500"
        );

        let anc = ens.ancillary.as_ref().unwrap();
        assert_eq!(anc.heading, 27_407.0);
        assert_eq!(anc.pitch, -150.0);
        assert_eq!(anc.bin_size, 100.0);

        // bin-major on the wire: bin 1, beam 2 is the 7th value
        let vel = ens.earth_velocity.as_ref().unwrap();
        assert_eq!(vel.num_bins(), 2);
        assert_eq!(vel.num_beams(), 4);
        assert_eq!(vel.values[[1, 2]], 60.0);
        assert!(ens.beam_velocity.is_none());

        assert_eq!(ens.correlation.as_ref().unwrap().values[[0, 3]], 4.0);
        assert_eq!(ens.amplitude.as_ref().unwrap().values[[1, 1]], 9.0);
        assert_eq!(ens.good_earth.as_ref().unwrap().values[[0, 0]], 100);

        let bt = ens.bottom_track.as_ref().unwrap();
        assert_eq!(bt.num_beams(), 4);
        assert_eq!(bt.range, [1000.0, 1010.0, 1020.0, 1030.0]);
        assert_eq!(bt.earth_velocity[3], -32768.0);
        assert_eq!(bt.earth_good, [100.0, 100.0, 100.0, 0.0]);
        assert_eq!(bt.heading, 27_407.0);
        assert_eq!(bt.actual_ping_count, 6.0);
    }

    #[test]
    fn unknown_blocks_are_skipped() {
        let frame = encode_frame(&[fixed().encode(), vec![0x00, 0x30, 1, 2, 3]]);
        let ens = parse(&frame).unwrap();
        assert!(ens.ensemble_data.is_some());
        assert!(ens.earth_velocity.is_none());
    }

    #[test]
    fn profile_without_fixed_leader_is_malformed() {
        let frame = encode_frame(&[encode_velocity(&[0; 8])]);
        assert!(matches!(parse(&frame), Err(Error::MalformedRecord { .. })));
    }

    #[test]
    fn short_profile_block_is_malformed() {
        let frame = encode_frame(&[fixed().encode(), encode_velocity(&[0; 7])]);
        assert!(matches!(parse(&frame), Err(Error::MalformedRecord { .. })));
    }

    #[test]
    fn short_bottom_track_is_malformed() {
        let mut bt = bottom().encode();
        bt.truncate(BottomTrackBlock::MIN_LEN - 1);
        let frame = encode_frame(&[bt]);
        assert!(matches!(parse(&frame), Err(Error::MalformedRecord { .. })));
    }

    #[test]
    fn beam_frame_fills_beam_fields() {
        let leader = FixedLeader {
            coordinate_frame: CoordinateFrame::Beam,
            ..fixed()
        };
        let frame = encode_frame(&[
            leader.encode(),
            encode_velocity(&[1; 8]),
            encode_byte_block(PERCENT_GOOD, &[50; 8]),
        ]);
        let ens = parse(&frame).unwrap();
        assert!(ens.beam_velocity.is_some());
        assert!(ens.good_beam.is_some());
        assert!(ens.earth_velocity.is_none());
    }
}
