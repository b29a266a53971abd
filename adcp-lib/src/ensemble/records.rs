//! Typed data set records.
//!
//! Values are kept in the units the instrument transmitted them in.
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Marker the native format uses for velocities that could not be measured.
pub const BAD_VELOCITY: f32 = 88.888;

/// Per-bin, per-beam values shaped `(bins, beams)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeamData<T> {
    pub values: Array2<T>,
}

impl<T> BeamData<T>
where
    T: Copy,
{
    /// Build from values ordered beam by beam, i.e., all bins of beam 0 first.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if `dat` does not hold exactly `bins * beams` values.
    pub fn from_beam_major(bins: usize, beams: usize, dat: &[T]) -> Result<Self> {
        if dat.len() != bins * beams {
            return Err(Error::NotEnoughData {
                actual: dat.len(),
                minimum: bins * beams,
            });
        }
        Ok(BeamData {
            values: Array2::from_shape_fn((bins, beams), |(bin, beam)| dat[beam * bins + bin]),
        })
    }

    /// Build from values ordered bin by bin, i.e., all beams of bin 0 first.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if `dat` does not hold exactly `bins * beams` values.
    pub fn from_bin_major(bins: usize, beams: usize, dat: &[T]) -> Result<Self> {
        if dat.len() != bins * beams {
            return Err(Error::NotEnoughData {
                actual: dat.len(),
                minimum: bins * beams,
            });
        }
        Ok(BeamData {
            values: Array2::from_shape_fn((bins, beams), |(bin, beam)| dat[bin * beams + beam]),
        })
    }

    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.values.nrows()
    }

    #[must_use]
    pub fn num_beams(&self) -> usize {
        self.values.ncols()
    }

    /// Values ordered beam by beam.
    #[must_use]
    pub fn beam_major(&self) -> Vec<T> {
        self.values.t().iter().copied().collect()
    }
}

/// Firmware version packed into a single value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Firmware {
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
    /// Subsystem code as an ASCII character.
    pub subsystem: u8,
}

impl Firmware {
    fn decode(x: i32) -> Self {
        let [major, minor, revision, subsystem] = x.to_le_bytes();
        Firmware {
            major,
            minor,
            revision,
            subsystem,
        }
    }

    fn encode(self) -> i32 {
        i32::from_le_bytes([self.major, self.minor, self.revision, self.subsystem])
    }
}

/// Ensemble bookkeeping: counters, geometry and the time of the first ping.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnsembleData {
    pub ensemble_number: i32,
    pub num_bins: i32,
    pub num_beams: i32,
    pub desired_ping_count: i32,
    pub actual_ping_count: i32,
    pub status: i32,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
    pub hundredths: i32,
    pub serial_number: String,
    pub firmware: Firmware,
}

impl EnsembleData {
    pub const NUM_ELEMENTS: usize = 23;
    const SERIAL_LEN: usize = 32;

    /// # Errors
    /// [Error::NotEnoughData] if fewer than [Self::NUM_ELEMENTS] values are provided.
    pub fn decode(v: &[i32]) -> Result<Self> {
        if v.len() < Self::NUM_ELEMENTS {
            return Err(Error::NotEnoughData {
                actual: v.len(),
                minimum: Self::NUM_ELEMENTS,
            });
        }
        let serial: Vec<u8> = v[13..21].iter().flat_map(|x| x.to_le_bytes()).collect();
        Ok(EnsembleData {
            ensemble_number: v[0],
            num_bins: v[1],
            num_beams: v[2],
            desired_ping_count: v[3],
            actual_ping_count: v[4],
            status: v[5],
            year: v[6],
            month: v[7],
            day: v[8],
            hour: v[9],
            minute: v[10],
            second: v[11],
            hundredths: v[12],
            serial_number: String::from_utf8_lossy(&serial)
                .trim_end_matches('\0')
                .to_string(),
            firmware: Firmware::decode(v[21]),
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<i32> {
        let mut serial = self.serial_number.as_bytes().to_vec();
        serial.resize(Self::SERIAL_LEN, 0);

        let mut v = vec![
            self.ensemble_number,
            self.num_bins,
            self.num_beams,
            self.desired_ping_count,
            self.actual_ping_count,
            self.status,
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.hundredths,
        ];
        v.extend(
            serial
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        );
        v.push(self.firmware.encode());
        v.push(0); // reserved
        v
    }

    /// Time of the first ping, or `None` if the date fields are out of range.
    #[must_use]
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(
            self.year,
            u32::try_from(self.month).ok()?,
            u32::try_from(self.day).ok()?,
        )?;
        date.and_hms_milli_opt(
            u32::try_from(self.hour).ok()?,
            u32::try_from(self.minute).ok()?,
            u32::try_from(self.second).ok()?,
            u32::try_from(self.hundredths).ok()?.checked_mul(10)?,
        )
    }
}

/// Orientation, environment and profile geometry for the ensemble.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ancillary {
    pub first_bin_range: f32,
    pub bin_size: f32,
    pub first_ping_time: f32,
    pub last_ping_time: f32,
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    pub water_temp: f32,
    pub system_temp: f32,
    pub salinity: f32,
    pub pressure: f32,
    pub transducer_depth: f32,
    pub speed_of_sound: f32,
}

impl Ancillary {
    pub const NUM_ELEMENTS: usize = 13;

    /// # Errors
    /// [Error::NotEnoughData] if fewer than [Self::NUM_ELEMENTS] values are provided.
    pub fn decode(v: &[f32]) -> Result<Self> {
        if v.len() < Self::NUM_ELEMENTS {
            return Err(Error::NotEnoughData {
                actual: v.len(),
                minimum: Self::NUM_ELEMENTS,
            });
        }
        Ok(Ancillary {
            first_bin_range: v[0],
            bin_size: v[1],
            first_ping_time: v[2],
            last_ping_time: v[3],
            heading: v[4],
            pitch: v[5],
            roll: v[6],
            water_temp: v[7],
            system_temp: v[8],
            salinity: v[9],
            pressure: v[10],
            transducer_depth: v[11],
            speed_of_sound: v[12],
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<f32> {
        vec![
            self.first_bin_range,
            self.bin_size,
            self.first_ping_time,
            self.last_ping_time,
            self.heading,
            self.pitch,
            self.roll,
            self.water_temp,
            self.system_temp,
            self.salinity,
            self.pressure,
            self.transducer_depth,
            self.speed_of_sound,
        ]
    }
}

/// Bottom tracking results. Per-beam vectors all have one entry per beam.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BottomTrack {
    pub first_ping_time: f32,
    pub last_ping_time: f32,
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    pub water_temp: f32,
    pub system_temp: f32,
    pub salinity: f32,
    pub pressure: f32,
    pub transducer_depth: f32,
    pub speed_of_sound: f32,
    pub status: f32,
    pub actual_ping_count: f32,
    pub range: Vec<f32>,
    pub snr: Vec<f32>,
    pub amplitude: Vec<f32>,
    pub correlation: Vec<f32>,
    pub beam_velocity: Vec<f32>,
    pub beam_good: Vec<f32>,
    pub instrument_velocity: Vec<f32>,
    pub instrument_good: Vec<f32>,
    pub earth_velocity: Vec<f32>,
    pub earth_good: Vec<f32>,
}

impl BottomTrack {
    /// Scalar values preceding the per-beam vectors.
    pub const NUM_SCALARS: usize = 14;
    /// Number of per-beam vectors.
    pub const NUM_VECTORS: usize = 10;

    /// Number of elements used to encode bottom track for `beams` beams.
    #[must_use]
    pub const fn num_elements(beams: usize) -> usize {
        Self::NUM_SCALARS + Self::NUM_VECTORS * beams
    }

    #[must_use]
    pub fn num_beams(&self) -> usize {
        self.range.len()
    }

    /// # Errors
    /// [Error::MalformedRecord] if the element count does not describe a whole number of
    /// beams or disagrees with the encoded beam count.
    pub fn decode(v: &[f32]) -> Result<Self> {
        if v.len() < Self::NUM_SCALARS || (v.len() - Self::NUM_SCALARS) % Self::NUM_VECTORS != 0 {
            return Err(Error::malformed(
                0,
                format!("{} bottom track elements is not a whole number of beams", v.len()),
            ));
        }
        let beams = (v.len() - Self::NUM_SCALARS) / Self::NUM_VECTORS;
        if v[12] as usize != beams {
            return Err(Error::malformed(
                0,
                format!("bottom track declares {} beams but carries {beams}", v[12]),
            ));
        }
        let vector = |idx: usize| {
            let start = Self::NUM_SCALARS + idx * beams;
            v[start..start + beams].to_vec()
        };

        Ok(BottomTrack {
            first_ping_time: v[0],
            last_ping_time: v[1],
            heading: v[2],
            pitch: v[3],
            roll: v[4],
            water_temp: v[5],
            system_temp: v[6],
            salinity: v[7],
            pressure: v[8],
            transducer_depth: v[9],
            speed_of_sound: v[10],
            status: v[11],
            actual_ping_count: v[13],
            range: vector(0),
            snr: vector(1),
            amplitude: vector(2),
            correlation: vector(3),
            beam_velocity: vector(4),
            beam_good: vector(5),
            instrument_velocity: vector(6),
            instrument_good: vector(7),
            earth_velocity: vector(8),
            earth_good: vector(9),
        })
    }

    /// Encode to a flat list of values. Per-beam vectors shorter than [Self::num_beams] are
    /// padded with zeros.
    #[must_use]
    pub fn encode(&self) -> Vec<f32> {
        let beams = self.num_beams();
        let mut v = vec![
            self.first_ping_time,
            self.last_ping_time,
            self.heading,
            self.pitch,
            self.roll,
            self.water_temp,
            self.system_temp,
            self.salinity,
            self.pressure,
            self.transducer_depth,
            self.speed_of_sound,
            self.status,
            beams as f32,
            self.actual_ping_count,
        ];
        for vector in [
            &self.range,
            &self.snr,
            &self.amplitude,
            &self.correlation,
            &self.beam_velocity,
            &self.beam_good,
            &self.instrument_velocity,
            &self.instrument_good,
            &self.earth_velocity,
            &self.earth_good,
        ] {
            let mut vector = vector.clone();
            vector.resize(beams, 0.0);
            v.extend(vector);
        }
        v
    }
}

/// NMEA text carried with the ensemble, copied verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Nmea {
    pub text: String,
}

impl Nmea {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Nmea { text: text.into() }
    }

    /// Non-empty lines of the text with line terminators removed.
    pub fn sentences(&self) -> impl Iterator<Item = &str> {
        self.text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.is_empty())
    }

    /// Append `more` on a new line.
    pub fn append(&mut self, more: &str) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push_str("\r\n");
        }
        self.text.push_str(more);
    }
}

/// A data set this crate recognizes but does not interpret.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawDataSet {
    pub values: Vec<f32>,
}

/// Coordinate frame of DVL velocities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DvlFrame {
    #[default]
    Instrument,
    Earth,
}

/// Bottom and water-mass velocities reported by a `$PRTI01`/`$PRTI02` sentence.
///
/// Fields the instrument left empty are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dvl {
    pub frame: DvlFrame,
    /// Hundredths of a second since start of ping.
    pub start_time: Option<i64>,
    pub sample_number: Option<i64>,
    /// Hundredths of a degree C.
    pub temperature: Option<i64>,
    /// mm/s
    pub bottom_velocity: [Option<i64>; 3],
    /// mm
    pub bottom_depth: Option<i64>,
    pub water_velocity: [Option<i64>; 3],
    pub water_depth: Option<i64>,
    pub status: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beam_major_layout() {
        // 3 bins, 2 beams
        let dat = [1, 2, 3, 10, 20, 30];
        let data = BeamData::from_beam_major(3, 2, &dat).unwrap();
        assert_eq!(data.num_bins(), 3);
        assert_eq!(data.num_beams(), 2);
        assert_eq!(data.values[[0, 1]], 10);
        assert_eq!(data.values[[2, 0]], 3);
        assert_eq!(data.beam_major(), dat);
    }

    #[test]
    fn bin_major_layout() {
        let dat = [1, 10, 2, 20, 3, 30];
        let data = BeamData::from_bin_major(3, 2, &dat).unwrap();
        assert_eq!(data.values[[0, 1]], 10);
        assert_eq!(data.values[[2, 0]], 3);
    }

    #[test]
    fn beam_data_rejects_wrong_count() {
        assert!(BeamData::from_beam_major(3, 2, &[0f32; 5]).is_err());
    }

    #[test]
    fn ensemble_data_timestamp() {
        let ed = EnsembleData {
            year: 2024,
            month: 6,
            day: 30,
            hour: 23,
            minute: 59,
            second: 58,
            hundredths: 50,
            ..Default::default()
        };
        let ts = ed.timestamp().unwrap();
        assert_eq!(ts.to_string(), "2024-06-30 23:59:58.500");

        let bad = EnsembleData {
            month: 13,
            ..ed
        };
        assert!(bad.timestamp().is_none());
    }

    #[test]
    fn ensemble_data_timestamp_with_huge_hundredths() {
        let ed = EnsembleData {
            year: 2024,
            month: 1,
            day: 1,
            hundredths: i32::MAX,
            ..Default::default()
        };
        assert!(ed.timestamp().is_none());

        let ed = EnsembleData {
            hundredths: 429_496_730,
            ..ed
        };
        assert!(ed.timestamp().is_none());
    }

    #[test]
    fn ensemble_data_serial_survives_encoding() {
        let ed = EnsembleData {
            ensemble_number: 12,
            serial_number: "01300000000000000000000000000001".into(),
            firmware: Firmware {
                major: 0,
                minor: 2,
                revision: 140,
                subsystem: b'3',
            },
            ..Default::default()
        };
        let encoded = ed.encode();
        assert_eq!(encoded.len(), EnsembleData::NUM_ELEMENTS);
        assert_eq!(EnsembleData::decode(&encoded).unwrap(), ed);
    }

    #[test]
    fn bottom_track_rejects_partial_beams() {
        let v = vec![0f32; BottomTrack::NUM_SCALARS + 7];
        assert!(BottomTrack::decode(&v).is_err());
    }

    #[test]
    fn nmea_append_adds_line_break() {
        let mut nmea = Nmea::new("$GPHDT,1.0,T*34");
        nmea.append("$GPGGA,1*00\r\n");
        assert_eq!(
            nmea.sentences().collect::<Vec<_>>(),
            ["$GPHDT,1.0,T*34", "$GPGGA,1*00"]
        );
    }
}
