//! Decoded ensembles and the record parsers for each wire format.
pub mod pd0;
pub mod prti;
mod records;
pub mod rtb;

pub use records::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies a data set within an ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataSetId {
    BeamVelocity,
    InstrumentVelocity,
    EarthVelocity,
    Amplitude,
    Correlation,
    GoodBeam,
    GoodEarth,
    EnsembleData,
    Ancillary,
    BottomTrack,
    Nmea,
    ProfileEngineering,
    BottomTrackEngineering,
    SystemSetup,
    RangeTracking,
    GageHeight,
    /// Only produced by DVL sentences; has no native data set name.
    Dvl,
}

impl DataSetId {
    pub const ALL: [DataSetId; 17] = [
        DataSetId::BeamVelocity,
        DataSetId::InstrumentVelocity,
        DataSetId::EarthVelocity,
        DataSetId::Amplitude,
        DataSetId::Correlation,
        DataSetId::GoodBeam,
        DataSetId::GoodEarth,
        DataSetId::EnsembleData,
        DataSetId::Ancillary,
        DataSetId::BottomTrack,
        DataSetId::Nmea,
        DataSetId::ProfileEngineering,
        DataSetId::BottomTrackEngineering,
        DataSetId::SystemSetup,
        DataSetId::RangeTracking,
        DataSetId::GageHeight,
        DataSetId::Dvl,
    ];

    /// Native data set name, NUL padded to 8 bytes.
    #[must_use]
    pub fn name(&self) -> Option<[u8; 8]> {
        let name: &[u8; 7] = match self {
            DataSetId::BeamVelocity => b"E000001",
            DataSetId::InstrumentVelocity => b"E000002",
            DataSetId::EarthVelocity => b"E000003",
            DataSetId::Amplitude => b"E000004",
            DataSetId::Correlation => b"E000005",
            DataSetId::GoodBeam => b"E000006",
            DataSetId::GoodEarth => b"E000007",
            DataSetId::EnsembleData => b"E000008",
            DataSetId::Ancillary => b"E000009",
            DataSetId::BottomTrack => b"E000010",
            DataSetId::Nmea => b"E000011",
            DataSetId::ProfileEngineering => b"E000012",
            DataSetId::BottomTrackEngineering => b"E000013",
            DataSetId::SystemSetup => b"E000014",
            DataSetId::RangeTracking => b"E000015",
            DataSetId::GageHeight => b"E000016",
            DataSetId::Dvl => return None,
        };
        let mut buf = [0u8; 8];
        buf[..7].copy_from_slice(name);
        Some(buf)
    }

    /// Look up a native data set name. Trailing NULs are ignored.
    #[must_use]
    pub fn from_name(name: &[u8]) -> Option<Self> {
        let end = name
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |idx| idx + 1);
        let name = &name[..end];
        Self::ALL
            .into_iter()
            .find(|id| id.name().is_some_and(|n| n[..7] == *name))
    }
}

/// One decoded measurement record.
///
/// Each data set is optional; a `None` field means the frame did not carry it.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ensemble {
    pub beam_velocity: Option<BeamData<f32>>,
    pub instrument_velocity: Option<BeamData<f32>>,
    pub earth_velocity: Option<BeamData<f32>>,
    pub amplitude: Option<BeamData<f32>>,
    pub correlation: Option<BeamData<f32>>,
    pub good_beam: Option<BeamData<i32>>,
    pub good_earth: Option<BeamData<i32>>,
    pub ensemble_data: Option<EnsembleData>,
    pub ancillary: Option<Ancillary>,
    pub bottom_track: Option<BottomTrack>,
    pub nmea: Option<Nmea>,
    pub profile_engineering: Option<RawDataSet>,
    pub bottom_track_engineering: Option<RawDataSet>,
    pub system_setup: Option<RawDataSet>,
    pub range_tracking: Option<RawDataSet>,
    pub gage_height: Option<RawDataSet>,
    pub dvl: Option<Dvl>,
}

impl Ensemble {
    #[must_use]
    pub fn is_available(&self, id: DataSetId) -> bool {
        match id {
            DataSetId::BeamVelocity => self.beam_velocity.is_some(),
            DataSetId::InstrumentVelocity => self.instrument_velocity.is_some(),
            DataSetId::EarthVelocity => self.earth_velocity.is_some(),
            DataSetId::Amplitude => self.amplitude.is_some(),
            DataSetId::Correlation => self.correlation.is_some(),
            DataSetId::GoodBeam => self.good_beam.is_some(),
            DataSetId::GoodEarth => self.good_earth.is_some(),
            DataSetId::EnsembleData => self.ensemble_data.is_some(),
            DataSetId::Ancillary => self.ancillary.is_some(),
            DataSetId::BottomTrack => self.bottom_track.is_some(),
            DataSetId::Nmea => self.nmea.is_some(),
            DataSetId::ProfileEngineering => self.profile_engineering.is_some(),
            DataSetId::BottomTrackEngineering => self.bottom_track_engineering.is_some(),
            DataSetId::SystemSetup => self.system_setup.is_some(),
            DataSetId::RangeTracking => self.range_tracking.is_some(),
            DataSetId::GageHeight => self.gage_height.is_some(),
            DataSetId::Dvl => self.dvl.is_some(),
        }
    }

    /// Ids of every data set present.
    #[must_use]
    pub fn available(&self) -> Vec<DataSetId> {
        DataSetId::ALL
            .into_iter()
            .filter(|id| self.is_available(*id))
            .collect()
    }

    /// The ensemble number, or the DVL sample number for sentence based ensembles.
    #[must_use]
    pub fn number(&self) -> Option<i64> {
        self.ensemble_data
            .as_ref()
            .map(|ed| i64::from(ed.ensemble_number))
            .or_else(|| self.dvl.as_ref().and_then(|dvl| dvl.sample_number))
    }

    pub(crate) fn raw_mut(&mut self, id: DataSetId) -> Option<&mut Option<RawDataSet>> {
        match id {
            DataSetId::ProfileEngineering => Some(&mut self.profile_engineering),
            DataSetId::BottomTrackEngineering => Some(&mut self.bottom_track_engineering),
            DataSetId::SystemSetup => Some(&mut self.system_setup),
            DataSetId::RangeTracking => Some(&mut self.range_tracking),
            DataSetId::GageHeight => Some(&mut self.gage_height),
            _ => None,
        }
    }

    pub(crate) fn raw(&self, id: DataSetId) -> Option<&RawDataSet> {
        match id {
            DataSetId::ProfileEngineering => self.profile_engineering.as_ref(),
            DataSetId::BottomTrackEngineering => self.bottom_track_engineering.as_ref(),
            DataSetId::SystemSetup => self.system_setup.as_ref(),
            DataSetId::RangeTracking => self.range_tracking.as_ref(),
            DataSetId::GageHeight => self.gage_height.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_lookup() {
        for id in DataSetId::ALL {
            if let Some(name) = id.name() {
                assert_eq!(DataSetId::from_name(&name), Some(id));
                assert_eq!(DataSetId::from_name(&name[..7]), Some(id));
            }
        }
        assert_eq!(DataSetId::from_name(b"E000099\0"), None);
        assert_eq!(DataSetId::from_name(&[0u8; 8]), None);
    }

    #[test]
    fn available_lists_present_data_sets() {
        let ens = Ensemble {
            nmea: Some(Nmea::new("$GPHDT,1.0,T*34")),
            ancillary: Some(Ancillary::default()),
            ..Default::default()
        };
        assert_eq!(ens.available(), [DataSetId::Ancillary, DataSetId::Nmea]);
        assert!(!ens.is_available(DataSetId::BottomTrack));
        assert_eq!(ens.number(), None);
    }
}
