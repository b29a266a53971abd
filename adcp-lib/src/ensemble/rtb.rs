//! Native binary ensembles.
//!
//! A frame is a 32 byte header (see [crate::framing::header::validate_rtb]), a payload of
//! self-describing data sets, and a 32-bit additive checksum over everything before it.
//!
//! Each data set starts with a [DataSetHeader] giving the value type, element counts and
//! an 8 byte name. The size of a data set can be computed from its header alone, so data
//! sets this crate does not know are skipped without being understood.
use tracing::trace;

use super::{
    Ancillary, BeamData, BottomTrack, DataSetId, Ensemble, EnsembleData, Nmea, RawDataSet,
};
use crate::framing::header::{encode_rtb, validate_rtb, RTB_CHECKSUM, RTB_HEADER_LEN, RTB_SYNC};
use crate::framing::{BadFrame, Format, FrameFormat, Validation};
use crate::prelude::*;

/// Upper bound on data sets in one frame.
pub const MAX_DATA_SETS: usize = 256;

/// Element type of a data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Float,
    Int,
    Byte,
}

impl ValueType {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            ValueType::Float => 10,
            ValueType::Int => 20,
            ValueType::Byte => 50,
        }
    }

    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            10 => Some(ValueType::Float),
            20 => Some(ValueType::Int),
            50 => Some(ValueType::Byte),
            _ => None,
        }
    }

    /// Bytes per element.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            ValueType::Float | ValueType::Int => 4,
            ValueType::Byte => 1,
        }
    }
}

/// Size in bytes of a data set, header included.
///
/// Unknown value types are assumed to be 4 bytes wide. The result may be zero or negative
/// for corrupt headers; callers must check it before advancing.
#[must_use]
pub fn data_set_size(
    value_type: i32,
    name_length: i32,
    num_elements: i32,
    element_multiplier: i32,
) -> i64 {
    let width = ValueType::from_code(value_type).map_or(4, ValueType::width) as i64;
    // five i32 fields plus the name
    20 + i64::from(name_length) + i64::from(num_elements) * i64::from(element_multiplier) * width
}

/// Header preceding every data set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSetHeader {
    pub value_type: i32,
    pub num_elements: i32,
    pub element_multiplier: i32,
    pub imaginary: i32,
    pub name_length: i32,
    pub name: [u8; 8],
}

impl DataSetHeader {
    pub const LEN: usize = 28;
    pub const NAME_LEN: i32 = 8;

    #[must_use]
    pub fn new(name: [u8; 8], value_type: ValueType, num_elements: i32, multiplier: i32) -> Self {
        DataSetHeader {
            value_type: value_type.code(),
            num_elements,
            element_multiplier: multiplier,
            imaginary: 0,
            name_length: Self::NAME_LEN,
            name,
        }
    }

    /// Decode from bytes, or `None` if there are not enough bytes.
    #[must_use]
    pub fn decode(dat: &[u8]) -> Option<Self> {
        if dat.len() < Self::LEN {
            return None;
        }
        let int = |idx: usize| {
            let off = idx * 4;
            i32::from_le_bytes([dat[off], dat[off + 1], dat[off + 2], dat[off + 3]])
        };
        let mut name = [0u8; 8];
        name.copy_from_slice(&dat[20..28]);
        Some(DataSetHeader {
            value_type: int(0),
            num_elements: int(1),
            element_multiplier: int(2),
            imaginary: int(3),
            name_length: int(4),
            name,
        })
    }

    #[must_use]
    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        for (idx, x) in [
            self.value_type,
            self.num_elements,
            self.element_multiplier,
            self.imaginary,
            self.name_length,
        ]
        .iter()
        .enumerate()
        {
            buf[idx * 4..idx * 4 + 4].copy_from_slice(&x.to_le_bytes());
        }
        buf[20..].copy_from_slice(&self.name);
        buf
    }

    #[must_use]
    pub fn size(&self) -> i64 {
        data_set_size(
            self.value_type,
            self.name_length,
            self.num_elements,
            self.element_multiplier,
        )
    }

    #[must_use]
    pub fn id(&self) -> Option<DataSetId> {
        DataSetId::from_name(&self.name)
    }

    /// Some writers terminate the data sets with an empty header.
    #[must_use]
    pub fn is_end_marker(&self) -> bool {
        self.name_length == 0 || self.name.iter().all(|b| *b == 0)
    }
}

/// A data set's header and the bytes of its values.
#[derive(Debug)]
pub struct DataSet<'a> {
    /// Offset of the data set header within the frame.
    pub offset: usize,
    pub header: DataSetHeader,
    pub data: &'a [u8],
}

/// Iterate over the data sets of a native frame.
///
/// Iteration stops at the end of the payload, at an end marker, or with an error for a data
/// set whose size is smaller than its own header or runs past the payload, and after
/// [MAX_DATA_SETS] data sets.
pub struct DataSets<'a> {
    frame: &'a [u8],
    end: usize,
    cursor: usize,
    count: usize,
    done: bool,
}

impl<'a> DataSets<'a> {
    /// `frame` is a complete frame including its header and checksum.
    #[must_use]
    pub fn new(frame: &'a [u8]) -> Self {
        let end = frame.len().saturating_sub(RTB_CHECKSUM.width());
        DataSets {
            frame,
            end,
            cursor: RTB_HEADER_LEN,
            count: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for DataSets<'a> {
    type Item = Result<DataSet<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor + DataSetHeader::LEN > self.end {
            return None;
        }
        let header = DataSetHeader::decode(&self.frame[self.cursor..self.end])?;
        if header.is_end_marker() {
            self.done = true;
            return None;
        }
        if self.count == MAX_DATA_SETS {
            self.done = true;
            return Some(Err(Error::malformed(
                self.cursor,
                format!("more than {MAX_DATA_SETS} data sets"),
            )));
        }

        let size = header.size();
        if size < DataSetHeader::LEN as i64 {
            self.done = true;
            return Some(Err(Error::malformed(
                self.cursor,
                format!("data set size {size} is smaller than its header"),
            )));
        }
        let size = size as usize;
        if size > self.end - self.cursor {
            self.done = true;
            return Some(Err(Error::malformed(
                self.cursor,
                format!("data set of {size} bytes runs past the payload"),
            )));
        }

        let offset = self.cursor;
        self.cursor += size;
        self.count += 1;
        Some(Ok(DataSet {
            offset,
            data: &self.frame[offset + DataSetHeader::LEN..offset + size],
            header,
        }))
    }
}

fn floats(dat: &[u8]) -> Vec<f32> {
    dat.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn ints(dat: &[u8]) -> Vec<i32> {
    dat.chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn expect_type(ds: &DataSet, id: DataSetId, expected: ValueType) -> Result<()> {
    if ds.header.value_type == expected.code() {
        Ok(())
    } else {
        Err(Error::malformed(
            ds.offset,
            format!(
                "{id:?} has value type {}, expected {}",
                ds.header.value_type,
                expected.code()
            ),
        ))
    }
}

fn dims(ds: &DataSet) -> Result<(usize, usize)> {
    let bins = usize::try_from(ds.header.num_elements);
    let beams = usize::try_from(ds.header.element_multiplier);
    match (bins, beams) {
        (Ok(bins), Ok(beams)) => Ok((bins, beams)),
        _ => Err(Error::malformed(ds.offset, "negative element count")),
    }
}

fn decode_data_set(ens: &mut Ensemble, ds: &DataSet) -> Result<()> {
    let Some(id) = ds.header.id() else {
        trace!(offset = ds.offset, name = ?ds.header.name, "skipping unknown data set");
        return Ok(());
    };
    let at = |err: Error| match err {
        Error::MalformedRecord { reason, .. } => Error::malformed(ds.offset, reason),
        other => Error::malformed(ds.offset, other.to_string()),
    };

    match id {
        DataSetId::BeamVelocity
        | DataSetId::InstrumentVelocity
        | DataSetId::EarthVelocity
        | DataSetId::Amplitude
        | DataSetId::Correlation => {
            expect_type(ds, id, ValueType::Float)?;
            let (bins, beams) = dims(ds)?;
            let data = Some(BeamData::from_beam_major(bins, beams, &floats(ds.data)).map_err(at)?);
            match id {
                DataSetId::BeamVelocity => ens.beam_velocity = data,
                DataSetId::InstrumentVelocity => ens.instrument_velocity = data,
                DataSetId::EarthVelocity => ens.earth_velocity = data,
                DataSetId::Amplitude => ens.amplitude = data,
                _ => ens.correlation = data,
            }
        }
        DataSetId::GoodBeam | DataSetId::GoodEarth => {
            expect_type(ds, id, ValueType::Int)?;
            let (bins, beams) = dims(ds)?;
            let data = Some(BeamData::from_beam_major(bins, beams, &ints(ds.data)).map_err(at)?);
            if id == DataSetId::GoodBeam {
                ens.good_beam = data;
            } else {
                ens.good_earth = data;
            }
        }
        DataSetId::EnsembleData => {
            expect_type(ds, id, ValueType::Int)?;
            ens.ensemble_data = Some(EnsembleData::decode(&ints(ds.data)).map_err(at)?);
        }
        DataSetId::Ancillary => {
            expect_type(ds, id, ValueType::Float)?;
            ens.ancillary = Some(Ancillary::decode(&floats(ds.data)).map_err(at)?);
        }
        DataSetId::BottomTrack => {
            expect_type(ds, id, ValueType::Float)?;
            ens.bottom_track = Some(BottomTrack::decode(&floats(ds.data)).map_err(at)?);
        }
        DataSetId::Nmea => {
            expect_type(ds, id, ValueType::Byte)?;
            let text = String::from_utf8_lossy(ds.data);
            ens.nmea = Some(Nmea::new(text.trim_end_matches('\0')));
        }
        DataSetId::ProfileEngineering
        | DataSetId::BottomTrackEngineering
        | DataSetId::SystemSetup
        | DataSetId::RangeTracking
        | DataSetId::GageHeight => {
            expect_type(ds, id, ValueType::Float)?;
            if let Some(slot) = ens.raw_mut(id) {
                *slot = Some(RawDataSet {
                    values: floats(ds.data),
                });
            }
        }
        DataSetId::Dvl => {}
    }
    Ok(())
}

/// Parse the data sets of a complete native frame.
///
/// # Errors
/// [Error::MalformedRecord] if any data set is malformed; nothing from the frame is used.
pub fn parse(frame: &[u8]) -> Result<Ensemble> {
    let mut ens = Ensemble::default();
    for ds in DataSets::new(frame) {
        decode_data_set(&mut ens, &ds?)?;
    }
    Ok(ens)
}

/// Encode a data set from its name, type, dimensions and raw value bytes.
#[must_use]
pub fn encode_data_set(
    name: [u8; 8],
    value_type: ValueType,
    num_elements: i32,
    multiplier: i32,
    data: &[u8],
) -> Vec<u8> {
    let header = DataSetHeader::new(name, value_type, num_elements, multiplier);
    let mut buf = Vec::with_capacity(DataSetHeader::LEN + data.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(data);
    buf
}

fn name_of(id: DataSetId) -> [u8; 8] {
    id.name().unwrap_or_default()
}

fn float_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn int_bytes(v: &[i32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn encode_floats(id: DataSetId, v: &[f32]) -> Vec<u8> {
    encode_data_set(name_of(id), ValueType::Float, v.len() as i32, 1, &float_bytes(v))
}

fn encode_beams_f32(id: DataSetId, data: &BeamData<f32>) -> Vec<u8> {
    encode_data_set(
        name_of(id),
        ValueType::Float,
        data.num_bins() as i32,
        data.num_beams() as i32,
        &float_bytes(&data.beam_major()),
    )
}

fn encode_beams_i32(id: DataSetId, data: &BeamData<i32>) -> Vec<u8> {
    encode_data_set(
        name_of(id),
        ValueType::Int,
        data.num_bins() as i32,
        data.num_beams() as i32,
        &int_bytes(&data.beam_major()),
    )
}

/// Encode NMEA text as a data set.
#[must_use]
pub fn encode_nmea(text: &str) -> Vec<u8> {
    encode_data_set(
        name_of(DataSetId::Nmea),
        ValueType::Byte,
        text.len() as i32,
        1,
        text.as_bytes(),
    )
}

/// Encode every data set of `ens` that has a native representation.
#[must_use]
pub fn encode_payload(ens: &Ensemble) -> Vec<u8> {
    let mut buf = Vec::new();
    let velocities = [
        (DataSetId::BeamVelocity, &ens.beam_velocity),
        (DataSetId::InstrumentVelocity, &ens.instrument_velocity),
        (DataSetId::EarthVelocity, &ens.earth_velocity),
        (DataSetId::Amplitude, &ens.amplitude),
        (DataSetId::Correlation, &ens.correlation),
    ];
    for (id, data) in velocities {
        if let Some(data) = data {
            buf.extend(encode_beams_f32(id, data));
        }
    }
    for (id, data) in [
        (DataSetId::GoodBeam, &ens.good_beam),
        (DataSetId::GoodEarth, &ens.good_earth),
    ] {
        if let Some(data) = data {
            buf.extend(encode_beams_i32(id, data));
        }
    }
    if let Some(ed) = &ens.ensemble_data {
        let v = ed.encode();
        buf.extend(encode_data_set(
            name_of(DataSetId::EnsembleData),
            ValueType::Int,
            v.len() as i32,
            1,
            &int_bytes(&v),
        ));
    }
    if let Some(anc) = &ens.ancillary {
        buf.extend(encode_floats(DataSetId::Ancillary, &anc.encode()));
    }
    if let Some(bt) = &ens.bottom_track {
        buf.extend(encode_floats(DataSetId::BottomTrack, &bt.encode()));
    }
    for id in [
        DataSetId::ProfileEngineering,
        DataSetId::BottomTrackEngineering,
        DataSetId::SystemSetup,
        DataSetId::RangeTracking,
        DataSetId::GageHeight,
    ] {
        if let Some(raw) = ens.raw(id) {
            buf.extend(encode_floats(id, &raw.values));
        }
    }
    if let Some(nmea) = &ens.nmea {
        buf.extend(encode_nmea(&nmea.text));
    }
    buf
}

/// Wrap `payload` in a header and checksum.
#[must_use]
pub fn encode_frame(number: i32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RTB_HEADER_LEN + payload.len() + RTB_CHECKSUM.width());
    buf.extend_from_slice(&encode_rtb(number, payload.len() as i32));
    buf.extend_from_slice(payload);
    RTB_CHECKSUM.append(&mut buf);
    buf
}

/// Encode `ens` as a complete frame. The ensemble number is taken from its
/// [EnsembleData], or 0.
#[must_use]
pub fn encode_ensemble(ens: &Ensemble) -> Vec<u8> {
    let number = ens.ensemble_data.as_ref().map_or(0, |ed| ed.ensemble_number);
    encode_frame(number, &encode_payload(ens))
}

/// Rebuild `frame` so its NMEA data set holds `text`.
///
/// Any NMEA data set already in the frame is replaced, every other data set is copied
/// unchanged, and the header counters and checksum are recomputed.
///
/// # Errors
/// [Error::MalformedRecord] if the frame's data sets cannot be walked.
pub fn with_nmea(frame: &[u8], text: &str) -> Result<Vec<u8>> {
    if frame.len() < RTB_HEADER_LEN + RTB_CHECKSUM.width() {
        return Err(Error::NotEnoughData {
            actual: frame.len(),
            minimum: RTB_HEADER_LEN + RTB_CHECKSUM.width(),
        });
    }
    let number = i32::from_le_bytes([frame[16], frame[17], frame[18], frame[19]]);

    let mut payload = Vec::with_capacity(frame.len() + text.len());
    let mut end = RTB_HEADER_LEN;
    for ds in DataSets::new(frame) {
        let ds = ds?;
        end = ds.offset + DataSetHeader::LEN + ds.data.len();
        if ds.header.id() != Some(DataSetId::Nmea) {
            payload.extend_from_slice(&frame[ds.offset..end]);
        }
    }
    // Keep bytes that trail the last data set, e.g., an end marker.
    payload.extend_from_slice(&frame[end..frame.len() - RTB_CHECKSUM.width()]);
    // An end marker must stay last, so the text goes in front of any trailing bytes.
    let trailing = frame.len() - RTB_CHECKSUM.width() - end;
    let tail = payload.split_off(payload.len() - trailing);
    payload.extend(encode_nmea(text));
    payload.extend(tail);

    Ok(encode_frame(number, &payload))
}

/// [FrameFormat] for native binary ensembles.
#[derive(Debug, Clone)]
pub struct RtbFormat {
    max_payload: usize,
}

impl RtbFormat {
    #[must_use]
    pub fn new(max_payload: usize) -> Self {
        RtbFormat { max_payload }
    }
}

impl FrameFormat for RtbFormat {
    fn format(&self) -> Format {
        Format::Rtb
    }

    fn sync_pattern(&self) -> &[u8] {
        &RTB_SYNC
    }

    fn min_frame_len(&self) -> usize {
        RTB_HEADER_LEN + 1 + RTB_CHECKSUM.width()
    }

    fn validate(&self, window: &[u8]) -> Validation {
        validate_rtb(window, self.max_payload)
    }

    fn verify(&self, frame: &[u8]) -> std::result::Result<(), BadFrame> {
        RTB_CHECKSUM.verify(frame)
    }

    fn parse(&self, frame: &[u8]) -> Result<Ensemble> {
        parse(frame)
    }

    fn with_nmea(&self, frame: &[u8], nmea: &str) -> Option<Vec<u8>> {
        match with_nmea(frame, nmea) {
            Ok(frame) => Some(frame),
            Err(err) => {
                trace!("cannot add nmea to raw frame: {err}");
                None
            }
        }
    }
}
