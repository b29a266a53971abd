//! `$PRTI01`/`$PRTI02` DVL sentences.
//!
//! ```text
//! $PRTI01,StartTime,SampleNum,Temp,BtX,BtY,BtZ,BtDepth,WmX,WmY,WmZ,WmDepth,Status*hh
//! ```
//!
//! `PRTI01` reports velocities in the instrument frame and `PRTI02` in the earth frame.
use super::{Dvl, DvlFrame, Ensemble, Nmea};
use crate::framing::header::{validate_prti, PRTI_SYNC};
use crate::framing::{BadFrame, Format, FrameFormat, Validation};
use crate::nmea::{self, Check};
use crate::prelude::*;

const NUM_FIELDS: usize = 13;

fn int_field(idx: usize, field: &str) -> Result<Option<i64>> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse()
        .map(Some)
        .map_err(|_| Error::malformed(idx, format!("field {idx} is not an integer: {field:?}")))
}

/// Decode a sentence, with or without checksum and line terminator.
///
/// # Errors
/// [Error::MalformedRecord] if the tag is unknown, fields are missing or a field does not
/// parse. The offset reported is the field index.
pub fn decode(sentence: &str) -> Result<Dvl> {
    let sentence = sentence.trim_end();
    let body = sentence.split_once('*').map_or(sentence, |(body, _)| body);
    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() < NUM_FIELDS {
        return Err(Error::malformed(
            fields.len(),
            format!("expected {NUM_FIELDS} fields, found {}", fields.len()),
        ));
    }

    let frame = match fields[0] {
        "$PRTI01" => DvlFrame::Instrument,
        "$PRTI02" => DvlFrame::Earth,
        tag => return Err(Error::malformed(0, format!("unsupported sentence {tag:?}"))),
    };
    let int = |idx: usize| int_field(idx, fields[idx]);
    let status = match fields[12].trim() {
        "" => None,
        hex => Some(
            u16::from_str_radix(hex, 16)
                .map_err(|_| Error::malformed(12, format!("status is not hex: {hex:?}")))?,
        ),
    };

    Ok(Dvl {
        frame,
        start_time: int(1)?,
        sample_number: int(2)?,
        temperature: int(3)?,
        bottom_velocity: [int(4)?, int(5)?, int(6)?],
        bottom_depth: int(7)?,
        water_velocity: [int(8)?, int(9)?, int(10)?],
        water_depth: int(11)?,
        status,
    })
}

fn field(x: Option<i64>) -> String {
    x.map(|x| x.to_string()).unwrap_or_default()
}

/// Encode `dvl` as a complete sentence including checksum and `\r\n`.
#[must_use]
pub fn encode(dvl: &Dvl) -> String {
    let tag = match dvl.frame {
        DvlFrame::Instrument => "PRTI01",
        DvlFrame::Earth => "PRTI02",
    };
    let mut fields = vec![
        tag.to_string(),
        field(dvl.start_time),
        field(dvl.sample_number),
        field(dvl.temperature),
    ];
    fields.extend(dvl.bottom_velocity.iter().map(|x| field(*x)));
    fields.push(field(dvl.bottom_depth));
    fields.extend(dvl.water_velocity.iter().map(|x| field(*x)));
    fields.push(field(dvl.water_depth));
    fields.push(dvl.status.map(|s| format!("{s:04X}")).unwrap_or_default());
    format!("{}\r\n", nmea::with_checksum(&fields.join(",")))
}

/// [FrameFormat] for DVL sentences. Frames are single sentences through their `\n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrtiFormat;

impl FrameFormat for PrtiFormat {
    fn format(&self) -> Format {
        Format::Prti
    }

    fn sync_pattern(&self) -> &[u8] {
        PRTI_SYNC
    }

    fn min_frame_len(&self) -> usize {
        // $PRTI01,*hh\r\n
        13
    }

    fn validate(&self, window: &[u8]) -> Validation {
        validate_prti(window)
    }

    fn verify(&self, frame: &[u8]) -> std::result::Result<(), BadFrame> {
        match nmea::check(frame) {
            Check::Valid => Ok(()),
            Check::Mismatch { carried, computed } => Err(BadFrame::Checksum {
                expected: u32::from(carried),
                actual: u32::from(computed),
            }),
            Check::Missing => Err(BadFrame::Malformed("sentence has no checksum".into())),
        }
    }

    fn parse(&self, frame: &[u8]) -> Result<Ensemble> {
        let text = std::str::from_utf8(frame)
            .map_err(|err| Error::malformed(err.valid_up_to(), "sentence is not ASCII"))?;
        let dvl = decode(text)?;
        Ok(Ensemble {
            dvl: Some(dvl),
            nmea: Some(Nmea::new(text.trim_end())),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dvl {
        Dvl {
            frame: DvlFrame::Instrument,
            start_time: Some(2_468_135),
            sample_number: Some(7),
            temperature: Some(1234),
            bottom_velocity: [Some(-50), Some(120), Some(3)],
            bottom_depth: Some(15_020),
            water_velocity: [None, None, None],
            water_depth: None,
            status: Some(0x0004),
        }
    }

    #[test]
    fn decode_encoded_sentence() {
        let sentence = encode(&sample());
        assert!(sentence.starts_with("$PRTI01,2468135,7,1234,-50,120,3,15020,,,,,0004*"));
        assert!(sentence.ends_with("\r\n"));
        assert!(nmea::is_valid(&sentence));
        assert_eq!(decode(&sentence).unwrap(), sample());
    }

    #[test]
    fn earth_frame_sentence() {
        let dvl = Dvl {
            frame: DvlFrame::Earth,
            ..sample()
        };
        let sentence = encode(&dvl);
        assert!(sentence.starts_with("$PRTI02,"));
        assert_eq!(decode(&sentence).unwrap().frame, DvlFrame::Earth);
    }

    #[test]
    fn short_sentence_is_malformed() {
        assert!(matches!(
            decode("$PRTI01,1,2,3"),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn bad_numbers_are_malformed() {
        let zult = decode("$PRTI01,1,2,x,4,5,6,7,8,9,10,11,0000");
        assert!(matches!(zult, Err(Error::MalformedRecord { offset: 3, .. })));

        let zult = decode("$PRTI01,1,2,3,4,5,6,7,8,9,10,11,ZZZZ");
        assert!(matches!(zult, Err(Error::MalformedRecord { offset: 12, .. })));
    }

    #[test]
    fn verify_and_parse_frame() {
        let sentence = encode(&sample());
        let format = PrtiFormat;
        let frame = sentence.as_bytes();
        assert!(matches!(format.validate(frame), Validation::Valid(h) if h.frame_len == frame.len()));
        assert!(format.verify(frame).is_ok());

        let ens = format.parse(frame).unwrap();
        assert_eq!(ens.dvl, Some(sample()));
        assert_eq!(ens.number(), Some(7));
        assert_eq!(ens.nmea.unwrap().text, sentence.trim_end());
    }

    #[test]
    fn verify_rejects_bad_checksum() {
        let mut sentence = encode(&sample()).into_bytes();
        // corrupt a digit in the body
        sentence[9] = if sentence[9] == b'1' { b'2' } else { b'1' };
        assert!(matches!(
            PrtiFormat.verify(&sentence),
            Err(BadFrame::Checksum { .. })
        ));
    }
}
