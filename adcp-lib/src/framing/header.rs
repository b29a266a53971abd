//! Header validation for each supported format.
//!
//! Validators receive a window starting at a sync pattern match and decide whether the
//! header there can be trusted before anything looks at the declared frame length.
use super::{CandidateHeader, ChecksumKind, Invalid, Validation};

/// Native sync pattern: sixteen `0x80` bytes.
pub const RTB_SYNC: [u8; 16] = [0x80; 16];
/// Native header: sync, ensemble number and its complement, payload size and its complement.
pub const RTB_HEADER_LEN: usize = RTB_SYNC.len() + 16;
pub const RTB_CHECKSUM: ChecksumKind = ChecksumKind::Additive32;

pub const PD0_SYNC: [u8; 2] = [0x7f, 0x7f];
/// Fixed part of a PD0 header before the data type offset table.
pub const PD0_FIXED_HEADER_LEN: usize = 6;
/// More data types than this in one ensemble indicates a false sync.
pub const PD0_MAX_DATA_TYPES: u8 = 32;
pub const PD0_CHECKSUM: ChecksumKind = ChecksumKind::Additive16;

pub const PRTI_SYNC: &[u8] = b"$PRTI";
/// Longest `$PRTI` sentence accepted, terminator included.
pub const PRTI_MAX_SENTENCE: usize = 256;

fn read_i32(dat: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        dat[offset],
        dat[offset + 1],
        dat[offset + 2],
        dat[offset + 3],
    ])
}

/// Validate a native header at the start of `window`.
///
/// The ensemble number and payload size are each followed by their one's complement. A
/// header is only trusted if both pairs agree and the payload size is positive and no more
/// than `max_payload`.
#[must_use]
pub fn validate_rtb(window: &[u8], max_payload: usize) -> Validation {
    if window.len() < RTB_HEADER_LEN {
        return Validation::Incomplete;
    }
    if window[..RTB_SYNC.len()] != RTB_SYNC {
        return Validation::Invalid(Invalid::SyncMismatch);
    }

    let off = RTB_SYNC.len();
    let number = read_i32(window, off);
    let number_inv = read_i32(window, off + 4);
    let size = read_i32(window, off + 8);
    let size_inv = read_i32(window, off + 12);

    if number != !number_inv || size != !size_inv {
        return Validation::Invalid(Invalid::HeaderSelfCheck);
    }
    if size <= 0 || size as usize > max_payload {
        return Validation::Invalid(Invalid::PayloadSize(i64::from(size)));
    }

    let payload_size = size as usize;
    Validation::Valid(CandidateHeader {
        sequence_number: Some(number as u32),
        payload_size,
        frame_len: RTB_HEADER_LEN + payload_size + RTB_CHECKSUM.width(),
    })
}

/// Encode a native header for an ensemble with `payload_size` payload bytes.
#[must_use]
pub fn encode_rtb(number: i32, payload_size: i32) -> [u8; RTB_HEADER_LEN] {
    let mut buf = [0u8; RTB_HEADER_LEN];
    buf[..RTB_SYNC.len()].copy_from_slice(&RTB_SYNC);
    let off = RTB_SYNC.len();
    buf[off..off + 4].copy_from_slice(&number.to_le_bytes());
    buf[off + 4..off + 8].copy_from_slice(&(!number).to_le_bytes());
    buf[off + 8..off + 12].copy_from_slice(&payload_size.to_le_bytes());
    buf[off + 12..off + 16].copy_from_slice(&(!payload_size).to_le_bytes());
    buf
}

/// Validate a PD0 header at the start of `window`.
///
/// PD0 has no redundant header fields, so the byte count, the number of data types and
/// the offset table are checked against each other instead: offsets must lie past the
/// header, strictly increase, and leave room for a data type id before the byte count.
#[must_use]
pub fn validate_pd0(window: &[u8]) -> Validation {
    if window.len() < PD0_FIXED_HEADER_LEN {
        return Validation::Incomplete;
    }
    if window[..PD0_SYNC.len()] != PD0_SYNC {
        return Validation::Invalid(Invalid::SyncMismatch);
    }

    let num_bytes = usize::from(u16::from_le_bytes([window[2], window[3]]));
    let num_types = window[5];
    if num_types == 0 || num_types > PD0_MAX_DATA_TYPES {
        return Validation::Invalid(Invalid::Layout("data type count out of range"));
    }
    let header_len = PD0_FIXED_HEADER_LEN + 2 * usize::from(num_types);
    if num_bytes < header_len + 2 {
        return Validation::Invalid(Invalid::PayloadSize(num_bytes as i64));
    }
    if window.len() < header_len {
        return Validation::Incomplete;
    }

    let mut last = 0usize;
    for idx in 0..usize::from(num_types) {
        let pos = PD0_FIXED_HEADER_LEN + 2 * idx;
        let offset = usize::from(u16::from_le_bytes([window[pos], window[pos + 1]]));
        if offset < header_len || offset + 2 > num_bytes || offset <= last {
            return Validation::Invalid(Invalid::Layout("data type offset out of order"));
        }
        last = offset;
    }

    Validation::Valid(CandidateHeader {
        sequence_number: None,
        payload_size: num_bytes - header_len,
        frame_len: num_bytes + PD0_CHECKSUM.width(),
    })
}

/// Validate a `$PRTI01`/`$PRTI02` sentence at the start of `window`.
///
/// The frame extends through the first `\n`. A `$` before the terminator means this
/// sentence was cut short by the start of another one.
#[must_use]
pub fn validate_prti(window: &[u8]) -> Validation {
    const TAG_LEN: usize = 8; // $PRTI0x,
    if window.len() < TAG_LEN {
        if !PRTI_SYNC.starts_with(&window[..window.len().min(PRTI_SYNC.len())]) {
            return Validation::Invalid(Invalid::SyncMismatch);
        }
        return Validation::Incomplete;
    }
    if !window.starts_with(PRTI_SYNC) {
        return Validation::Invalid(Invalid::SyncMismatch);
    }
    if !matches!(&window[5..TAG_LEN], b"01," | b"02,") {
        return Validation::Invalid(Invalid::Layout("unsupported sentence"));
    }

    let limit = window.len().min(PRTI_MAX_SENTENCE);
    for (idx, b) in window[..limit].iter().enumerate().skip(1) {
        match b {
            b'\n' => {
                return Validation::Valid(CandidateHeader {
                    sequence_number: None,
                    payload_size: idx + 1 - TAG_LEN,
                    frame_len: idx + 1,
                })
            }
            b'$' => return Validation::Invalid(Invalid::Layout("sentence interrupted")),
            _ => {}
        }
    }
    if limit == PRTI_MAX_SENTENCE {
        return Validation::Invalid(Invalid::Layout("sentence too long"));
    }
    Validation::Incomplete
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rtb_window(number: i32, size: i32) -> Vec<u8> {
        encode_rtb(number, size).to_vec()
    }

    #[test]
    fn rtb_valid_header() {
        let zult = validate_rtb(&rtb_window(1, 40), 1024);
        assert_eq!(
            zult,
            Validation::Valid(CandidateHeader {
                sequence_number: Some(1),
                payload_size: 40,
                frame_len: 76,
            })
        );
    }

    #[test]
    fn rtb_complement_mismatch_is_invalid() {
        let mut dat = rtb_window(1, 40);
        dat[20] ^= 0x01; // complement of the ensemble number
        assert_eq!(
            validate_rtb(&dat, 1024),
            Validation::Invalid(Invalid::HeaderSelfCheck)
        );

        let mut dat = rtb_window(1, 40);
        dat[24] ^= 0x10; // payload size
        assert_eq!(
            validate_rtb(&dat, 1024),
            Validation::Invalid(Invalid::HeaderSelfCheck)
        );
    }

    #[test]
    fn rtb_non_positive_payload_is_invalid() {
        assert_eq!(
            validate_rtb(&rtb_window(1, 0), 1024),
            Validation::Invalid(Invalid::PayloadSize(0))
        );
        assert_eq!(
            validate_rtb(&rtb_window(1, -5), 1024),
            Validation::Invalid(Invalid::PayloadSize(-5))
        );
    }

    #[test]
    fn rtb_oversized_payload_is_invalid() {
        assert_eq!(
            validate_rtb(&rtb_window(1, 2048), 1024),
            Validation::Invalid(Invalid::PayloadSize(2048))
        );
    }

    #[test]
    fn rtb_short_window_is_incomplete() {
        let dat = rtb_window(1, 40);
        assert_eq!(validate_rtb(&dat[..31], 1024), Validation::Incomplete);
    }

    #[test]
    fn rtb_all_sentinel_bytes_are_not_a_header() {
        assert_eq!(
            validate_rtb(&[0x80; 40], 1024),
            Validation::Invalid(Invalid::HeaderSelfCheck)
        );
    }

    #[test]
    fn pd0_valid_header() {
        // 2 data types at offsets 10 and 14, 20 bytes total
        let dat = [0x7f, 0x7f, 20, 0, 0, 2, 10, 0, 14, 0];
        assert_eq!(
            validate_pd0(&dat),
            Validation::Valid(CandidateHeader {
                sequence_number: None,
                payload_size: 10,
                frame_len: 22,
            })
        );
    }

    #[test]
    fn pd0_inconsistent_offsets_are_invalid() {
        let zero_types = [0x7f, 0x7f, 20, 0, 0, 0];
        assert!(matches!(validate_pd0(&zero_types), Validation::Invalid(_)));

        let out_of_order = [0x7f, 0x7f, 20, 0, 0, 2, 14, 0, 10, 0];
        assert!(matches!(validate_pd0(&out_of_order), Validation::Invalid(_)));

        let inside_header = [0x7f, 0x7f, 20, 0, 0, 2, 4, 0, 14, 0];
        assert!(matches!(validate_pd0(&inside_header), Validation::Invalid(_)));

        let past_end = [0x7f, 0x7f, 20, 0, 0, 2, 10, 0, 19, 0];
        assert!(matches!(validate_pd0(&past_end), Validation::Invalid(_)));
    }

    #[test]
    fn pd0_partial_offset_table_is_incomplete() {
        let dat = [0x7f, 0x7f, 20, 0, 0, 2, 10, 0];
        assert_eq!(validate_pd0(&dat), Validation::Incomplete);
    }

    #[test]
    fn prti_sentence_extends_to_newline() {
        let dat = b"$PRTI01,1,2,3,4,5,6,7,8,9,10,11,0000*00\r\nmore";
        let Validation::Valid(header) = validate_prti(dat) else {
            panic!("expected valid sentence");
        };
        assert_eq!(header.frame_len, dat.len() - 4);
    }

    #[test]
    fn prti_unterminated_is_incomplete_until_max() {
        assert_eq!(validate_prti(b"$PRTI01,1,2,3"), Validation::Incomplete);
        assert_eq!(validate_prti(b"$PRT"), Validation::Incomplete);

        let mut long = b"$PRTI01,".to_vec();
        long.resize(PRTI_MAX_SENTENCE + 10, b'1');
        assert!(matches!(validate_prti(&long), Validation::Invalid(_)));
    }

    #[test]
    fn prti_rejects_other_sentences() {
        assert!(matches!(
            validate_prti(b"$PRTI30,1,2\r\n"),
            Validation::Invalid(Invalid::Layout(_))
        ));
        assert!(matches!(
            validate_prti(b"$PRTI01,1,$PRTI01,2\r\n"),
            Validation::Invalid(Invalid::Layout(_))
        ));
    }
}
