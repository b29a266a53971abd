use super::BadFrame;

/// Additive checksums used by the binary formats.
///
/// The checksum covers every byte of the frame before the trailing checksum field and is
/// stored little-endian in that field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// Sum of all bytes modulo 2^32, stored in 4 bytes.
    Additive32,
    /// Sum of all bytes modulo 2^16, stored in 2 bytes.
    Additive16,
}

impl ChecksumKind {
    /// Width of the trailing checksum field in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            ChecksumKind::Additive32 => 4,
            ChecksumKind::Additive16 => 2,
        }
    }

    #[must_use]
    pub fn compute(self, dat: &[u8]) -> u32 {
        let sum = dat
            .iter()
            .fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b)));
        match self {
            ChecksumKind::Additive32 => sum,
            ChecksumKind::Additive16 => sum & 0xffff,
        }
    }

    /// Decode a checksum field, or `None` if `dat` is shorter than [Self::width].
    #[must_use]
    pub fn read(self, dat: &[u8]) -> Option<u32> {
        match self {
            ChecksumKind::Additive32 => {
                let x: [u8; 4] = dat.get(..4)?.try_into().ok()?;
                Some(u32::from_le_bytes(x))
            }
            ChecksumKind::Additive16 => {
                let x: [u8; 2] = dat.get(..2)?.try_into().ok()?;
                Some(u32::from(u16::from_le_bytes(x)))
            }
        }
    }

    /// Encode `value` as a checksum field.
    #[must_use]
    pub fn encode(self, value: u32) -> Vec<u8> {
        match self {
            ChecksumKind::Additive32 => value.to_le_bytes().to_vec(),
            ChecksumKind::Additive16 => (value as u16).to_le_bytes().to_vec(),
        }
    }

    /// Compute the checksum of `dat` and append it.
    pub fn append(self, dat: &mut Vec<u8>) {
        let sum = self.compute(dat);
        dat.extend_from_slice(&self.encode(sum));
    }

    /// Verify that the trailing checksum field of `frame` matches its contents.
    ///
    /// # Errors
    /// [BadFrame::Checksum] on mismatch, [BadFrame::Malformed] if the frame is shorter than
    /// the checksum field.
    pub fn verify(self, frame: &[u8]) -> Result<(), BadFrame> {
        let width = self.width();
        if frame.len() < width {
            return Err(BadFrame::Malformed(format!(
                "frame of {} bytes cannot hold a {width} byte checksum",
                frame.len()
            )));
        }
        let (body, trailer) = frame.split_at(frame.len() - width);
        // trailer is exactly width bytes so read cannot fail
        let expected = self.read(trailer).unwrap_or_default();
        let actual = self.compute(body);
        if expected == actual {
            Ok(())
        } else {
            Err(BadFrame::Checksum { expected, actual })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn additive32_sums_all_bytes() {
        assert_eq!(ChecksumKind::Additive32.compute(&[]), 0);
        assert_eq!(ChecksumKind::Additive32.compute(&[1, 2, 3]), 6);
        assert_eq!(ChecksumKind::Additive32.compute(&[0xff; 16]), 0xff * 16);
    }

    #[test]
    fn additive16_wraps() {
        let dat = vec![0xffu8; 300];
        assert_eq!(ChecksumKind::Additive16.compute(&dat), (0xff * 300) & 0xffff);
    }

    #[test]
    fn verify_detects_any_flipped_trailer_byte() {
        for kind in [ChecksumKind::Additive32, ChecksumKind::Additive16] {
            let mut frame = b"some frame bytes".to_vec();
            kind.append(&mut frame);
            assert!(kind.verify(&frame).is_ok());

            for idx in frame.len() - kind.width()..frame.len() {
                let mut bad = frame.clone();
                bad[idx] ^= 0x01;
                assert!(
                    matches!(kind.verify(&bad), Err(BadFrame::Checksum { .. })),
                    "{kind:?} flip at {idx} not detected"
                );
            }
        }
    }

    #[test]
    fn verify_short_frame_is_malformed() {
        let zult = ChecksumKind::Additive32.verify(&[0, 1]);
        assert!(matches!(zult, Err(BadFrame::Malformed(_))));
    }

    #[test]
    fn encoding_is_little_endian() {
        assert_eq!(ChecksumKind::Additive32.encode(0x0102_0304), [4, 3, 2, 1]);
        assert_eq!(ChecksumKind::Additive16.encode(0x0102_0304), [4, 3]);
        assert_eq!(ChecksumKind::Additive16.read(&[4, 3]), Some(0x0304));
        assert_eq!(ChecksumKind::Additive32.read(&[4, 3]), None);
    }
}
