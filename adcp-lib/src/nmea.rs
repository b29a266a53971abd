//! NMEA 0183 sentence checksums and location.
//!
//! A sentence is `$<body>*hh` where `hh` is the XOR of every body byte as two hex digits.

/// XOR of every byte in `body`.
#[must_use]
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

/// Result of checking a sentence's checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Valid,
    Mismatch { carried: u8, computed: u8 },
    /// Not a `$...*hh` sentence.
    Missing,
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Split a sentence into its body, between `$` and `*`, and carried checksum. Trailing
/// whitespace, including the line terminator, is ignored.
#[must_use]
pub fn split(sentence: &[u8]) -> Option<(&[u8], u8)> {
    let end = sentence
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |idx| idx + 1);
    let sentence = &sentence[..end];
    if sentence.len() < 4 || sentence[0] != b'$' {
        return None;
    }
    let star = sentence.len() - 3;
    if sentence[star] != b'*' {
        return None;
    }
    let carried = (hex_digit(sentence[star + 1])? << 4) | hex_digit(sentence[star + 2])?;
    Some((&sentence[1..star], carried))
}

#[must_use]
pub fn check(sentence: &[u8]) -> Check {
    match split(sentence) {
        Some((body, carried)) => {
            let computed = checksum(body);
            if computed == carried {
                Check::Valid
            } else {
                Check::Mismatch { carried, computed }
            }
        }
        None => Check::Missing,
    }
}

#[must_use]
pub fn is_valid(sentence: &str) -> bool {
    check(sentence.as_bytes()) == Check::Valid
}

/// Build a complete sentence, without line terminator, from its body.
#[must_use]
pub fn with_checksum(body: &str) -> String {
    format!("${body}*{:02X}", checksum(body.as_bytes()))
}

/// Candidate sentences in `text`.
///
/// Each candidate starts at a `$` and runs up to the next `$` or line terminator. No
/// checksum validation is done.
pub fn locate(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.match_indices('$').filter_map(move |(start, _)| {
        let rest = &text[start..];
        let end = rest[1..]
            .find(|c: char| matches!(c, '$' | '\r' | '\n'))
            .map_or(rest.len(), |idx| idx + 1);
        let candidate = rest[..end].trim_end();
        (candidate.len() > 1).then_some(candidate)
    })
}
