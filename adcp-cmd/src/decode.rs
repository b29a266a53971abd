use std::io::{stdout, BufWriter, Write};
use std::path::Path;

use adcp::{DecodeEvent, Ensemble, Format};
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::stream::{self, Selection};

#[derive(Debug, Serialize)]
struct Record<'a> {
    format: Format,
    frame_len: usize,
    ensemble: &'a Ensemble,
}

pub fn decode(
    input: &Path,
    selection: Selection,
    chunk_size: usize,
    nmea: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut out = BufWriter::new(stdout().lock());
    let finished = stream::stream(input, selection, chunk_size, nmea, |event| match event {
        DecodeEvent::Ensemble {
            format,
            raw,
            ensemble,
        } => {
            let line = if json {
                json_line(format, raw.len(), &ensemble)?
            } else {
                text_line(format, raw.len(), &ensemble)
            };
            writeln!(out, "{line}").context("writing to stdout")
        }
        DecodeEvent::BadFrame { format, reason } => {
            debug!(%format, %reason, "bad frame");
            Ok(())
        }
        _ => Ok(()),
    })?;
    out.flush().context("writing to stdout")?;

    for (format, stats) in &finished.stats {
        debug!(%format, ?stats, "decoder finished");
    }
    match finished.dominant {
        Some(format) => info!("decoded {} bytes as {format}", finished.bytes),
        None => warn!("no format dominated {} bytes of input", finished.bytes),
    }
    Ok(())
}

fn json_line(format: Format, frame_len: usize, ensemble: &Ensemble) -> Result<String> {
    serde_json::to_string(&Record {
        format,
        frame_len,
        ensemble,
    })
    .context("serializing ensemble")
}

/// One line summary of an ensemble.
fn text_line(format: Format, frame_len: usize, ensemble: &Ensemble) -> String {
    let number = ensemble
        .number()
        .map_or_else(|| "-".to_string(), |n| n.to_string());
    let time = ensemble
        .ensemble_data
        .as_ref()
        .and_then(|d| d.timestamp())
        .map_or_else(|| "-".to_string(), |t| t.to_string());
    let sets = ensemble
        .available()
        .iter()
        .map(|id| format!("{id:?}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{format} #{number} {time} len={frame_len} sets={sets}")
}
