use std::collections::BTreeMap;
use std::io::{stdout, Write};
use std::path::Path;

use adcp::{DecodeEvent, Format};
use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use serde::Serialize;

use crate::stream::{self, Selection};

#[derive(Debug, Clone)]
pub enum Output {
    Json,
    Text,
}

impl clap::ValueEnum for Output {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Default, Debug, Clone, Serialize)]
struct FormatSummary {
    good_frames: u64,
    bad_frames: u64,
    ensembles: u64,
    stale_clears: u64,
    first_ensemble: Option<i64>,
    last_ensemble: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
struct Summary {
    filename: String,
    bytes: u64,
    dominant: Option<String>,
    formats: BTreeMap<String, FormatSummary>,
}

fn summarize(fpath: &Path, chunk_size: usize) -> Result<Summary> {
    let mut numbers: BTreeMap<Format, (Option<i64>, Option<i64>)> = BTreeMap::default();
    let finished = stream::stream(fpath, Selection::Auto, chunk_size, None, |event| {
        if let DecodeEvent::Ensemble {
            format, ensemble, ..
        } = event
        {
            let entry = numbers.entry(format).or_default();
            if let Some(number) = ensemble.number() {
                entry.0.get_or_insert(number);
                entry.1 = Some(number);
            }
        }
        Ok(())
    })?;

    let formats = finished
        .stats
        .iter()
        .map(|(format, stats)| {
            let (first, last) = numbers.get(format).copied().unwrap_or_default();
            let summary = FormatSummary {
                good_frames: stats.good_frames,
                bad_frames: stats.bad_frames,
                ensembles: stats.ensembles,
                stale_clears: stats.stale_clears,
                first_ensemble: first,
                last_ensemble: last,
            };
            (format.to_string(), summary)
        })
        .collect();

    Ok(Summary {
        filename: fpath.to_string_lossy().to_string(),
        bytes: finished.bytes,
        dominant: finished.dominant.map(|f| f.to_string()),
        formats,
    })
}

pub fn summary(fpath: &Path, chunk_size: usize, output: &Output) -> Result<()> {
    let summary = summarize(fpath, chunk_size)?;

    match output {
        Output::Json => {
            serde_json::to_writer_pretty(stdout(), &summary).context("serializing to json")
        }
        Output::Text => {
            let data = render_text(&summary).context("serializing summary")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

fn render_text(summary: &Summary) -> Result<String> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => "-".to_string(),
            _ => v.to_string()
        };
        let width = usize::try_from(num).unwrap_or_default().max(v.len());
        format!("{v:>width$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("summary", TEXT_TEMPLATE)
        .context("parsing text template")?;

    hb.render("summary", summary).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
==========================================================================
Bytes:    {{ bytes }}
Dominant: {{ #if dominant }}{{ dominant }}{{ else }}none{{ /if }}
--------------------------------------------------------------------------
Format      Good      Bad  Ensembles    Stale        First         Last
--------------------------------------------------------------------------
{{ #each formats }}{{ lpad 6 @key }}  {{ lpad 8 good_frames }} {{ lpad 8 bad_frames }} {{ lpad 10 ensembles }} {{ lpad 8 stale_clears }} {{ lpad 12 first_ensemble }} {{ lpad 12 last_ensemble }}
{{/each }}
";
