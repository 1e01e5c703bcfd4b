// crates/core/src/ingest.rs
//! CSV ingest for raw air-quality observations.
//!
//! The uploader accepts EPA-style daily summary exports. Header names are
//! normalized before matching so `Date Local`, `date_local` and `DATE-LOCAL`
//! all resolve to the same column. Rows whose date or mean cannot be parsed
//! are skipped and counted rather than failing the whole upload.

use chrono::NaiveDate;

use crate::error::IngestError;
use crate::types::Observation;

/// Columns an upload must provide, as (normalized key, display name).
pub const REQUIRED_COLUMNS: &[(&str, &str)] = &[
    ("date_local", "Date Local"),
    ("parameter_name", "Parameter Name"),
    ("arithmetic_mean", "Arithmetic Mean"),
    ("state_name", "State Name"),
];

/// Optional columns picked up when present.
pub const OPTIONAL_COLUMNS: &[(&str, &str)] = &[
    ("local_site_name", "Local Site Name"),
    ("county_name", "County Name"),
    ("city_name", "City Name"),
    ("cbsa_name", "CBSA Name"),
];

/// Result of parsing one uploaded file.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub observations: Vec<Observation>,
    /// Rows dropped because the date, mean, parameter or state was unusable.
    pub skipped: usize,
}

/// Normalize a header cell: trim, lowercase, and collapse every run of
/// non-alphanumeric characters into a single `_`.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().trim_start_matches('\u{feff}').chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Parse a full CSV upload into observations.
pub fn parse_observations(input: &str) -> Result<IngestReport, IngestError> {
    let input = input.trim_start_matches('\u{feff}');
    let records = split_records(input)?;
    let mut iter = records.into_iter();
    let (_, header) = iter.next().ok_or(IngestError::Empty)?;

    let keys: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
    let position = |key: &str| keys.iter().position(|k| k == key);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|(key, _)| position(key).is_none())
        .map(|(_, display)| display.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns(missing));
    }

    // Both lookups are guaranteed by the check above.
    let col = |key: &str| position(key).unwrap_or(usize::MAX);
    let (date_i, param_i, mean_i, state_i) = (
        col("date_local"),
        col("parameter_name"),
        col("arithmetic_mean"),
        col("state_name"),
    );
    let (site_i, county_i, city_i, cbsa_i) = (
        position("local_site_name"),
        position("county_name"),
        position("city_name"),
        position("cbsa_name"),
    );

    let mut report = IngestReport::default();
    for (_, row) in iter {
        let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");
        let optional = |i: Option<usize>| {
            i.map(|i| cell(i))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let date = parse_date(cell(date_i));
        let mean = parse_mean(cell(mean_i));
        let parameter = cell(param_i);
        let state = cell(state_i);

        match (date, mean) {
            (Some(date_local), Some(arithmetic_mean))
                if !parameter.is_empty() && !state.is_empty() =>
            {
                report.observations.push(Observation {
                    date_local,
                    parameter_name: parameter.to_string(),
                    arithmetic_mean,
                    local_site_name: optional(site_i),
                    state_name: state.to_string(),
                    county_name: optional(county_i),
                    city_name: optional(city_i),
                    cbsa_name: optional(cbsa_i),
                });
            }
            _ => report.skipped += 1,
        }
    }

    tracing::debug!(
        rows = report.observations.len(),
        skipped = report.skipped,
        "parsed observations upload"
    );
    Ok(report)
}

/// Parse a local date in the formats seen in EPA exports.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let date_part = match raw.find(|c| c == 'T' || c == ' ') {
        Some(i) => &raw[..i],
        None => raw,
    };
    ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

fn parse_mean(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Split CSV text into records (RFC 4180 quoting), tagging each with the
/// 1-based line it starts on. Blank lines are ignored.
fn split_records(input: &str) -> Result<Vec<(usize, Vec<String>)>, IngestError> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                fields.push(std::mem::take(&mut field));
                push_record(&mut records, record_line, std::mem::take(&mut fields));
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(IngestError::Malformed {
            line: record_line,
            message: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        push_record(&mut records, record_line, fields);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<(usize, Vec<String>)>, line: usize, fields: Vec<String>) {
    let blank = fields.iter().all(|f| f.trim().is_empty());
    if !blank {
        records.push((line, fields));
    }
}
