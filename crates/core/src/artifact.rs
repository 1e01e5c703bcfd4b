// crates/core/src/artifact.rs
//! Naming and rendering of forecast CSV artifacts.

use chrono::NaiveDate;

/// Token used in file names for a geographic filter that was not supplied.
pub const PLACEHOLDER: &str = "ALL";

/// Header of the job artifact. The column set is fixed.
pub const ARTIFACT_HEADER: [&str; 4] = ["DATE", "VALUE", "SES-M", "SES-Q"];

/// Reduce a file-name component to `[A-Za-z0-9_-]`, mapping everything else
/// to `_`. Blank input renders as [`PLACEHOLDER`].
pub fn sanitize_component(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        return PLACEHOLDER.to_string();
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Components of `<TARGET>_<STATE>_<COUNTY>_<CITY>_<CBSA>_<TYPE>.csv`.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactName<'a> {
    pub target: &'a str,
    pub state: Option<&'a str>,
    pub county: Option<&'a str>,
    pub city: Option<&'a str>,
    pub cbsa: Option<&'a str>,
    pub ftype: &'a str,
}

impl ArtifactName<'_> {
    pub fn file_name(&self) -> String {
        let parts = [
            sanitize_component(Some(self.target)),
            sanitize_component(self.state),
            sanitize_component(self.county),
            sanitize_component(self.city),
            sanitize_component(self.cbsa),
            sanitize_component(Some(self.ftype)),
        ];
        format!("{}.csv", parts.join("_"))
    }
}

/// One row of the job artifact. `value` is `None` for future dates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub ses_m: Option<f64>,
    pub ses_q: Option<f64>,
}

/// Render job artifact rows as CSV text, header first.
pub fn render_artifact_csv(rows: &[ForecastRow]) -> String {
    let mut csv = String::new();
    csv.push_str(&ARTIFACT_HEADER.join(","));
    csv.push('\n');
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            row.date.format("%Y-%m-%d"),
            format_value(row.value),
            format_value(row.ses_m),
            format_value(row.ses_q),
        ));
    }
    csv
}

/// Empty string for missing values, shortest round-trip text otherwise.
pub fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Escape a CSV field per RFC 4180.
///
/// Fields containing a comma, double quote or line break are wrapped in
/// double quotes with internal quotes doubled.
pub fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_name_with_placeholders() {
        let name = ArtifactName {
            target: "NO2",
            state: Some("TX"),
            county: None,
            city: None,
            cbsa: Some("  "),
            ftype: "F",
        };
        assert_eq!(name.file_name(), "NO2_TX_ALL_ALL_ALL_F.csv");
    }

    #[test]
    fn test_file_name_sanitizes_components() {
        let name = ArtifactName {
            target: "Nitrogen dioxide (NO2)",
            state: Some("New York"),
            county: Some("../etc"),
            city: None,
            cbsa: Some("New York-Newark, NY-NJ"),
            ftype: "F",
        };
        assert_eq!(
            name.file_name(),
            "Nitrogen_dioxide__NO2__New_York____etc_ALL_New_York-Newark__NY-NJ_F.csv"
        );
    }

    #[test]
    fn test_render_artifact_csv() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let rows = vec![
            ForecastRow { date, value: None, ses_m: Some(12.5), ses_q: Some(11.0) },
            ForecastRow {
                date: date.succ_opt().unwrap(),
                value: Some(3.0),
                ses_m: None,
                ses_q: Some(0.25),
            },
        ];
        let csv = render_artifact_csv(&rows);
        assert_eq!(
            csv,
            "DATE,VALUE,SES-M,SES-Q\n2024-04-01,,12.5,11\n2024-04-02,3,,0.25\n"
        );
        for line in csv.lines() {
            assert_eq!(line.split(',').count(), 4);
        }
    }

    #[test]
    fn test_escape_csv_field() {
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("line1\nline2"), "\"line1\nline2\"");
    }
}
