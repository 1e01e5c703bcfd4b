/// Inline SQL migrations for the TSF observation store.
///
/// We use simple inline migrations rather than sqlx migration files
/// because the schema is small and self-contained. Dates are stored as
/// `YYYY-MM-DD` text so lexical order equals calendar order.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: raw observations
    r#"
CREATE TABLE IF NOT EXISTS air_quality_raw (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date_local TEXT NOT NULL,
    parameter_name TEXT NOT NULL,
    arithmetic_mean REAL NOT NULL,
    local_site_name TEXT,
    state_name TEXT NOT NULL,
    county_name TEXT,
    city_name TEXT,
    cbsa_name TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
"#,
    // Migration 2: query indexes
    r#"
CREATE INDEX IF NOT EXISTS idx_aq_param_state_date
    ON air_quality_raw(parameter_name, state_name, date_local);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_aq_date ON air_quality_raw(date_local);
"#,
    // Migration 3: natural key. NULLs are folded so a missing county still
    // collides with another missing county.
    r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_aq_natural_key ON air_quality_raw(
    date_local,
    parameter_name,
    state_name,
    COALESCE(county_name, ''),
    COALESCE(city_name, ''),
    COALESCE(local_site_name, '')
);
"#,
    // Migration 4: forecast registry
    r#"
CREATE TABLE IF NOT EXISTS forecast_registry (
    forecast_id INTEGER PRIMARY KEY AUTOINCREMENT,
    forecast_name TEXT NOT NULL,
    target_value TEXT NOT NULL,
    state_name TEXT,
    result_path TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_forecast_registry_name ON forecast_registry(forecast_name);
"#,
];
