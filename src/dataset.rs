use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::cell::CellRule;

pub const DEFAULT_TIMESTAMP_COLUMN: &str = "Timestamp";
pub const DEFAULT_RETENTION_DAYS: i64 = 7;
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewOptions {
    pub sanitize_cells: bool,
    pub filter_stale_rows: bool,
    pub retention_days: i64,
    pub timestamp_column: String,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            sanitize_cells: true,
            filter_stale_rows: true,
            retention_days: DEFAULT_RETENTION_DAYS,
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
        }
    }
}

/// One data row, keyed by header name in header order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(fields: Vec<(String, String)>) -> Self { Self { fields } }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields { map.serialize_entry(k, v)?; }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Column {
    pub name: String,
    pub rule: CellRule,
}

impl Column {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), rule: CellRule::for_column(name) }
    }
}

/// Newest-first records of a single load.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

/// Header row plus records. Short rows are padded with "", surplus fields dropped.
pub fn parse_csv(text: &str) -> (Vec<String>, Vec<Record>) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = match rdr.headers() {
        Ok(h) => unique_headers(h.iter().map(String::from).collect()),
        Err(e) => { log::warn!("Unreadable CSV header: {}", e); return (vec![], vec![]); }
    };
    if headers.iter().all(|h| h.is_empty()) { return (vec![], vec![]); }
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (i, result) in rdr.records().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => { log::debug!("Skipping undecodable CSV record {}: {}", i + 1, e); skipped += 1; continue; }
        };
        if row.iter().all(|f| f.is_empty()) { continue; }
        if row.len() != headers.len() { log::trace!("Record {} has {} fields, header has {}", i + 1, row.len(), headers.len()); }
        let fields = headers.iter().enumerate()
            .map(|(idx, h)| (h.clone(), row.get(idx).unwrap_or("").to_string()))
            .collect();
        records.push(Record::new(fields));
    }
    if skipped > 0 { log::warn!("Skipped {} undecodable CSV records", skipped); }
    (headers, records)
}

/// Repeated header names get a " (2)", " (3)", ... suffix so every field stays addressable.
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for h in &raw {
        if !out.contains(h) { out.push(h.clone()); continue; }
        let mut n = 2;
        let mut candidate = format!("{} ({})", h, n);
        while out.contains(&candidate) || raw.contains(&candidate) {
            n += 1;
            candidate = format!("{} ({})", h, n);
        }
        log::warn!("Duplicate CSV header {:?} renamed to {:?}", h, candidate);
        out.push(candidate);
    }
    out
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() { return None; }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) { return Some(dt.with_timezone(&Utc)); }
    const DATETIME_FORMATS: [&str; 8] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for f in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, f) { return local_to_utc(naive); }
    }
    for f in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) { return local_to_utc(d.and_hms_opt(0, 0, 0)?); }
    }
    None
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local.from_local_datetime(&naive).earliest().map(|dt| dt.with_timezone(&Utc))
}

/// Keeps records stamped strictly after `now - retention_days`. Unparsable stamps count as stale.
pub fn filter_stale(records: Vec<Record>, timestamp_column: &str, now: DateTime<Utc>, retention_days: i64) -> Vec<Record> {
    let cutoff = Duration::try_days(retention_days).and_then(|d| now.checked_sub_signed(d));
    if cutoff.is_none() { log::warn!("Retention window of {} days is out of range; keeping every dated record", retention_days); }
    let before = records.len();
    let kept: Vec<Record> = records.into_iter()
        .filter(|r| match r.get(timestamp_column).and_then(parse_timestamp) {
            Some(t) => cutoff.is_none_or(|c| t > c),
            None => { log::trace!("Dropping record with unusable {}: {:?}", timestamp_column, r.get(timestamp_column)); false }
        })
        .collect();
    log::info!("Recency filter kept {} of {} records ({} day window)", kept.len(), before, retention_days);
    kept
}

pub fn derive_columns(sample: Option<&Record>, timestamp_column: &str) -> Vec<Column> {
    match sample {
        Some(r) => r.keys().filter(|k| *k != timestamp_column).map(Column::new).collect(),
        None => vec![],
    }
}

/// Parse, reverse to newest-first, derive columns, then apply the optional recency filter.
pub fn build(text: &str, opts: &ViewOptions, now: DateTime<Utc>) -> (Dataset, Vec<Column>) {
    let (headers, mut records) = parse_csv(text);
    records.reverse();
    let columns = derive_columns(records.first(), &opts.timestamp_column);
    if opts.filter_stale_rows {
        records = filter_stale(records, &opts.timestamp_column, now, opts.retention_days);
    }
    (Dataset { headers, records }, columns)
}
