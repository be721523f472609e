//! Telemetry log record parser.
//!
//! The sampler writes a CSV file with a header row:
//!
//! ```text
//! timestamp,device_id,utilization_pct,memory_used,memory_total,temperature,power_draw,process_label
//! 2024/05/01 12:00:00.123,0,87,40960,81920,71,312.5,train.py
//! ```
//!
//! Older sampler versions use `gpu_id`, `utilization_gpu` and `process_info`
//! for three of the columns; both spellings are accepted. Rows are decoded
//! independently and a bad row is skipped, never fatal: a half-written last
//! line from a killed sampler must not hide the history before it.

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::sample::{DeviceId, Sample};

/// Accepted timestamp layouts, with and without sub-second precision.
pub const TIMESTAMP_FORMATS: [&str; 2] = ["%Y/%m/%d %H:%M:%S%.f", "%Y/%m/%d %H:%M:%S"];

/// Why a single record was dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("record has {found} fields, expected at least {expected}")]
    FieldCount { expected: usize, found: usize },

    #[error("header is missing column `{0}`")]
    MissingColumn(&'static str),

    #[error("invalid number in `{field}`: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("`{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("malformed record: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Column positions for one log file, resolved from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSchema {
    timestamp: usize,
    device_id: usize,
    utilization: usize,
    memory_used: usize,
    memory_total: usize,
    temperature: usize,
    power_draw: usize,
    process_label: Option<usize>,
}

/// Canonical column order, used when a log has no header row.
impl Default for LogSchema {
    fn default() -> Self {
        Self {
            timestamp: 0,
            device_id: 1,
            utilization: 2,
            memory_used: 3,
            memory_total: 4,
            temperature: 5,
            power_draw: 6,
            process_label: Some(7),
        }
    }
}

impl LogSchema {
    /// True when the record looks like a header row rather than data.
    pub fn is_header(record: &StringRecord) -> bool {
        record.iter().any(|f| f.eq_ignore_ascii_case("timestamp"))
    }

    /// Resolve column positions from a header row.
    pub fn from_header(header: &StringRecord) -> Result<Self, ParseError> {
        Ok(Self {
            timestamp: require_column(header, &["timestamp"])?,
            device_id: require_column(header, &["device_id", "gpu_id"])?,
            utilization: require_column(header, &["utilization_pct", "utilization_gpu"])?,
            memory_used: require_column(header, &["memory_used"])?,
            memory_total: require_column(header, &["memory_total"])?,
            temperature: require_column(header, &["temperature"])?,
            power_draw: require_column(header, &["power_draw"])?,
            process_label: find_column(header, &["process_label", "process_info"]),
        })
    }

    /// Number of fields a data record needs to be decodable.
    fn min_fields(&self) -> usize {
        [
            self.timestamp,
            self.device_id,
            self.utilization,
            self.memory_used,
            self.memory_total,
            self.temperature,
            self.power_draw,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

fn find_column(header: &StringRecord, names: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

/// `names[0]` is the canonical spelling reported when the column is absent.
fn require_column(header: &StringRecord, names: &[&'static str]) -> Result<usize, ParseError> {
    find_column(header, names).ok_or(ParseError::MissingColumn(names[0]))
}

// ---------------------------------------------------------------------------
// Record decoding
// ---------------------------------------------------------------------------

/// Parse a timestamp in either accepted layout.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ParseError> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| ParseError::InvalidTimestamp(raw.to_string()))
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidNumber {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Decode one data record into a [`Sample`].
pub fn parse_record(record: &StringRecord, schema: &LogSchema) -> Result<Sample, ParseError> {
    let expected = schema.min_fields();
    if record.len() < expected {
        return Err(ParseError::FieldCount {
            expected,
            found: record.len(),
        });
    }
    // Indices below min_fields are present after the length check.
    let get = |idx: usize| record.get(idx).unwrap_or("");

    let timestamp = parse_timestamp(get(schema.timestamp))?;
    let device_raw = get(schema.device_id);
    let device_id = device_raw
        .parse::<DeviceId>()
        .map_err(|_| ParseError::InvalidNumber {
            field: "device_id",
            value: device_raw.to_string(),
        })?;

    let utilization_pct = parse_number("utilization_pct", get(schema.utilization))?;
    if utilization_pct < 0.0 {
        return Err(ParseError::OutOfRange {
            field: "utilization_pct",
            value: utilization_pct,
        });
    }

    let power_raw = get(schema.power_draw);
    let power_draw = if power_raw.is_empty() {
        0.0
    } else {
        parse_number("power_draw", power_raw)?
    };

    Ok(Sample {
        timestamp,
        device_id,
        utilization_pct,
        memory_used: parse_number("memory_used", get(schema.memory_used))?,
        memory_total: parse_number("memory_total", get(schema.memory_total))?,
        temperature: parse_number("temperature", get(schema.temperature))?,
        power_draw,
        process_label: schema
            .process_label
            .and_then(|idx| record.get(idx))
            .unwrap_or("")
            .to_string(),
    })
}

// ---------------------------------------------------------------------------
// Chunk parsing
// ---------------------------------------------------------------------------

/// Result of decoding a run of bytes from the log.
#[derive(Debug, Clone, Default)]
pub struct ParsedChunk {
    pub samples: Vec<Sample>,
    /// Bytes of the input that were fully processed. A trailing line without
    /// its newline is not consumed unless the caller asked for it.
    pub consumed: usize,
    /// Records dropped as malformed.
    pub skipped: usize,
    pub last_error: Option<ParseError>,
    /// Schema in effect after this chunk; `None` until a full first line has
    /// been seen.
    pub schema: Option<LogSchema>,
}

/// Decode complete records from `bytes`.
///
/// `schema` is `None` when `bytes` starts at the beginning of the file; the
/// first record is then checked for a header. With `include_partial` the
/// trailing unterminated line is decoded too, which is only safe when the
/// file is known to be complete.
pub fn parse_chunk(bytes: &[u8], schema: Option<LogSchema>, include_partial: bool) -> ParsedChunk {
    let consumed = if include_partial {
        bytes.len()
    } else {
        bytes
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1)
    };

    let mut chunk = ParsedChunk {
        consumed,
        schema,
        ..Default::default()
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(&bytes[..consumed]);

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                chunk.skipped += 1;
                chunk.last_error = Some(ParseError::Malformed(e.to_string()));
                continue;
            }
        };

        let schema = match chunk.schema {
            Some(s) => s,
            None if LogSchema::is_header(&record) => {
                chunk.schema = Some(LogSchema::from_header(&record).unwrap_or_else(|e| {
                    log::warn!("unusable log header ({e}), assuming canonical column order");
                    chunk.last_error = Some(e);
                    LogSchema::default()
                }));
                continue;
            }
            None => *chunk.schema.insert(LogSchema::default()),
        };

        match parse_record(&record, &schema) {
            Ok(sample) => chunk.samples.push(sample),
            Err(e) => {
                chunk.skipped += 1;
                chunk.last_error = Some(e);
            }
        }
    }

    chunk
}
