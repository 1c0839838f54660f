//! Time-series points and batches in InfluxDB line protocol.

use crate::core::{Result, StatsError};
use crate::metrics::TagSet;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Timestamp precision of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Precision {
    #[default]
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl Precision {
    /// Value of the `precision` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Seconds => "s",
            Precision::Milliseconds => "ms",
            Precision::Microseconds => "u",
            Precision::Nanoseconds => "ns",
        }
    }

    fn timestamp(&self, time: &DateTime<Utc>) -> Option<i64> {
        match self {
            Precision::Seconds => Some(time.timestamp()),
            Precision::Milliseconds => Some(time.timestamp_millis()),
            Precision::Microseconds => Some(time.timestamp_micros()),
            Precision::Nanoseconds => time.timestamp_nanos_opt(),
        }
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

/// A measurement with tags, fields and a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: TagSet,
    fields: BTreeMap<String, FieldValue>,
    time: DateTime<Utc>,
}

impl Point {
    pub fn new(
        measurement: impl Into<String>,
        tags: TagSet,
        fields: BTreeMap<String, FieldValue>,
        time: DateTime<Utc>,
    ) -> Result<Self> {
        let measurement = measurement.into();
        if measurement.is_empty() {
            return Err(StatsError::point("measurement name must not be empty"));
        }
        if fields.is_empty() {
            return Err(StatsError::point(format!(
                "point '{}' has no fields",
                measurement
            )));
        }
        for (key, value) in &fields {
            if key.is_empty() {
                return Err(StatsError::point(format!(
                    "point '{}' has an empty field key",
                    measurement
                )));
            }
            if let FieldValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(StatsError::point(format!(
                        "field '{}' of point '{}' is not finite",
                        key, measurement
                    )));
                }
            }
        }

        Ok(Self {
            measurement,
            tags,
            fields,
            time,
        })
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Append this point as one line, without the trailing newline
    pub fn write_line(&self, precision: Precision, buf: &mut String) {
        escape_into(buf, &self.measurement, &[',', ' ']);
        for (key, value) in self.tags.iter() {
            // Empty tag values are rejected by the server.
            if value.is_empty() {
                continue;
            }
            buf.push(',');
            escape_into(buf, key, &[',', '=', ' ']);
            buf.push('=');
            escape_into(buf, value, &[',', '=', ' ']);
        }

        buf.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                buf.push(',');
            }
            escape_into(buf, key, &[',', '=', ' ']);
            buf.push('=');
            match value {
                FieldValue::Integer(v) => {
                    let _ = write!(buf, "{}i", v);
                },
                FieldValue::Float(v) => {
                    let _ = write!(buf, "{}", v);
                },
                FieldValue::Boolean(v) => buf.push_str(if *v { "true" } else { "false" }),
                FieldValue::String(v) => {
                    buf.push('"');
                    escape_into(buf, v, &['"', '\\']);
                    buf.push('"');
                },
            }
        }

        if let Some(ts) = precision.timestamp(&self.time) {
            let _ = write!(buf, " {}", ts);
        }
    }
}

fn escape_into(buf: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if special.contains(&c) {
            buf.push('\\');
        }
        buf.push(c);
    }
    // A trailing backslash would escape the following separator.
    if special.contains(&' ') && s.ends_with('\\') {
        buf.push('\\');
    }
}

/// Batch settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub database: String,
    pub precision: Precision,
}

/// Points written together in one request.
#[derive(Debug, Clone)]
pub struct BatchPoints {
    config: BatchConfig,
    points: Vec<Point>,
}

impl BatchPoints {
    pub fn new(config: BatchConfig) -> Result<Self> {
        if config.database.is_empty() {
            return Err(StatsError::point("batch database must not be empty"));
        }
        Ok(Self {
            config,
            points: Vec::new(),
        })
    }

    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    pub fn precision(&self) -> Precision {
        self.config.precision
    }

    /// Newline-separated line protocol body
    pub fn to_line_protocol(&self) -> String {
        let mut buf = String::with_capacity(self.points.len() * 64);
        for point in &self.points {
            point.write_line(self.config.precision, &mut buf);
            buf.push('\n');
        }
        buf
    }
}
