use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::core::error::{Result, TallymanError};

/// The two recognized metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time measurement, last write wins
    Gauge,
    /// Running sum of every delta merged for the key
    Counter,
}

impl MetricKind {
    /// Textual form used on the wire, in snapshots and in the `type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }

    /// Name of the payload field that carries this kind's value.
    pub fn value_field(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "value",
            MetricKind::Counter => "delta",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = TallymanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(TallymanError::UnknownKind(other.to_string())),
        }
    }
}

/// A metric's value. For counters this is always an absolute total once it reaches storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Counter(i64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }
}

/// Identifies one logical time series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    pub kind: MetricKind,
    pub id: String,
}

impl StorageKey {
    pub fn new<S: Into<String>>(kind: MetricKind, id: S) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A validated metric.
///
/// Serializes through [`MetricPayload`], so the JSON form is
/// `{"id": .., "type": "gauge"|"counter", "delta"?: .., "value"?: ..}` and
/// deserialization applies the same validation as [`MetricPayload::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MetricPayload", try_from = "MetricPayload")]
pub struct Metric {
    pub id: String,
    pub value: MetricValue,
}

impl Metric {
    pub fn gauge<S: Into<String>>(id: S, value: f64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Gauge(value),
        }
    }

    pub fn counter<S: Into<String>>(id: S, delta: i64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Counter(delta),
        }
    }

    /// Builds a metric from its textual `kind/id/value` form.
    pub fn parse(kind: &str, id: &str, raw: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(TallymanError::EmptyId);
        }
        let kind: MetricKind = kind.parse()?;
        let invalid = || TallymanError::InvalidValue {
            kind,
            raw: raw.to_string(),
        };
        let value = match kind {
            MetricKind::Gauge => MetricValue::Gauge(raw.trim().parse().map_err(|_| invalid())?),
            MetricKind::Counter => MetricValue::Counter(raw.trim().parse().map_err(|_| invalid())?),
        };
        Ok(Self {
            id: id.to_string(),
            value,
        })
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    pub fn key(&self) -> StorageKey {
        StorageKey::new(self.kind(), self.id.clone())
    }

    /// Counter total, `None` for gauges.
    pub fn delta(&self) -> Option<i64> {
        match self.value {
            MetricValue::Counter(delta) => Some(delta),
            MetricValue::Gauge(_) => None,
        }
    }

    /// Gauge reading, `None` for counters.
    pub fn gauge_value(&self) -> Option<f64> {
        match self.value {
            MetricValue::Gauge(value) => Some(value),
            MetricValue::Counter(_) => None,
        }
    }

    /// Human-readable value: counters as integers, gauges in shortest round-trip form.
    pub fn display_value(&self) -> String {
        match self.value {
            MetricValue::Gauge(value) => value.to_string(),
            MetricValue::Counter(delta) => delta.to_string(),
        }
    }
}

/// Untyped metric as decoded from a request body or a snapshot document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricPayload {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl MetricPayload {
    /// Checks the payload without building a [`Metric`].
    ///
    /// An empty id is reported before anything else, then an unknown kind,
    /// then a missing kind-specific field.
    pub fn validate(&self) -> Result<()> {
        self.to_value().map(|_| ())
    }

    fn to_value(&self) -> Result<MetricValue> {
        if self.id.is_empty() {
            return Err(TallymanError::EmptyId);
        }
        let kind: MetricKind = self.kind.parse()?;
        match kind {
            MetricKind::Gauge => self
                .value
                .map(MetricValue::Gauge)
                .ok_or(TallymanError::MissingValue { kind }),
            MetricKind::Counter => self
                .delta
                .map(MetricValue::Counter)
                .ok_or(TallymanError::MissingValue { kind }),
        }
    }
}

impl TryFrom<MetricPayload> for Metric {
    type Error = TallymanError;

    fn try_from(payload: MetricPayload) -> Result<Self> {
        let value = payload.to_value()?;
        Ok(Metric {
            id: payload.id,
            value,
        })
    }
}

impl From<Metric> for MetricPayload {
    fn from(metric: Metric) -> Self {
        let kind = metric.kind().as_str().to_string();
        let (delta, value) = match metric.value {
            MetricValue::Gauge(value) => (None, Some(value)),
            MetricValue::Counter(delta) => (Some(delta), None),
        };
        MetricPayload {
            id: metric.id,
            kind,
            delta,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(kind: &str, id: &str) -> MetricPayload {
        MetricPayload {
            id: id.to_string(),
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_unknown_kind() {
        let err = payload("unknown", "a").validate().unwrap_err();
        assert!(matches!(err, TallymanError::UnknownKind(ref k) if k == "unknown"));
    }

    #[test]
    fn test_empty_id_takes_precedence() {
        assert!(matches!(payload("counter", "").validate(), Err(TallymanError::EmptyId)));
        assert!(matches!(payload("unknown", "").validate(), Err(TallymanError::EmptyId)));
    }

    #[test]
    fn test_validate_missing_value() {
        let err = payload("gauge", "Alloc").validate().unwrap_err();
        assert!(matches!(err, TallymanError::MissingValue { kind: MetricKind::Gauge }));

        // a counter carrying only a gauge value is still missing its delta
        let mut p = payload("counter", "PollCount");
        p.value = Some(1.0);
        assert!(matches!(
            p.validate(),
            Err(TallymanError::MissingValue { kind: MetricKind::Counter })
        ));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&Metric::counter("PollCount", 5)).unwrap();
        assert_eq!(json, r#"{"id":"PollCount","type":"counter","delta":5}"#);

        let json = serde_json::to_string(&Metric::gauge("Alloc", 1.5)).unwrap();
        assert_eq!(json, r#"{"id":"Alloc","type":"gauge","value":1.5}"#);

        let metric: Metric =
            serde_json::from_str(r#"{"id":"Alloc","type":"gauge","value":2.25}"#).unwrap();
        assert_eq!(metric, Metric::gauge("Alloc", 2.25));

        assert!(serde_json::from_str::<Metric>(r#"{"id":"x","type":"summary","value":1}"#).is_err());
    }

    #[test]
    fn test_parse_textual_form() {
        assert_eq!(Metric::parse("counter", "hits", "42").unwrap(), Metric::counter("hits", 42));
        assert_eq!(Metric::parse("gauge", "load", "0.5").unwrap(), Metric::gauge("load", 0.5));
        assert!(matches!(
            Metric::parse("counter", "hits", "4.2"),
            Err(TallymanError::InvalidValue { kind: MetricKind::Counter, .. })
        ));
        assert!(matches!(Metric::parse("timer", "t", "1"), Err(TallymanError::UnknownKind(_))));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(Metric::gauge("a", 3.0).display_value(), "3");
        assert_eq!(Metric::gauge("a", 0.001).display_value(), "0.001");
        assert_eq!(Metric::counter("c", -7).display_value(), "-7");
    }
}
