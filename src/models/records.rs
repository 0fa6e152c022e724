use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ip_addresses::default_true;

/// WorkNote records problems, issues or work done, optionally on a computer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkNote {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computer_id: Option<i64>,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkNoteRequest {
    #[serde(default)]
    pub computer_id: Option<i64>,
    pub value: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// Licence is a licence key or note, optionally on a computer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Licence {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computer_id: Option<i64>,
    pub value: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLicenceRequest {
    #[serde(default)]
    pub computer_id: Option<i64>,
    pub value: String,
}

/// ClientIdentifier is a keyed client ID that always belongs to a computer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdentifier {
    pub id: i64,
    pub computer_id: i64,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

/// How a status value is read back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusDataType {
    Raw,
    DateTime,
    DiskUsage,
    Int,
    Float,
    Memory,
    Percentage,
}

impl StatusDataType {
    pub fn as_code(&self) -> &'static str {
        match self {
            StatusDataType::Raw => "r",
            StatusDataType::DateTime => "dt",
            StatusDataType::DiskUsage => "du",
            StatusDataType::Int => "i",
            StatusDataType::Float => "f",
            StatusDataType::Memory => "m",
            StatusDataType::Percentage => "p",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "r" => Some(StatusDataType::Raw),
            "dt" => Some(StatusDataType::DateTime),
            "du" => Some(StatusDataType::DiskUsage),
            "i" => Some(StatusDataType::Int),
            "f" => Some(StatusDataType::Float),
            "m" => Some(StatusDataType::Memory),
            "p" => Some(StatusDataType::Percentage),
            _ => None,
        }
    }

    /// Cast a stored value; anything that does not parse comes back raw
    pub fn format(&self, value: &str) -> StatusValue {
        let trimmed = value.trim();
        let parsed = match self {
            StatusDataType::Int | StatusDataType::Memory => trimmed.parse().ok().map(StatusValue::Int),
            StatusDataType::Float | StatusDataType::Percentage => trimmed.parse().ok().map(StatusValue::Float),
            StatusDataType::DateTime => parse_datetime(trimmed).map(StatusValue::DateTime),
            StatusDataType::DiskUsage => value.split_once('\t').and_then(|(label, amount)| {
                amount.trim().parse().ok().map(|amount| StatusValue::DiskUsage {
                    label: label.to_string(),
                    amount,
                })
            }),
            StatusDataType::Raw => None,
        };
        parsed.unwrap_or_else(|| StatusValue::Raw(value.to_string()))
    }
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// A status value cast by its key's data type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusValue {
    Int(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    DiskUsage { label: String, amount: f64 },
    Raw(String),
}

/// StatusKey names a kind of status a computer reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusKey {
    pub id: i64,
    pub slug: String,
    pub verbose_name: String,
    /// Set when the values change frequently
    pub volatile: bool,
    pub data_type: StatusDataType,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStatusKeyRequest {
    pub slug: String,
    pub verbose_name: String,
    #[serde(default)]
    pub volatile: bool,
    #[serde(default = "default_data_type")]
    pub data_type: StatusDataType,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_data_type() -> StatusDataType {
    StatusDataType::Raw
}

/// Status is one value reported by a computer for a key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: i64,
    pub computer_id: i64,
    pub key: String,
    pub data_type: StatusDataType,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

impl Status {
    pub fn display(&self) -> StatusValue {
        self.data_type.format(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_data_type_codes() {
        for code in ["r", "dt", "du", "i", "f", "m", "p"] {
            let data_type = StatusDataType::from_code(code).unwrap();
            assert_eq!(data_type.as_code(), code);
        }
        assert_eq!(StatusDataType::from_code("x"), None);
    }

    #[test]
    fn test_status_value_format() {
        assert_eq!(StatusDataType::Int.format("42"), StatusValue::Int(42));
        assert_eq!(StatusDataType::Memory.format(" 8192 "), StatusValue::Int(8192));
        assert_eq!(StatusDataType::Percentage.format("97.5"), StatusValue::Float(97.5));
        assert_eq!(StatusDataType::Float.format("0.25"), StatusValue::Float(0.25));
        assert_eq!(
            StatusDataType::DiskUsage.format("/home\t81.5"),
            StatusValue::DiskUsage {
                label: "/home".to_string(),
                amount: 81.5
            }
        );
        match StatusDataType::DateTime.format("2024-03-01 12:30:00") {
            StatusValue::DateTime(dt) => assert_eq!(dt.to_rfc3339(), "2024-03-01T12:30:00+00:00"),
            other => panic!("unexpected value: {:?}", other),
        }
        assert!(matches!(
            StatusDataType::DateTime.format("2024-03-01T12:30:00+02:00"),
            StatusValue::DateTime(_)
        ));

        // unparseable values come back unchanged
        assert_eq!(StatusDataType::Int.format("lots"), StatusValue::Raw("lots".to_string()));
        assert_eq!(StatusDataType::DiskUsage.format("/home"), StatusValue::Raw("/home".to_string()));
        assert_eq!(StatusDataType::Raw.format("12"), StatusValue::Raw("12".to_string()));
    }

    #[test]
    fn test_status_value_serializes_untagged() {
        let du = StatusValue::DiskUsage {
            label: "/".to_string(),
            amount: 50.0,
        };
        assert_eq!(serde_json::to_string(&du).unwrap(), r#"{"label":"/","amount":50.0}"#);
        assert_eq!(serde_json::to_string(&StatusValue::Int(3)).unwrap(), "3");
    }
}
