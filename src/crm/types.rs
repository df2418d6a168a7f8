use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LeadStatus {
    #[default]
    New,
    InProgress,
    Connected,
    Nurture,
    ClosedWon,
    ClosedLost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 6] = [
        LeadStatus::New,
        LeadStatus::InProgress,
        LeadStatus::Connected,
        LeadStatus::Nurture,
        LeadStatus::ClosedWon,
        LeadStatus::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::InProgress => "In Progress",
            Self::Connected => "Connected",
            Self::Nurture => "Nurture",
            Self::ClosedWon => "Closed Won",
            Self::ClosedLost => "Closed Lost",
        }
    }

    /// CSS class of the status pill.
    pub fn pill_class(&self) -> &'static str {
        match self {
            Self::New => "pill-new",
            Self::InProgress => "pill-in-progress",
            Self::Connected => "pill-connected",
            Self::Nurture => "pill-nurture",
            Self::ClosedWon => "pill-closed-won",
            Self::ClosedLost => "pill-closed-lost",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown lead status: {s}"))
    }
}

impl Serialize for LeadStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The backend column is free text, so anything outside the six stages
/// (including the empty default) reads as `New`.
impl<'de> Deserialize<'de> for LeadStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(Self::New);
        }
        Ok(raw.parse().unwrap_or_else(|e| {
            warn!("{e}; treating as New");
            Self::New
        }))
    }
}

/// Parses the date forms seen at the edges: `""` (absent), `YYYY-MM-DD`
/// from date inputs, and PocketBase's `YYYY-MM-DD HH:MM:SS.sssZ`.
pub fn parse_action_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    parse_pb_datetime(raw).map(|dt| dt.date_naive())
}

fn parse_pb_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed.trim_end_matches('Z'), "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `Option<NaiveDate>` as the backend date field: `null` when absent.
pub mod action_date {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(None);
        }
        parse_action_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
    }
}

pub fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

fn pb_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    if raw.is_empty() {
        return Ok(DateTime::<Utc>::default());
    }
    parse_pb_datetime(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub owner: String,
    pub company: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub contact_name: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub trade: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub status: LeadStatus,
    #[serde(default, with = "action_date")]
    pub next_action: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub last_outcome: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "pb_timestamp")]
    pub created: DateTime<Utc>,
    #[serde(default, deserialize_with = "pb_timestamp")]
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLog {
    pub id: String,
    pub owner: String,
    pub lead: String,
    pub outcome: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub notes: Option<String>,
    #[serde(default, with = "action_date")]
    pub next_action: Option<NaiveDate>,
    #[serde(default, deserialize_with = "pb_timestamp")]
    pub created: DateTime<Utc>,
    #[serde(default, deserialize_with = "pb_timestamp")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub expand: Option<CallLogExpand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CallLogExpand {
    #[serde(default)]
    pub lead: Option<Lead>,
}

impl CallLog {
    pub fn lead_company(&self) -> Option<&str> {
        self.expand
            .as_ref()
            .and_then(|e| e.lead.as_ref())
            .map(|lead| lead.company.as_str())
            .filter(|company| !company.is_empty())
    }
}

/// Body of a lead create. Blank optional texts are left out so the backend
/// stores its own empty default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLeadRecord {
    pub owner: String,
    pub company: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub status: LeadStatus,
    #[serde(with = "action_date")]
    pub next_action: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadStatusUpdate {
    pub status: LeadStatus,
    #[serde(with = "action_date")]
    pub next_action: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCallLogRecord {
    pub owner: String,
    pub lead: String,
    pub outcome: String,
    pub notes: Option<String>,
    #[serde(with = "action_date")]
    pub next_action: Option<NaiveDate>,
}

/// Fields copied onto the parent lead after a call is logged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadCallUpdate {
    pub last_outcome: String,
    #[serde(with = "action_date")]
    pub next_action: Option<NaiveDate>,
    pub notes: Option<String>,
}

pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
