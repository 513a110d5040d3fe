//! Typed calendar event model

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attendee participation type, serialized in Graph's lowercase form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeType {
    #[default]
    Required,
    Optional,
    Resource,
}

/// A meeting attendee. `kind` defaults to required participation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub address: String,
    pub name: Option<String>,
    pub kind: AttendeeType,
}

impl Attendee {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            kind: AttendeeType::Required,
        }
    }
}

/// A point in time for an event boundary.
///
/// Graph expects wall-clock date-times with the zone carried separately,
/// so chrono values are formatted without an offset and raw strings pass
/// through untouched for hosts that already format their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMoment {
    Utc(DateTime<Utc>),
    Local(NaiveDateTime),
    Text(String),
}

impl EventMoment {
    /// Formats the moment as the `dateTime` field value.
    #[must_use]
    pub fn iso8601(&self) -> String {
        match self {
            Self::Utc(moment) => moment.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Self::Local(moment) => moment.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Self::Text(raw) => raw.clone(),
        }
    }
}

impl From<DateTime<Utc>> for EventMoment {
    fn from(moment: DateTime<Utc>) -> Self {
        Self::Utc(moment)
    }
}

impl From<NaiveDateTime> for EventMoment {
    fn from(moment: NaiveDateTime) -> Self {
        Self::Local(moment)
    }
}

impl From<String> for EventMoment {
    fn from(raw: String) -> Self {
        Self::Text(raw)
    }
}

impl From<&str> for EventMoment {
    fn from(raw: &str) -> Self {
        Self::Text(raw.to_string())
    }
}

/// Everything needed to create a calendar event for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEventRequest {
    pub user_id: String,
    pub subject: String,
    pub start: EventMoment,
    pub end: EventMoment,
    pub time_zone: String,
    pub body_html: Option<String>,
    pub location: Option<String>,
    pub attendees: Vec<Attendee>,
}

impl CreateEventRequest {
    /// Builds a minimal request in the UTC zone. Optional fields are set
    /// directly on the returned value.
    pub fn new(
        user_id: impl Into<String>,
        subject: impl Into<String>,
        start: impl Into<EventMoment>,
        end: impl Into<EventMoment>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            subject: subject.into(),
            start: start.into(),
            end: end.into(),
            time_zone: "UTC".to_string(),
            body_html: None,
            location: None,
            attendees: Vec::new(),
        }
    }
}

/// The slice of a created event the integration reports back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub web_link: Option<String>,
}
