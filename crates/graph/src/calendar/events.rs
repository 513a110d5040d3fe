//! Calendar event creation and deletion

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use urlencoding::encode;

use crate::error::truncate;
use crate::http::{GraphClient, GraphStatus};

use super::types::{AttendeeType, CalendarEvent, CreateEventRequest};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventPayload {
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<ItemBody>,
    start: WireDateTime,
    end: WireDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attendees: Vec<WireAttendee>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody {
    content_type: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDateTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireAttendee {
    #[serde(rename = "type")]
    kind: AttendeeType,
    email_address: WireEmail,
}

#[derive(Debug, Serialize)]
struct WireEmail {
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

fn build_payload(request: &CreateEventRequest) -> EventPayload {
    EventPayload {
        subject: request.subject.clone(),
        body: request.body_html.as_ref().map(|content| ItemBody {
            content_type: "HTML",
            content: content.clone(),
        }),
        start: WireDateTime {
            date_time: request.start.iso8601(),
            time_zone: request.time_zone.clone(),
        },
        end: WireDateTime {
            date_time: request.end.iso8601(),
            time_zone: request.time_zone.clone(),
        },
        location: request.location.as_ref().map(|name| Location {
            display_name: name.clone(),
        }),
        attendees: request
            .attendees
            .iter()
            .map(|attendee| WireAttendee {
                kind: attendee.kind,
                email_address: WireEmail {
                    address: attendee.address.clone(),
                    name: attendee.name.clone(),
                },
            })
            .collect(),
    }
}

fn events_path(user_id: &str) -> String {
    format!("/users/{}/events", encode(user_id))
}

fn event_path(user_id: &str, event_id: &str) -> String {
    format!("/users/{}/events/{}", encode(user_id), encode(event_id))
}

/// Creates and deletes calendar events on behalf of tracked users.
pub struct EventService {
    client: Arc<GraphClient>,
}

impl EventService {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }

    /// Creates a calendar event in the user's default calendar. Failures
    /// are logged and reported as `None`.
    pub async fn create_event(&self, request: &CreateEventRequest) -> Option<CalendarEvent> {
        let payload = build_payload(request);
        let response = self
            .client
            .post(&events_path(&request.user_id), &payload, &[])
            .await;

        if !matches!(response.status, GraphStatus::Code(200 | 201)) {
            warn!(
                user = %request.user_id,
                status = ?response.status,
                body = %truncate(&response.body, 400),
                "event creation failed"
            );
            return None;
        }
        match response.json::<CalendarEvent>() {
            Some(event) => {
                info!(user = %request.user_id, event = %event.id, "calendar event created");
                Some(event)
            }
            None => {
                warn!(user = %request.user_id, "event creation returned an unparseable body");
                None
            }
        }
    }

    /// Deletes an event from the user's calendar. Graph answers deletions
    /// with 204, or 200/202 on some tenants; anything else is a failure.
    pub async fn delete_event(&self, user_id: &str, event_id: &str) -> bool {
        let response = self.client.delete(&event_path(user_id, event_id), &[]).await;
        match response.status {
            GraphStatus::Code(200 | 202 | 204) => {
                info!(user = %user_id, event = %event_id, "calendar event deleted");
                true
            }
            _ => {
                warn!(
                    user = %user_id,
                    event = %event_id,
                    status = ?response.status,
                    body = %truncate(&response.body, 400),
                    "event deletion failed"
                );
                false
            }
        }
    }
}
