//! Calendar integration
//!
//! Creates and deletes events in users' Microsoft 365 calendars from a
//! typed request model. Date-times are passed through with their zone;
//! recurrence and timezone arithmetic stay with the host.

pub mod events;
pub mod types;

pub use events::EventService;
pub use types::{Attendee, AttendeeType, CalendarEvent, CreateEventRequest, EventMoment};
