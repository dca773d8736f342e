mod api;
mod events;

pub use api::{AccessTokenResponse, BackendEventsResponse, ErrorResponse, GetUpdatesResponse};
pub use events::{Event, NotificationEvent};
