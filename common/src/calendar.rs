// Calendar collaborator: upcoming-event listing

use crate::errors::CalendarError;
use crate::models::CalendarEvent;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Read-only source of upcoming calendar events.
///
/// Implementations return events starting now or later, capped in count and
/// ordered by start time ascending.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn list_upcoming(&self) -> Result<Vec<CalendarEvent>, CalendarError>;
}

/// Configuration for the Google Calendar events client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarConfig {
    pub api_base: String,
    pub calendar_id: String,
    pub access_token: String,
    pub max_results: u32,
    pub request_timeout_seconds: u64,
}

/// Google Calendar v3 events client.
pub struct GoogleCalendarSource {
    client: reqwest::Client,
    config: GoogleCalendarConfig,
}

impl GoogleCalendarSource {
    pub fn new(config: GoogleCalendarConfig) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                CalendarError::RequestFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }
}

#[derive(Debug, Deserialize)]
struct EventListing {
    #[serde(default)]
    items: Vec<EventResource>,
}

#[derive(Debug, Deserialize)]
struct EventResource {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    start: Option<EventStart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventStart {
    #[serde(default)]
    date_time: Option<String>,
    /// All-day events carry `date` instead of `dateTime`.
    #[serde(default)]
    date: Option<String>,
}

impl EventResource {
    /// Convert a wire event into a schedulable one. Cancelled entries,
    /// all-day entries, and entries with unparsable start times are dropped:
    /// only timed events can fire a job.
    fn into_event(self) -> Option<CalendarEvent> {
        if self.status.as_deref() == Some("cancelled") {
            debug!(event_id = %self.id, "Skipping cancelled event");
            return None;
        }

        let raw_start = match self.start.as_ref().and_then(|s| s.date_time.as_deref()) {
            Some(raw) => raw,
            None => {
                let all_day = self.start.as_ref().and_then(|s| s.date.as_deref());
                debug!(
                    event_id = %self.id,
                    all_day_date = ?all_day,
                    "Skipping event without a concrete start time"
                );
                return None;
            }
        };

        let start_time = match DateTime::parse_from_rfc3339(raw_start) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(e) => {
                debug!(event_id = %self.id, error = %e, "Skipping event with unparsable start time");
                return None;
            }
        };

        Some(CalendarEvent {
            id: self.id,
            title: self.summary.unwrap_or_default(),
            start_time,
        })
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarSource {
    #[tracing::instrument(skip(self), fields(calendar_id = %self.config.calendar_id))]
    async fn list_upcoming(&self) -> Result<Vec<CalendarEvent>, CalendarError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.config.api_base, self.config.calendar_id
        );
        let time_min = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = self.config.max_results.to_string();

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("maxResults", max_results.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let listing: EventListing = response
            .json()
            .await
            .map_err(|e| CalendarError::DecodeFailed(e.to_string()))?;

        let events: Vec<CalendarEvent> = listing
            .items
            .into_iter()
            .filter_map(EventResource::into_event)
            .collect();

        debug!(event_count = events.len(), "Fetched upcoming events");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed_resource(id: &str, summary: &str, start: &str) -> EventResource {
        EventResource {
            id: id.to_string(),
            summary: Some(summary.to_string()),
            status: Some("confirmed".to_string()),
            start: Some(EventStart {
                date_time: Some(start.to_string()),
                date: None,
            }),
        }
    }

    #[test]
    fn test_timed_event_is_converted_to_utc() {
        let event = timed_resource("e1", "light_on", "2026-08-06T18:30:00+02:00")
            .into_event()
            .unwrap();
        assert_eq!(event.id, "e1");
        assert_eq!(event.title, "light_on");
        assert_eq!(event.start_time.to_rfc3339(), "2026-08-06T16:30:00+00:00");
    }

    #[test]
    fn test_cancelled_event_is_skipped() {
        let mut resource = timed_resource("e1", "light_on", "2026-08-06T18:30:00Z");
        resource.status = Some("cancelled".to_string());
        assert!(resource.into_event().is_none());
    }

    #[test]
    fn test_all_day_event_is_skipped() {
        let resource = EventResource {
            id: "e2".to_string(),
            summary: Some("holiday".to_string()),
            status: None,
            start: Some(EventStart {
                date_time: None,
                date: Some("2026-08-07".to_string()),
            }),
        };
        assert!(resource.into_event().is_none());
    }

    #[test]
    fn test_unparsable_start_time_is_skipped() {
        let resource = timed_resource("e3", "light_on", "tomorrow-ish");
        assert!(resource.into_event().is_none());
    }

    #[test]
    fn test_missing_summary_becomes_empty_title() {
        let mut resource = timed_resource("e4", "", "2026-08-06T18:30:00Z");
        resource.summary = None;
        let event = resource.into_event().unwrap();
        assert!(event.title.is_empty());
    }
}
