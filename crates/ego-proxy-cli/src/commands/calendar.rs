//! Google Calendar commands.

use chrono::{DateTime, Local, TimeZone, Utc};
use ego_proxy_core::{CalendarEvent, IntentDetector, NewEvent, TimeWindow, has_calendar_intent};
use ego_proxy_providers::{CalendarInfo, CalendarProvider, EventQuery};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Create an event from a natural-language request.
pub async fn add(config: &ClientConfig, message: &str, dry_run: bool) -> ClientResult<()> {
    let detector = detector(config)?;
    let mut event = build_event(&detector, message, &Local::now()).await?;
    if let Some(tz) = super::local_time_zone() {
        event = event.with_time_zone(tz);
    }

    if dry_run {
        println!("Would create:");
        println!("{}", describe_new_event(&event));
        return Ok(());
    }

    let provider = super::google_provider(config, None)?;
    let created = provider.create_event(event).await?;
    info!("created event {}", created.id);

    println!("Created:");
    println!("{}", format_event(&created, &Local));
    if let Some(link) = &created.html_link {
        println!("  {}", link);
    }
    Ok(())
}

fn detector(config: &ClientConfig) -> ClientResult<IntentDetector> {
    let detector = match super::text_generator(config)? {
        Some(generator) => IntentDetector::with_generator(generator),
        None => IntentDetector::heuristic(),
    };
    Ok(detector.with_default_duration_hours(config.assistant.default_duration_hours))
}

/// Resolves `message` into the event it asks for.
pub async fn build_event<Tz: TimeZone>(
    detector: &IntentDetector,
    message: &str,
    now: &DateTime<Tz>,
) -> ClientResult<NewEvent> {
    if !has_calendar_intent(message) {
        return Err(ClientError::Intent(
            "the message does not ask for a calendar entry (try \"add meeting tomorrow at 3pm\")"
                .to_string(),
        ));
    }

    let intent = detector.detect(message, now).await.ok_or_else(|| {
        ClientError::Intent("could not work out the event title or time".to_string())
    })?;
    debug!(?intent, "resolved calendar intent");
    Ok(NewEvent::from(&intent))
}

/// Multi-line preview of an event that has not been created yet.
pub fn describe_new_event(event: &NewEvent) -> String {
    let mut out = format!(
        "  {}\n  start: {}\n  end:   {}",
        event.summary,
        event.start.to_rfc3339(),
        event.end.to_rfc3339()
    );
    if let Some(tz) = &event.time_zone {
        out.push_str(&format!("\n  zone:  {}", tz));
    }
    if let Some(description) = &event.description {
        out.push_str(&format!("\n  notes: {}", description));
    }
    out
}

/// List upcoming events.
pub async fn upcoming(config: &ClientConfig, days: u32, limit: Option<usize>) -> ClientResult<()> {
    let provider = super::google_provider(config, None)?;

    let mut query = EventQuery::new().with_time_window(TimeWindow::days_ahead(Utc::now(), days));
    if let Some(limit) = limit {
        query = query.with_max_results(limit);
    }

    let events = provider.list_events(query).await?;
    if events.is_empty() {
        println!("No events in the next {} day(s).", days);
        return Ok(());
    }

    for event in &events {
        println!("{}", format_event(event, &Local));
    }
    Ok(())
}

/// One line per event: start, duration, title and id.
pub fn format_event<Tz: TimeZone>(event: &CalendarEvent, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let start = event.start.display_in(tz);
    if event.is_all_day() {
        return format!("{}  {}  [{}]", start, event.summary, event.id);
    }
    format!(
        "{}  {:>5}  {}  [{}]",
        start,
        format_duration(event.duration_minutes()),
        event.summary,
        event.id
    )
}

fn format_duration(minutes: i64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h{:02}", h, m),
    }
}

/// List the calendars of the authenticated account.
pub async fn calendars(config: &ClientConfig) -> ClientResult<()> {
    let provider = super::google_provider(config, None)?;
    let calendars = provider.list_calendars().await?;

    if calendars.is_empty() {
        println!("No calendars found.");
        return Ok(());
    }

    for calendar in &calendars {
        println!("{}", format_calendar(calendar));
    }
    Ok(())
}

fn format_calendar(calendar: &CalendarInfo) -> String {
    let marker = if calendar.is_primary { "*" } else { " " };
    let role = calendar.access_role.as_deref().unwrap_or("unknown");
    format!("{} {}  ({}, {})", marker, calendar.name, calendar.id, role)
}

/// Delete an event by id.
pub async fn delete(config: &ClientConfig, event_id: &str) -> ClientResult<()> {
    let provider = super::google_provider(config, None)?;
    provider.delete_event(event_id).await?;
    println!("Deleted event {}.", event_id);
    Ok(())
}
