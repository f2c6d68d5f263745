//! Natural-language date resolution.

use chrono::{DateTime, Local, TimeZone};
use ego_proxy_core::parse_natural_datetime;

use crate::error::{ClientError, ClientResult};

/// Print the datetime `text` refers to, relative to the current local time.
pub fn parse_date(text: &str) -> ClientResult<()> {
    println!("{}", resolve(text, &Local::now())?);
    Ok(())
}

/// Resolves `text` against `now`, rendered as RFC 3339 followed by a
/// readable form.
pub fn resolve<Tz: TimeZone>(text: &str, now: &DateTime<Tz>) -> ClientResult<String>
where
    Tz::Offset: std::fmt::Display,
{
    let resolved = parse_natural_datetime(text, now)
        .ok_or_else(|| ClientError::Input(format!("could not understand date: {}", text)))?;
    Ok(format!(
        "{}  ({})",
        resolved.to_rfc3339(),
        resolved.format("%A %B %-d %Y, %H:%M")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn resolves_relative_dates() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 30, 0).unwrap();
        insta::assert_snapshot!(
            resolve("next friday at 3pm", &now).unwrap(),
            @"2025-03-21T15:00:00+00:00  (Friday March 21 2025, 15:00)"
        );
    }

    #[test]
    fn keeps_offset_of_now() {
        let paris = FixedOffset::east_opt(3600).unwrap();
        let now = paris.with_ymd_and_hms(2025, 3, 14, 10, 30, 0).unwrap();
        assert!(resolve("tomorrow at 9am", &now)
            .unwrap()
            .starts_with("2025-03-15T09:00:00+01:00"));
    }

    #[test]
    fn unknown_text_is_input_error() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 30, 0).unwrap();
        let err = resolve("whenever", &now).unwrap_err();
        assert_eq!(err.to_string(), "could not understand date: whenever");
    }
}
