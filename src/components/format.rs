//! Timestamp formatting for the views.
//!
//! The platform returns ISO-8601 strings; anything unparseable is shown
//! as-is rather than failing the page.

use chrono::{DateTime, Utc};

/// Relative age for comments: 今天 / N 天前 / N 个月前 / N 年前.
#[must_use]
pub fn relative_time(created_at: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(raw) = created_at else {
        return "未知时间".to_string();
    };
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else {
        return raw.to_string();
    };

    let days = (now - parsed.with_timezone(&Utc)).num_days();
    if days < 1 {
        return "今天".to_string();
    }
    if days < 30 {
        return format!("{days} 天前");
    }
    let months = days / 30;
    if months < 12 {
        return format!("{months} 个月前");
    }
    format!("{} 年前", months / 12)
}

/// Absolute timestamp for link rows: `2024/01/02 03:04`.
#[must_use]
pub fn date_time(created_at: Option<&str>) -> String {
    let Some(raw) = created_at else {
        return "未知日期".to_string();
    };
    DateTime::parse_from_rfc3339(raw).map_or_else(
        |_| raw.to_string(),
        |parsed| parsed.format("%Y/%m/%d %H:%M").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_time_buckets() {
        assert_eq!(
            relative_time(Some("2024-06-15T09:00:00+00:00"), now()),
            "今天"
        );
        assert_eq!(
            relative_time(Some("2024-06-10T09:00:00+00:00"), now()),
            "5 天前"
        );
        assert_eq!(
            relative_time(Some("2024-03-10T09:00:00+00:00"), now()),
            "3 个月前"
        );
        assert_eq!(
            relative_time(Some("2021-06-15T09:00:00+00:00"), now()),
            "3 年前"
        );
    }

    #[test]
    fn test_relative_time_fallbacks() {
        assert_eq!(relative_time(None, now()), "未知时间");
        assert_eq!(relative_time(Some("not a date"), now()), "not a date");
    }

    #[test]
    fn test_date_time_formats() {
        assert_eq!(
            date_time(Some("2024-01-02T03:04:05+00:00")),
            "2024/01/02 03:04"
        );
        assert_eq!(date_time(None), "未知日期");
    }
}
