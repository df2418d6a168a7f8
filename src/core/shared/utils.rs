use chrono::{DateTime, NaiveDate, Utc};

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// `M/D/YYYY`, or "No date" when absent.
pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.format("%-m/%-d/%Y").to_string(),
        None => "No date".to_string(),
    }
}

/// Value attribute of an `<input type="date">`.
pub fn date_input_value(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%-m/%-d/%Y, %-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<b>"Bob's" & co</b>"#),
            "&lt;b&gt;&quot;Bob&#39;s&quot; &amp; co&lt;/b&gt;"
        );
    }

    #[test]
    fn test_date_formatting() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4);
        assert_eq!(format_date(date), "3/4/2025");
        assert_eq!(format_date(None), "No date");
        assert_eq!(date_input_value(date), "2025-03-04");
        assert_eq!(date_input_value(None), "");

        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 15, 7, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "3/4/2025, 3:07 PM");
    }
}
