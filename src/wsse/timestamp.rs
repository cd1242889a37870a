use chrono::{DateTime, Duration, Utc};

/// Lifetime of the security header before it expires.
pub const DEFAULT_TTL_SECONDS: i64 = 10 * 60;

/// UTC timestamp format expected by WS-Utility consumers.
const SOAP_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The `Created`/`Expires` pair stamped into the security header.
///
/// A fresh window is computed for every envelope processed; it is never
/// cached across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityWindow {
    pub created: String,
    pub expires: String,
}

impl ValidityWindow {
    /// Window opening now and closing `ttl` later.
    pub fn generate(ttl: Duration) -> Self {
        Self::at(Utc::now(), ttl)
    }

    fn at(created: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            created: format_soap_date(created),
            expires: format_soap_date(created + ttl),
        }
    }
}

fn format_soap_date(date: DateTime<Utc>) -> String {
    date.format(SOAP_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn parse(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, SOAP_DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_expires_is_created_plus_ttl() {
        let window = ValidityWindow::generate(Duration::seconds(600));
        let delta = parse(&window.expires) - parse(&window.created);
        assert_eq!(delta, Duration::seconds(600));
    }

    #[test]
    fn test_soap_date_shape() {
        let window = ValidityWindow::generate(Duration::seconds(DEFAULT_TTL_SECONDS));
        let re = regex::Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$").unwrap();
        assert!(re.is_match(&window.created));
        assert!(re.is_match(&window.expires));
    }

    #[test]
    fn test_known_instant_formatting() {
        let created = DateTime::parse_from_rfc3339("2024-05-01T12:30:45Z")
            .unwrap()
            .with_timezone(&Utc);
        let window = ValidityWindow::at(created, Duration::seconds(600));
        assert_eq!(window.created, "2024-05-01T12:30:45Z");
        assert_eq!(window.expires, "2024-05-01T12:40:45Z");
    }
}
