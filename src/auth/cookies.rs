//! Netscape cookie file parser and reqwest jar loader.
//!
//! Parses the Netscape HTTP cookie file format (7 TAB-separated fields per
//! line) and loads the records into a `reqwest::cookie::Jar`. Malformed
//! records and records close to expiry are hard errors rather than
//! warnings: a crawl that silently runs logged-out skips every
//! restricted submission without any sign of trouble, which is worse than
//! not running at all.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::cookie::Jar;
use tracing::{debug, info, warn};

/// Minimum remaining cookie lifetime. One week is a reasonable maximum time
/// the crawler might run unattended before anyone can refresh the file.
const MIN_COOKIE_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Number of TAB-separated fields in a Netscape cookies.txt record:
/// domain, tailmatch flag, path, secure flag, expiry epoch, name, value.
const COOKIE_FIELD_COUNT: usize = 7;

/// A single parsed cookie record.
///
/// The value is redacted in Debug output so session tokens never leak into
/// logs.
#[derive(Clone)]
pub struct CookieRecord {
    /// Domain the cookie belongs to; a leading dot means subdomains match.
    pub domain: String,
    /// URL path scope.
    pub path: String,
    /// Whether the cookie is only sent over HTTPS.
    pub secure: bool,
    /// Unix timestamp of expiry.
    pub expires: u64,
    /// Cookie name.
    pub name: String,
    /// Cookie value (sensitive).
    value: String,
}

impl CookieRecord {
    /// Returns the cookie value. Avoid logging it.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for CookieRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieRecord")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Errors raised while loading a cookie file.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// I/O error reading the cookie file.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// A record does not have exactly 7 TAB-separated fields.
    #[error("line {line_number}: expected {COOKIE_FIELD_COUNT} TAB-separated fields, found {found}")]
    MalformedRecord {
        /// 1-based line number in the cookie file.
        line_number: usize,
        /// Number of fields actually present.
        found: usize,
    },

    /// A record's expiry field is not a non-negative integer.
    #[error("line {line_number}: invalid expiry '{value}' for cookie {name}")]
    InvalidExpiry {
        /// 1-based line number in the cookie file.
        line_number: usize,
        /// Cookie name from the offending record.
        name: String,
        /// The unparseable expiry field.
        value: String,
    },

    /// A record expires (or has expired) within the minimum lifetime.
    #[error(
        "cookie {name} is expiring; update the cookie file before crawling \
         (running logged-out silently misses restricted submissions)"
    )]
    ExpiringSoon {
        /// Name of the cookie that is about to expire.
        name: String,
    },
}

/// Parses a Netscape-format cookie file.
///
/// `#`-comment and blank lines are skipped; CRLF endings are tolerated.
/// `now` anchors the one-week expiry horizon so the check is testable.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure, and the first
/// [`CookieError::MalformedRecord`], [`CookieError::InvalidExpiry`] or
/// [`CookieError::ExpiringSoon`] encountered. A session cookie (expiry 0)
/// counts as expiring.
pub fn parse_cookie_file(
    reader: impl BufRead,
    now: SystemTime,
) -> Result<Vec<CookieRecord>, CookieError> {
    let mut records = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line_result?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record = parse_record(line, line_number)?;
        check_expiry(&record, now)?;
        debug!(domain = %record.domain, name = %record.name, "parsed cookie");
        records.push(record);
    }

    Ok(records)
}

/// Reads, parses and jar-loads a cookie file in one step.
///
/// # Errors
///
/// Returns any [`CookieError`] from opening or parsing the file.
pub fn load_cookie_file(path: &Path) -> Result<Arc<Jar>, CookieError> {
    let file = File::open(path)?;
    let records = parse_cookie_file(BufReader::new(file), SystemTime::now())?;
    info!(file = %path.display(), count = records.len(), "loaded cookies from file");
    Ok(load_into_jar(&records))
}

fn parse_record(line: &str, line_number: usize) -> Result<CookieRecord, CookieError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != COOKIE_FIELD_COUNT {
        return Err(CookieError::MalformedRecord {
            line_number,
            found: fields.len(),
        });
    }

    let domain = fields[0].to_string();
    // fields[1] is the tailmatch flag; the leading dot on the domain already
    // encodes the same information, so the flag is ignored.
    let path = fields[2].to_string();
    let secure = fields[3].eq_ignore_ascii_case("TRUE");
    let name = fields[5].to_string();
    let value = fields[6].to_string();

    let expires = fields[4]
        .parse::<u64>()
        .map_err(|_| CookieError::InvalidExpiry {
            line_number,
            name: name.clone(),
            value: fields[4].to_string(),
        })?;

    Ok(CookieRecord {
        domain,
        path,
        secure,
        expires,
        name,
        value,
    })
}

/// Rejects cookies that expire within [`MIN_COOKIE_LIFETIME`] of `now`.
fn check_expiry(record: &CookieRecord, now: SystemTime) -> Result<(), CookieError> {
    let expires_at = UNIX_EPOCH + Duration::from_secs(record.expires);
    let horizon = now + MIN_COOKIE_LIFETIME;
    if expires_at < horizon {
        return Err(CookieError::ExpiringSoon {
            name: record.name.clone(),
        });
    }
    Ok(())
}

/// Loads parsed records into a `reqwest::cookie::Jar`.
///
/// Each record becomes a synthesized `Set-Cookie` string added against an
/// origin URL derived from its domain. Dot-prefixed domains get an explicit
/// `Domain` attribute (subdomain matching); bare domains become host-only
/// cookies.
#[must_use]
pub fn load_into_jar(records: &[CookieRecord]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());

    for record in records {
        let set_cookie = build_set_cookie_string(record);
        let origin = build_origin_url(record);

        if let Ok(url) = origin.parse::<url::Url>() {
            jar.add_cookie_str(&set_cookie, &url);
            debug!(domain = %record.domain, name = %record.name, "loaded cookie into jar");
        } else {
            warn!(
                domain = %record.domain,
                name = %record.name,
                "skipping cookie with unparseable domain"
            );
        }
    }

    jar
}

fn build_set_cookie_string(record: &CookieRecord) -> String {
    let mut parts = vec![format!("{}={}", record.name, record.value())];

    if record.domain.starts_with('.') {
        parts.push(format!("Domain={}", record.domain));
    }
    parts.push(format!("Path={}", record.path));
    if record.secure {
        parts.push("Secure".to_string());
    }
    if let Some(expires) = unix_to_http_date(record.expires) {
        parts.push(format!("Expires={expires}"));
    }

    parts.join("; ")
}

fn build_origin_url(record: &CookieRecord) -> String {
    let scheme = if record.secure { "https" } else { "http" };
    let host = record.domain.strip_prefix('.').unwrap_or(&record.domain);
    format!("{scheme}://{host}{}", record.path)
}

/// Converts a Unix timestamp to an HTTP-date string (RFC 7231).
fn unix_to_http_date(timestamp: u64) -> Option<String> {
    let time = UNIX_EPOCH.checked_add(Duration::from_secs(timestamp))?;
    Some(httpdate::fmt_http_date(time))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::fetch::{DelayPolicy, Fetcher, HttpClient, RetryPolicy};
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    /// Fixed "now" for expiry tests: 2023-11-14T22:13:20Z.
    const NOW_EPOCH: u64 = 1_700_000_000;
    const ONE_DAY: u64 = 24 * 60 * 60;

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(NOW_EPOCH)
    }

    fn cursor(s: &str) -> Cursor<&[u8]> {
        Cursor::new(s.as_bytes())
    }

    fn record_line(domain: &str, expires: u64, name: &str, value: &str) -> String {
        format!("{domain}\tTRUE\t/\tFALSE\t{expires}\t{name}\t{value}")
    }

    #[test]
    fn test_parse_valid_file() {
        let far_future = NOW_EPOCH + 400 * ONE_DAY;
        let input = format!(
            "# Netscape HTTP Cookie File\n\n{}\n{}\n",
            record_line(".example.com", far_future, "session", "abc123"),
            format!(".example.com\tTRUE\t/sub\tTRUE\t{far_future}\ttoken\txyz")
        );
        let records = parse_cookie_file(cursor(&input), now()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].domain, ".example.com");
        assert_eq!(records[0].path, "/");
        assert!(!records[0].secure);
        assert_eq!(records[0].expires, far_future);
        assert_eq!(records[0].name, "session");
        assert_eq!(records[0].value(), "abc123");

        assert!(records[1].secure);
        assert_eq!(records[1].path, "/sub");
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let far_future = NOW_EPOCH + 400 * ONE_DAY;
        let input = format!(
            "# header\n\n# another comment\n{}\n\n",
            record_line(".example.com", far_future, "a", "b")
        );
        let records = parse_cookie_file(cursor(&input), now()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_tolerates_crlf() {
        let far_future = NOW_EPOCH + 400 * ONE_DAY;
        let input = format!("{}\r\n", record_line(".example.com", far_future, "a", "b"));
        let records = parse_cookie_file(cursor(&input), now()).unwrap();
        assert_eq!(records[0].value(), "b");
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        let result = parse_cookie_file(cursor("just three\tlittle\tfields\n"), now());
        match result {
            Err(CookieError::MalformedRecord {
                line_number: 1,
                found: 3,
            }) => {}
            other => panic!("expected MalformedRecord, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_non_numeric_expiry() {
        let input = ".example.com\tTRUE\t/\tFALSE\tsoon\tsession\tvalue\n";
        let result = parse_cookie_file(cursor(input), now());
        match result {
            Err(CookieError::InvalidExpiry { name, value, .. }) => {
                assert_eq!(name, "session");
                assert_eq!(value, "soon");
            }
            other => panic!("expected InvalidExpiry, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_cookie_expiring_within_a_week() {
        let six_days = NOW_EPOCH + 6 * ONE_DAY;
        let input = record_line(".example.com", six_days, "session_id", "abc");
        let result = parse_cookie_file(cursor(&input), now());
        match result {
            Err(CookieError::ExpiringSoon { name }) => {
                assert_eq!(name, "session_id", "error must name the cookie");
            }
            other => panic!("expected ExpiringSoon, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_session_cookie_with_zero_expiry() {
        let input = record_line(".example.com", 0, "transient", "x");
        assert!(matches!(
            parse_cookie_file(cursor(&input), now()),
            Err(CookieError::ExpiringSoon { .. })
        ));
    }

    #[test]
    fn test_parse_accepts_cookie_just_past_the_horizon() {
        let eight_days = NOW_EPOCH + 8 * ONE_DAY;
        let input = record_line(".example.com", eight_days, "session", "abc");
        let records = parse_cookie_file(cursor(&input), now()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_expiring_error_message_names_cookie() {
        let err = CookieError::ExpiringSoon {
            name: "login_token".to_string(),
        };
        assert!(err.to_string().contains("login_token"));
    }

    #[test]
    fn test_debug_redacts_value() {
        let record = parse_record(
            &record_line(".example.com", NOW_EPOCH, "session", "super_secret"),
            1,
        )
        .unwrap();
        let debug = format!("{record:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super_secret"));
    }

    #[test]
    fn test_build_set_cookie_string_dot_domain() {
        let record = parse_record(
            &record_line(".example.com", NOW_EPOCH, "session", "abc"),
            1,
        )
        .unwrap();
        let s = build_set_cookie_string(&record);
        assert!(s.contains("session=abc"));
        assert!(s.contains("Domain=.example.com"));
        assert!(s.contains("Expires="));
    }

    #[test]
    fn test_build_set_cookie_string_bare_domain_is_host_only() {
        let record = parse_record(
            &format!("127.0.0.1\tFALSE\t/\tFALSE\t{NOW_EPOCH}\tsession\tabc"),
            1,
        )
        .unwrap();
        let s = build_set_cookie_string(&record);
        assert!(!s.contains("Domain="), "host-only cookie: {s}");
    }

    #[test]
    fn test_build_origin_url() {
        let record = parse_record(
            &format!(".secure.com\tTRUE\t/api\tTRUE\t{NOW_EPOCH}\tn\tv"),
            1,
        )
        .unwrap();
        assert_eq!(build_origin_url(&record), "https://secure.com/api");
    }

    /// Matches requests carrying the session cookie.
    struct SessionCookieMatcher;

    impl Match for SessionCookieMatcher {
        fn matches(&self, request: &Request) -> bool {
            request
                .headers
                .get("Cookie")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|cookies| cookies.contains("session=abc123"))
        }
    }

    #[tokio::test]
    async fn test_accepted_cookie_is_sent_for_matching_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/restricted"))
            .and(SessionCookieMatcher)
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"members only"))
            .expect(1)
            .mount(&server)
            .await;

        // Far-future record for the mock server's host (host-only cookie).
        let host_port = server.uri().trim_start_matches("http://").to_string();
        let host = host_port.split(':').next().unwrap().to_string();
        let far_future = NOW_EPOCH + 400 * ONE_DAY;
        let input = format!("{host}\tFALSE\t/\tFALSE\t{far_future}\tsession\tabc123\n");
        let records = parse_cookie_file(cursor(&input), now()).unwrap();
        let jar = load_into_jar(&records);

        let client = HttpClient::with_policies(
            Some(jar),
            RetryPolicy::new(1, Duration::ZERO),
            DelayPolicy::none(),
        );
        let body = client
            .get(&format!("{}/restricted", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"members only");
    }
}
