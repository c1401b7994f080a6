//! Temporal expression parsing
//!
//! Relative expressions resolve against a [`Clock`] so tests can pin "now". Every window is
//! half-open: `start` inclusive, `end` exclusive.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Whether `[from, to)` intersects this window; `to = None` is open-ended
    pub fn overlaps(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> bool {
        from < self.end && to.is_none_or(|to| to > self.start)
    }
}

/// What the query wants to know about entity state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum TemporalIntent {
    /// The row that is true now
    Current,
    /// The row whose validity contains `at`
    PointInTime { at: DateTime<Utc> },
    /// Every row, ordered by `valid_from`
    History,
    /// Anything that happened inside the parsed window
    Window,
}

/// Result of parsing a query for temporal expressions
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TemporalContext {
    pub window: Option<TimeWindow>,
    pub intent: Option<TemporalIntent>,
    /// The text that produced the window or intent
    pub expression: Option<String>,
}

impl TemporalContext {
    pub fn is_empty(&self) -> bool {
        self.window.is_none() && self.intent.is_none()
    }
}

lazy_static! {
    static ref LAST_NIGHT: Regex = Regex::new(r"(?i)\blast\s+night\b").unwrap();
    static ref YESTERDAY: Regex = Regex::new(r"(?i)\byesterday\b").unwrap();
    static ref TODAY: Regex = Regex::new(r"(?i)\b(?:today|tonight)\b").unwrap();
    static ref PAST_N: Regex =
        Regex::new(r"(?i)\b(?:past|last)\s+(\d{1,4})\s+(hour|day|week|month)s?\b").unwrap();
    static ref N_AGO: Regex =
        Regex::new(r"(?i)\b(\d{1,4})\s+(hour|day|week|month)s?\s+ago\b").unwrap();
    static ref LAST_PERIOD: Regex =
        Regex::new(r"(?i)\blast\s+(week|month|quarter|year|sprint)\b").unwrap();
    static ref THIS_PERIOD: Regex =
        Regex::new(r"(?i)\bthis\s+(week|month|quarter|year|sprint)\b").unwrap();
    static ref RECENTLY: Regex = Regex::new(r"(?i)\b(?:recently|lately)\b").unwrap();
    static ref SINCE_DATE: Regex = Regex::new(r"(?i)\bsince\s+(\d{4}-\d{2}-\d{2})\b").unwrap();
    static ref AS_OF_DATE: Regex = Regex::new(r"(?i)\bas\s+of\s+(\d{4}-\d{2}-\d{2})\b").unwrap();
    static ref ISO_DATE: Regex = Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap();
    static ref CURRENT: Regex = Regex::new(r"(?i)\b(?:current(?:ly)?|right\s+now)\b").unwrap();
    static ref HISTORY: Regex =
        Regex::new(r"(?i)\b(?:history|over\s+time|timeline|evolution)\b").unwrap();
    static ref ALL_MARKERS: Vec<&'static Regex> = vec![
        &*LAST_NIGHT,
        &*YESTERDAY,
        &*TODAY,
        &*PAST_N,
        &*N_AGO,
        &*LAST_PERIOD,
        &*THIS_PERIOD,
        &*RECENTLY,
        &*SINCE_DATE,
        &*AS_OF_DATE,
        &*ISO_DATE,
        &*CURRENT,
        &*HISTORY,
    ];
}

/// Whether the text contains any temporal marker
pub fn has_temporal_marker(text: &str) -> bool {
    ALL_MARKERS.iter().any(|re| re.is_match(text))
}

/// The text with every temporal marker blanked out
pub fn strip_temporal_markers(text: &str) -> String {
    ALL_MARKERS
        .iter()
        .fold(text.to_string(), |acc, re| re.replace_all(&acc, " ").into_owned())
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn unit_duration(unit: &str, n: i64) -> Duration {
    match unit.to_lowercase().as_str() {
        "hour" => Duration::hours(n),
        "week" => Duration::weeks(n),
        "month" => Duration::days(30 * n),
        _ => Duration::days(n),
    }
}

fn period_length(period: &str) -> Duration {
    match period.to_lowercase().as_str() {
        "week" => Duration::days(7),
        "month" => Duration::days(30),
        "quarter" => Duration::days(90),
        "year" => Duration::days(365),
        _ => Duration::days(14),
    }
}

/// Start of the calendar period containing `now`; sprints have no calendar anchor
fn period_start(period: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let anchored = match period.to_lowercase().as_str() {
        "week" => Some(today - Duration::days(i64::from(today.weekday().num_days_from_monday()))),
        "month" => NaiveDate::from_ymd_opt(today.year(), today.month(), 1),
        "quarter" => NaiveDate::from_ymd_opt(today.year(), (today.month0() / 3) * 3 + 1, 1),
        "year" => NaiveDate::from_ymd_opt(today.year(), 1, 1),
        _ => None,
    };
    anchored
        .map(start_of_day)
        .unwrap_or_else(|| now - period_length(period))
}

/// First window-producing expression in the text, with the matched text
fn parse_window(text: &str, now: DateTime<Utc>) -> Option<(TimeWindow, String)> {
    let today = start_of_day(now.date_naive());

    if let Some(m) = LAST_NIGHT.find(text) {
        let start = today - Duration::hours(6);
        let end = today + Duration::hours(6);
        return Some((TimeWindow::new(start, end), m.as_str().to_string()));
    }
    if let Some(m) = YESTERDAY.find(text) {
        let window = TimeWindow::new(today - Duration::days(1), today);
        return Some((window, m.as_str().to_string()));
    }
    if let Some(m) = TODAY.find(text) {
        let window = TimeWindow::new(today, today + Duration::days(1));
        return Some((window, m.as_str().to_string()));
    }
    if let Some(caps) = PAST_N.captures(text) {
        let n: i64 = caps[1].parse().ok()?;
        let window = TimeWindow::new(now - unit_duration(&caps[2], n), now);
        return Some((window, caps[0].to_string()));
    }
    if let Some(caps) = N_AGO.captures(text) {
        let n: i64 = caps[1].parse().ok()?;
        let unit = caps[2].to_lowercase();
        // Day offsets snap to calendar days; other units stay rolling
        let anchor = if unit == "day" { today } else { now };
        let start = anchor - unit_duration(&unit, n);
        let end = start + unit_duration(&unit, 1);
        return Some((TimeWindow::new(start, end), caps[0].to_string()));
    }
    if let Some(caps) = LAST_PERIOD.captures(text) {
        let window = TimeWindow::new(now - period_length(&caps[1]), now);
        return Some((window, caps[0].to_string()));
    }
    if let Some(caps) = THIS_PERIOD.captures(text) {
        let window = TimeWindow::new(period_start(&caps[1], now), now);
        return Some((window, caps[0].to_string()));
    }
    if let Some(m) = RECENTLY.find(text) {
        let window = TimeWindow::new(now - Duration::days(7), now);
        return Some((window, m.as_str().to_string()));
    }
    if let Some(caps) = SINCE_DATE.captures(text)
        && let Some(date) = parse_date(&caps[1])
    {
        let start = start_of_day(date);
        if start < now {
            return Some((TimeWindow::new(start, now), caps[0].to_string()));
        }
    }
    if !AS_OF_DATE.is_match(text)
        && let Some(caps) = ISO_DATE.captures(text)
        && let Some(date) = parse_date(&caps[1])
    {
        let start = start_of_day(date);
        let window = TimeWindow::new(start, start + Duration::days(1));
        return Some((window, caps[0].to_string()));
    }
    None
}

/// Parse the temporal expressions in `text` relative to `now`
pub fn parse(text: &str, now: DateTime<Utc>) -> TemporalContext {
    let window = parse_window(text, now);

    let point_in_time = AS_OF_DATE.captures(text).and_then(|caps| {
        let date = parse_date(&caps[1])?;
        let end_of_day = start_of_day(date) + Duration::days(1) - Duration::seconds(1);
        Some((end_of_day.min(now), caps[0].to_string()))
    });

    let (intent, intent_expression) = if let Some(m) = HISTORY.find(text) {
        (Some(TemporalIntent::History), Some(m.as_str().to_string()))
    } else if let Some((at, expression)) = point_in_time {
        (Some(TemporalIntent::PointInTime { at }), Some(expression))
    } else if let Some(m) = CURRENT.find(text) {
        (Some(TemporalIntent::Current), Some(m.as_str().to_string()))
    } else if window.is_some() {
        (Some(TemporalIntent::Window), None)
    } else {
        (None, None)
    };

    let (window, window_expression) = match window {
        Some((window, expression)) => (Some(window), Some(expression)),
        None => (None, None),
    };

    TemporalContext {
        window,
        intent,
        expression: window_expression.or(intent_expression),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        // Wednesday
        Utc.with_ymd_and_hms(2026, 3, 11, 15, 30, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_yesterday_is_previous_calendar_day() {
        let ctx = parse("yesterday incidents", now());
        let window = ctx.window.unwrap();
        assert_eq!(window.start, day(2026, 3, 10));
        assert_eq!(window.end, day(2026, 3, 11));
        assert_eq!(ctx.intent, Some(TemporalIntent::Window));
        assert_eq!(ctx.expression.as_deref(), Some("yesterday"));
    }

    #[test]
    fn test_window_is_half_open() {
        let window = parse("yesterday", now()).window.unwrap();
        assert!(window.contains(day(2026, 3, 10)));
        assert!(!window.contains(day(2026, 3, 11)));
    }

    #[test]
    fn test_last_night() {
        let window = parse("what broke last night", now()).window.unwrap();
        assert_eq!(window.start, day(2026, 3, 10) + Duration::hours(18));
        assert_eq!(window.end, day(2026, 3, 11) + Duration::hours(6));
    }

    #[test]
    fn test_rolling_windows() {
        let window = parse("deploys last week", now()).window.unwrap();
        assert_eq!(window.end, now());
        assert_eq!(window.start, now() - Duration::days(7));

        let window = parse("errors in the past 3 hours", now()).window.unwrap();
        assert_eq!(window.start, now() - Duration::hours(3));
    }

    #[test]
    fn test_days_ago_snaps_to_calendar_day() {
        let window = parse("2 days ago", now()).window.unwrap();
        assert_eq!(window.start, day(2026, 3, 9));
        assert_eq!(window.end, day(2026, 3, 10));
    }

    #[test]
    fn test_this_week_starts_monday() {
        let window = parse("changes this week", now()).window.unwrap();
        assert_eq!(window.start, day(2026, 3, 9));
        assert_eq!(window.end, now());
    }

    #[test]
    fn test_explicit_date_and_since() {
        let window = parse("incidents on 2026-02-14", now()).window.unwrap();
        assert_eq!(window.start, day(2026, 2, 14));
        assert_eq!(window.end, day(2026, 2, 15));

        let window = parse("since 2026-03-01", now()).window.unwrap();
        assert_eq!(window.start, day(2026, 3, 1));
        assert_eq!(window.end, now());
    }

    #[test]
    fn test_intents() {
        assert_eq!(
            parse("current status of checkout", now()).intent,
            Some(TemporalIntent::Current)
        );
        assert_eq!(
            parse("history of the billing service", now()).intent,
            Some(TemporalIntent::History)
        );
        let ctx = parse("owner of payments as of 2026-01-05", now());
        assert_eq!(
            ctx.intent,
            Some(TemporalIntent::PointInTime {
                at: day(2026, 1, 6) - Duration::seconds(1)
            })
        );
        assert!(ctx.window.is_none());
        assert!(parse("auth gateway design", now()).is_empty());
    }

    #[test]
    fn test_markers_and_stripping() {
        assert!(has_temporal_marker("What happened LAST WEEK"));
        assert!(!has_temporal_marker("who owns billing"));
        assert_eq!(
            strip_temporal_markers("yesterday incidents").trim(),
            "incidents"
        );
    }
}
