//! Trading-session classification and adaptive refresh intervals
//!
//! Session windows for the Shanghai/Shenzhen exchanges, derived from local
//! time-of-day and day-of-week only. Exchange holidays are not modelled;
//! a holiday simply behaves like a quiet trading day.

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Weekday};
use lazy_static::lazy_static;
use std::time::Duration;

lazy_static! {
    static ref PRE_MARKET_OPEN: NaiveTime = NaiveTime::from_hms_opt(9, 15, 0).unwrap();
    static ref MORNING_OPEN: NaiveTime = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    static ref MORNING_CLOSE: NaiveTime = NaiveTime::from_hms_opt(11, 30, 0).unwrap();
    static ref AFTERNOON_OPEN: NaiveTime = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
    static ref AFTERNOON_CLOSE: NaiveTime = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
}

/// Floor applied to the continuous-trading interval.
const TRADING_INTERVAL_FLOOR: Duration = Duration::from_secs(2);
/// Fixed interval during the pre-market call auction window.
const PRE_MARKET_INTERVAL: Duration = Duration::from_secs(30);
/// Fixed interval over the lunch break.
const LUNCH_BREAK_INTERVAL: Duration = Duration::from_secs(60);
/// Minimum interval while the market is closed.
const CLOSED_INTERVAL_FLOOR: Duration = Duration::from_secs(300);

/// Saturday and Sunday are never trading days.
pub fn is_trading_weekday(now: NaiveDateTime) -> bool {
    !matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Inside a continuous-trading window (morning or afternoon session).
pub fn is_trading_time_at(now: NaiveDateTime) -> bool {
    if !is_trading_weekday(now) {
        return false;
    }
    let t = now.time();
    (t >= *MORNING_OPEN && t < *MORNING_CLOSE) || (t >= *AFTERNOON_OPEN && t < *AFTERNOON_CLOSE)
}

/// Inside the pre-market call auction window (09:15-09:30).
pub fn is_pre_market_time_at(now: NaiveDateTime) -> bool {
    if !is_trading_weekday(now) {
        return false;
    }
    let t = now.time();
    t >= *PRE_MARKET_OPEN && t < *MORNING_OPEN
}

/// Inside the lunch break (11:30-13:00).
pub fn is_lunch_break_at(now: NaiveDateTime) -> bool {
    if !is_trading_weekday(now) {
        return false;
    }
    let t = now.time();
    t >= *MORNING_CLOSE && t < *AFTERNOON_OPEN
}

/// Scale a caller-supplied base interval for the session `now` falls in.
///
/// Monotone across sessions for any base: trading <= pre-market <= lunch
/// break <= closed.
pub fn compute_refresh_interval_at(base: Duration, now: NaiveDateTime) -> Duration {
    if is_trading_time_at(now) {
        return base.max(TRADING_INTERVAL_FLOOR);
    }
    if is_pre_market_time_at(now) {
        return base.max(PRE_MARKET_INTERVAL);
    }
    if is_lunch_break_at(now) {
        return base.max(LUNCH_BREAK_INTERVAL);
    }
    // Closed: no point polling at trading cadence.
    (base * 10).max(CLOSED_INTERVAL_FLOOR)
}

/// `is_trading_time_at` against the local wall clock.
pub fn is_trading_time() -> bool {
    is_trading_time_at(Local::now().naive_local())
}

/// `is_pre_market_time_at` against the local wall clock.
pub fn is_pre_market_time() -> bool {
    is_pre_market_time_at(Local::now().naive_local())
}

/// `compute_refresh_interval_at` against the local wall clock.
pub fn compute_refresh_interval(base: Duration) -> Duration {
    compute_refresh_interval_at(base, Local::now().naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2024-01-10 is a Wednesday.
    fn at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn saturday_at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 13)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    #[test]
    fn test_trading_time_windows() {
        assert!(is_trading_time_at(at(9, 30)));
        assert!(is_trading_time_at(at(10, 45)));
        assert!(is_trading_time_at(at(13, 0)));
        assert!(is_trading_time_at(at(14, 59)));

        assert!(!is_trading_time_at(at(9, 29)));
        assert!(!is_trading_time_at(at(11, 30)));
        assert!(!is_trading_time_at(at(12, 15)));
        assert!(!is_trading_time_at(at(15, 0)));
        assert!(!is_trading_time_at(at(20, 0)));
    }

    #[test]
    fn test_pre_market_window() {
        assert!(is_pre_market_time_at(at(9, 15)));
        assert!(is_pre_market_time_at(at(9, 29)));
        assert!(!is_pre_market_time_at(at(9, 14)));
        assert!(!is_pre_market_time_at(at(9, 30)));
    }

    #[test]
    fn test_weekend_is_never_a_session() {
        assert!(!is_trading_time_at(saturday_at(10, 0)));
        assert!(!is_pre_market_time_at(saturday_at(9, 20)));
        assert!(!is_lunch_break_at(saturday_at(12, 0)));
    }

    #[test]
    fn test_interval_during_trading_is_at_most_base() {
        let base = Duration::from_secs(15);
        assert!(compute_refresh_interval_at(base, at(10, 0)) <= base);
    }

    #[test]
    fn test_interval_ordering_across_sessions() {
        let base = Duration::from_secs(15);
        let trading = compute_refresh_interval_at(base, at(10, 0));
        let pre_market = compute_refresh_interval_at(base, at(9, 20));
        let lunch = compute_refresh_interval_at(base, at(12, 0));
        let closed = compute_refresh_interval_at(base, at(22, 0));

        assert!(trading <= pre_market);
        assert!(pre_market <= lunch);
        assert!(lunch < closed);
    }

    #[test]
    fn test_interval_ordering_holds_for_large_base() {
        let base = Duration::from_secs(120);
        let trading = compute_refresh_interval_at(base, at(10, 0));
        let pre_market = compute_refresh_interval_at(base, at(9, 20));
        let closed = compute_refresh_interval_at(base, at(3, 0));

        assert!(trading <= pre_market);
        assert!(pre_market <= closed);
    }

    #[test]
    fn test_tiny_base_is_clamped() {
        let base = Duration::from_secs(0);
        assert_eq!(compute_refresh_interval_at(base, at(10, 0)), Duration::from_secs(2));
    }

    #[test]
    fn test_closed_interval_has_floor() {
        let base = Duration::from_secs(5);
        let closed = compute_refresh_interval_at(base, at(22, 0));
        assert_eq!(closed, Duration::from_secs(300));
    }
}
