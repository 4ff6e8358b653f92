use chrono::{NaiveDate, Utc};

/// Final records are partitioned by the UTC calendar day, regardless of any
/// exchange-local session boundary.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn parse_day(s: &str) -> anyhow::Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_day() {
        let d = parse_day(" 2026-01-27 ").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 27).unwrap());
        assert!(parse_day("27/01/2026").is_err());
    }
}
