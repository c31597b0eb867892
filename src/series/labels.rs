use chrono::{Duration, NaiveTime};

/// Format future elapsed timestamps as wall-clock labels (`HH:MM:SS.mmm`)
/// relative to the session start. Labels wrap past midnight.
pub fn future_labels(start: NaiveTime, timestamps: &[f64]) -> Vec<String> {
    timestamps
        .iter()
        .map(|&secs| {
            let offset = Duration::milliseconds((secs * 1000.0).round() as i64);
            let (time, _) = start.overflowing_add_signed(offset);
            time.format("%H:%M:%S%.3f").to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_labels() {
        let start = NaiveTime::from_hms_opt(18, 59, 58).unwrap();
        let labels = future_labels(start, &[1.0, 2.5, 62.0]);
        assert_eq!(labels, vec!["18:59:59.000", "19:00:00.500", "19:01:00.000"]);
    }

    #[test]
    fn test_future_labels_wrap_midnight() {
        let start = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
        let labels = future_labels(start, &[2.0]);
        assert_eq!(labels, vec!["00:00:01.000"]);
    }
}
