//! Property tests for weekly occurrence math.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use cohort_core::model::{TimeOfDay, WeeklySchedule};
use proptest::prelude::*;

fn weekday(n: u8) -> Weekday {
    match n % 7 {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}

proptest! {
    // In a fixed-offset timezone the two occurrences must bracket now
    // exactly one week apart, on the right weekday at the right time.
    #[test]
    fn occurrences_bracket_now_in_utc(
        day in 0u8..7,
        hour in 0u32..24,
        minute in 0u32..60,
        now_offset_minutes in 0i64..(14 * 24 * 60),
    ) {
        let schedule = WeeklySchedule::new("s", weekday(day), TimeOfDay::new(hour, minute), 0);
        let base: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = (base + Duration::minutes(now_offset_minutes)).with_timezone(&chrono_tz::UTC);

        let (prior, next) = schedule.occurrences_around(now).unwrap();

        prop_assert!(prior <= now);
        prop_assert!(next > now);
        prop_assert_eq!(next - prior, Duration::days(7));
        for occurrence in [prior, next] {
            prop_assert_eq!(occurrence.weekday(), schedule.day_of_week);
            prop_assert_eq!(occurrence.hour(), hour);
            prop_assert_eq!(occurrence.minute(), minute);
        }
    }
}
