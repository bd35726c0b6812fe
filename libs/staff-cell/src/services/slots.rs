use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::models::DaySchedule;

/// Bookable slots are offered on a fixed half-hour grid.
pub const SLOT_INTERVAL_MINUTES: i64 = 30;

/// Upper bound on slots walked per time range (24h on the half-hour grid).
/// Guards against degenerate range data putting the walk into a long loop.
pub const MAX_SLOTS_PER_RANGE: usize = 48;

pub struct SlotGenerator;

impl SlotGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Computes the open slot times for one staff member on one date.
    ///
    /// The schedule map and booked-time set are caller-supplied snapshots;
    /// no storage is touched here. Returns times sorted ascending with
    /// duplicates collapsed. Missing date entries, disabled days and days
    /// without time ranges all yield an empty list.
    pub fn bookable_slots(
        &self,
        availability: &HashMap<NaiveDate, DaySchedule>,
        booked_times: &HashSet<NaiveTime>,
        target_date: NaiveDate,
        now: NaiveDateTime,
    ) -> Vec<NaiveTime> {
        let schedule = match availability.get(&target_date) {
            Some(schedule) => schedule,
            None => {
                debug!("No schedule entry for {}", target_date);
                return vec![];
            }
        };

        if !schedule.enabled {
            debug!("Schedule for {} is disabled", target_date);
            return vec![];
        }

        if schedule.time_ranges.is_empty() {
            debug!("Schedule for {} has no time ranges", target_date);
            return vec![];
        }

        let mut slots = Vec::new();

        for range in &schedule.time_ranges {
            let (start, end) = match (parse_clock(&range.start), parse_clock(&range.end)) {
                (Some(start), Some(end)) => (start, end),
                _ => {
                    warn!(
                        "Skipping malformed time range '{}'-'{}' on {}",
                        range.start, range.end, target_date
                    );
                    continue;
                }
            };

            let start_at = target_date.and_time(start);
            // An end before the start means the range runs past midnight.
            let end_at = if end < start {
                match target_date.succ_opt() {
                    Some(next_day) => next_day.and_time(end),
                    None => {
                        warn!("Date overflow walking overnight range on {}", target_date);
                        continue;
                    }
                }
            } else {
                target_date.and_time(end)
            };

            let mut current = start_at;
            let mut steps = 0;
            while current < end_at && steps < MAX_SLOTS_PER_RANGE {
                slots.push(current.time());
                current += Duration::minutes(SLOT_INTERVAL_MINUTES);
                steps += 1;
            }

            if steps == MAX_SLOTS_PER_RANGE && current < end_at {
                warn!(
                    "Slot walk for range '{}'-'{}' on {} hit the iteration cap",
                    range.start, range.end, target_date
                );
            }
        }

        slots.retain(|slot| !booked_times.contains(slot));

        // For today, times that have already passed are not offered.
        if target_date == now.date() {
            let wall_clock = now.time();
            slots.retain(|slot| *slot >= wall_clock);
        }

        slots.sort();
        slots.dedup();

        debug!("{} bookable slots on {}", slots.len(), target_date);
        slots
    }
}

impl Default for SlotGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeRange;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    fn schedule(enabled: bool, ranges: Vec<TimeRange>) -> DaySchedule {
        DaySchedule {
            enabled,
            time_ranges: ranges,
        }
    }

    fn far_future_now() -> NaiveDateTime {
        date("2030-01-01").and_time(time("00:00"))
    }

    #[test]
    fn test_walks_range_in_half_hour_steps_excluding_end() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        availability.insert(target, schedule(true, vec![range("09:00", "10:30")]));

        let slots =
            generator.bookable_slots(&availability, &HashSet::new(), target, far_future_now());

        assert_eq!(slots, vec![time("09:00"), time("09:30"), time("10:00")]);
    }

    #[test]
    fn test_missing_date_entry_yields_empty() {
        let generator = SlotGenerator::new();
        let availability = HashMap::new();

        let slots = generator.bookable_slots(
            &availability,
            &HashSet::new(),
            date("2026-09-07"),
            far_future_now(),
        );

        assert!(slots.is_empty());
    }

    #[test]
    fn test_disabled_day_yields_empty() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        availability.insert(target, schedule(false, vec![range("09:00", "17:00")]));

        let slots =
            generator.bookable_slots(&availability, &HashSet::new(), target, far_future_now());

        assert!(slots.is_empty());
    }

    #[test]
    fn test_day_without_ranges_yields_empty() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        availability.insert(target, schedule(true, vec![]));

        let slots =
            generator.bookable_slots(&availability, &HashSet::new(), target, far_future_now());

        assert!(slots.is_empty());
    }

    #[test]
    fn test_booked_times_are_excluded() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        availability.insert(target, schedule(true, vec![range("09:00", "11:00")]));

        let mut booked = HashSet::new();
        booked.insert(time("09:30"));
        booked.insert(time("10:30"));

        let slots = generator.bookable_slots(&availability, &booked, target, far_future_now());

        assert_eq!(slots, vec![time("09:00"), time("10:00")]);
    }

    #[test]
    fn test_past_slots_dropped_on_current_date_only() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        availability.insert(target, schedule(true, vec![range("09:00", "12:00")]));

        // 10:00 sharp: earlier slots go, the 10:00 slot itself stays.
        let now = target.and_time(time("10:00"));
        let slots = generator.bookable_slots(&availability, &HashSet::new(), target, now);
        assert_eq!(
            slots,
            vec![time("10:00"), time("10:30"), time("11:00"), time("11:30")]
        );

        // Same wall clock on a different day leaves the list untouched.
        let other_day_now = date("2026-09-06").and_time(time("10:00"));
        let slots =
            generator.bookable_slots(&availability, &HashSet::new(), target, other_day_now);
        assert_eq!(slots.len(), 6);
    }

    #[test]
    fn test_overnight_range_wraps_past_midnight() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        availability.insert(target, schedule(true, vec![range("22:00", "01:00")]));

        let slots =
            generator.bookable_slots(&availability, &HashSet::new(), target, far_future_now());

        // Wrapped times sort to the front of the ascending list.
        assert_eq!(
            slots,
            vec![
                time("00:00"),
                time("00:30"),
                time("22:00"),
                time("22:30"),
                time("23:00"),
                time("23:30"),
            ]
        );
    }

    #[test]
    fn test_zero_length_range_yields_nothing() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        availability.insert(target, schedule(true, vec![range("09:00", "09:00")]));

        let slots =
            generator.bookable_slots(&availability, &HashSet::new(), target, far_future_now());

        assert!(slots.is_empty());
    }

    #[test]
    fn test_malformed_range_is_skipped_without_losing_others() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        availability.insert(
            target,
            schedule(
                true,
                vec![range("9am", "noon"), range("14:00", "15:00")],
            ),
        );

        let slots =
            generator.bookable_slots(&availability, &HashSet::new(), target, far_future_now());

        assert_eq!(slots, vec![time("14:00"), time("14:30")]);
    }

    #[test]
    fn test_overlapping_ranges_deduplicate() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        availability.insert(
            target,
            schedule(
                true,
                vec![range("09:00", "10:30"), range("10:00", "11:00")],
            ),
        );

        let slots =
            generator.bookable_slots(&availability, &HashSet::new(), target, far_future_now());

        assert_eq!(
            slots,
            vec![time("09:00"), time("09:30"), time("10:00"), time("10:30")]
        );
    }

    #[test]
    fn test_full_day_range_stops_at_iteration_cap() {
        let generator = SlotGenerator::new();
        let target = date("2026-09-07");
        let mut availability = HashMap::new();
        // 00:30 back around to 00:00 is a 23.5h overnight walk.
        availability.insert(target, schedule(true, vec![range("00:30", "00:00")]));

        let slots =
            generator.bookable_slots(&availability, &HashSet::new(), target, far_future_now());

        assert!(slots.len() <= MAX_SLOTS_PER_RANGE);
        assert_eq!(slots.first(), Some(&time("00:30")));
    }
}
