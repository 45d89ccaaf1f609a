//! Calendar arithmetic and event-day resolution.
//!
//! Pulse events pick their days through a month-relative mapping
//! (selection index -> day-of-month offsets). Offsets past the end of a
//! short month go through the configured fallback policy.

use crate::{DayFallback, Error, EventDefinition, EventKind, RegimenModel, Result};
use chrono::{Datelike, NaiveDate};
use std::cmp::Reverse;

/// Build a date or report it as a domain error
pub fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::Domain(format!("Invalid date {}-{:02}-{:02}", year, month, day)))
}

/// Number of days in a calendar month
pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let last = date(next_year, next_month, 1)?
        .pred_opt()
        .ok_or_else(|| Error::Domain(format!("No last day for {}-{:02}", year, month)))?;
    Ok(last.day())
}

/// Weekday index with Monday = 0 .. Sunday = 6
pub fn weekday_index(day: NaiveDate) -> u32 {
    day.weekday().num_days_from_monday()
}

/// Whole weeks from `anchor` to `day`, floored (negative before the anchor)
pub fn weeks_between(anchor: NaiveDate, day: NaiveDate) -> i64 {
    (day - anchor).num_days().div_euclid(7)
}

/// Resolve the days of `month` on which `event` is active
///
/// The result is non-empty, duplicate-free, inside the month, and at most
/// `length_days` long.
pub fn resolve_event_days(
    model: &RegimenModel,
    year: i32,
    month: u32,
    event: &EventDefinition,
) -> Result<Vec<NaiveDate>> {
    let selection = &model.settings.pulse;
    let month_days = days_in_month(year, month)?;
    let desired = event.length_days as usize;
    let offsets = selection
        .month_week_selection_mapping
        .get(&event.month_week_selection)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut resolved: Vec<NaiveDate> = Vec::with_capacity(desired);
    for &offset in offsets.iter().take(desired) {
        let day = if (1..=month_days).contains(&offset) {
            offset
        } else {
            match selection.fallback_if_day_invalid {
                DayFallback::LastDayOfMonth => {
                    tracing::debug!(
                        "Event {}: day {} does not exist in {}-{:02}, using day {}",
                        event.id,
                        offset,
                        year,
                        month,
                        month_days
                    );
                    month_days
                }
                DayFallback::Fail => {
                    return Err(Error::Domain(format!(
                        "Invalid day {} for {}-{:02} (event {})",
                        offset, year, month, event.id
                    )));
                }
            }
        };

        let candidate = date(year, month, day)?;
        if !resolved.contains(&candidate) {
            resolved.push(candidate);
        }
    }

    let Some(&last) = resolved.last() else {
        return Err(Error::Domain(format!(
            "No event days resolved for event={} month={}",
            event.id, month
        )));
    };

    // Best-effort backfill with the following days of the same month
    let mut cursor = last;
    while resolved.len() < desired && cursor.day() < month_days {
        cursor = date(year, month, cursor.day() + 1)?;
        if !resolved.contains(&cursor) {
            resolved.push(cursor);
        }
    }

    resolved.truncate(desired);
    Ok(resolved)
}

/// Ids of events active on `day`, highest priority first
///
/// Equal priorities keep their configuration order.
pub fn active_events_on_day(model: &RegimenModel, day: NaiveDate) -> Result<Vec<String>> {
    let mut active: Vec<&EventDefinition> = Vec::new();

    for event in &model.events {
        match event.kind {
            EventKind::Pulse => {
                if !event.months.contains(&day.month()) {
                    continue;
                }
                let days = resolve_event_days(model, day.year(), day.month(), event)?;
                if days.contains(&day) {
                    active.push(event);
                }
            }
        }
    }

    active.sort_by_key(|event| Reverse(event.priority));
    Ok(active.into_iter().map(|event| event.id.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{build_default_model, minimal_model};
    use crate::EventOverride;

    fn pulse(id: &str, months: &[u32], selection: u32, length: u32, priority: i32) -> EventDefinition {
        EventDefinition {
            id: id.into(),
            kind: EventKind::Pulse,
            months: months.to_vec(),
            length_days: length,
            month_week_selection: selection,
            time_of_day: None,
            capsules_per_day: None,
            override_id: "clear".into(),
            priority,
        }
    }

    fn model_with_clear_override() -> RegimenModel {
        let mut model = minimal_model();
        model
            .conflicts
            .event_overrides
            .insert("clear".into(), EventOverride::RemoveAll);
        model
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2026, 2).unwrap(), 28);
        assert_eq!(days_in_month(2024, 2).unwrap(), 29);
        assert_eq!(days_in_month(2026, 12).unwrap(), 31);
        assert_eq!(days_in_month(2026, 4).unwrap(), 30);
    }

    #[test]
    fn test_weekday_and_week_arithmetic() {
        // 2026-02-02 is a Monday
        assert_eq!(weekday_index(date(2026, 2, 2).unwrap()), 0);
        assert_eq!(weekday_index(date(2026, 2, 8).unwrap()), 6);

        let anchor = date(2026, 1, 6).unwrap();
        assert_eq!(weeks_between(anchor, anchor), 0);
        assert_eq!(weeks_between(anchor, date(2026, 1, 12).unwrap()), 0);
        assert_eq!(weeks_between(anchor, date(2026, 1, 13).unwrap()), 1);
        assert_eq!(weeks_between(anchor, date(2026, 1, 5).unwrap()), -1);
    }

    #[test]
    fn test_default_pulse_days() {
        let model = build_default_model();
        let event = &model.events[0];
        let days = resolve_event_days(&model, 2026, 3, event).unwrap();
        assert_eq!(days, vec![date(2026, 3, 8).unwrap(), date(2026, 3, 9).unwrap()]);
    }

    #[test]
    fn test_fallback_to_last_day_deduplicates() {
        let model = model_with_clear_override();
        let event = pulse("late", &[2], 5, 2, 0);

        // 29 and 30 both fall back to the 28th in a common year
        let days = resolve_event_days(&model, 2026, 2, &event).unwrap();
        assert_eq!(days, vec![date(2026, 2, 28).unwrap()]);

        // Leap year: 29 exists, 30 falls back onto it
        let days = resolve_event_days(&model, 2024, 2, &event).unwrap();
        assert_eq!(days, vec![date(2024, 2, 29).unwrap()]);
    }

    #[test]
    fn test_fail_policy_rejects_invalid_day() {
        let mut model = model_with_clear_override();
        model.settings.pulse.fallback_if_day_invalid = DayFallback::Fail;
        let event = pulse("late", &[2], 5, 2, 0);

        let result = resolve_event_days(&model, 2026, 2, &event);
        assert!(matches!(result, Err(Error::Domain(_))));
    }

    #[test]
    fn test_backfill_extends_to_desired_length() {
        let mut model = model_with_clear_override();
        model
            .settings
            .pulse
            .month_week_selection_mapping
            .insert(3, vec![15, 16]);
        let event = pulse("long", &[4], 3, 4, 0);

        let days = resolve_event_days(&model, 2026, 4, &event).unwrap();
        let numbers: Vec<u32> = days.iter().map(|d| d.day()).collect();
        assert_eq!(numbers, vec![15, 16, 17, 18]);
    }

    #[test]
    fn test_backfill_stops_at_month_end() {
        let model = model_with_clear_override();
        let event = pulse("late", &[4], 5, 5, 0);

        let days = resolve_event_days(&model, 2026, 4, &event).unwrap();
        let numbers: Vec<u32> = days.iter().map(|d| d.day()).collect();
        assert_eq!(numbers, vec![29, 30]);
    }

    #[test]
    fn test_missing_selection_is_domain_error() {
        let mut model = model_with_clear_override();
        model.settings.pulse.month_week_selection_mapping.remove(&4);
        let event = pulse("gone", &[1], 4, 2, 0);

        match resolve_event_days(&model, 2026, 1, &event) {
            Err(Error::Domain(msg)) => assert!(msg.contains("No event days resolved")),
            other => panic!("Expected domain error, got {:?}", other),
        }
    }

    #[test]
    fn test_active_events_only_in_listed_months() {
        let model = build_default_model();
        assert_eq!(
            active_events_on_day(&model, date(2026, 6, 8).unwrap()).unwrap(),
            vec!["pulse_fisetin".to_string()]
        );
        assert!(active_events_on_day(&model, date(2026, 5, 8).unwrap())
            .unwrap()
            .is_empty());
        assert!(active_events_on_day(&model, date(2026, 6, 10).unwrap())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_active_events_ordered_by_priority_then_config_order() {
        let mut model = model_with_clear_override();
        model.events = vec![
            pulse("low", &[1], 1, 2, 1),
            pulse("tie_first", &[1], 1, 2, 5),
            pulse("high", &[1], 1, 2, 10),
            pulse("tie_second", &[1], 1, 2, 5),
        ];

        let active = active_events_on_day(&model, date(2026, 1, 2).unwrap()).unwrap();
        assert_eq!(active, vec!["high", "tie_first", "tie_second", "low"]);
    }
}
