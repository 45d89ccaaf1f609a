//! Canonical form of a regimen model.
//!
//! Set-like collections may arrive in any order and with duplicates. The
//! normalized copy stores each of them as a sorted, de-duplicated sequence,
//! so logically equal models produce identical plans. Ordered collections
//! (the event list, month-week day offsets, the timing order) are left alone.

use crate::{ConstraintKind, EventOverride, GlobalException, RegimenModel, ScheduleRuleKind};

fn canonical<T: Ord>(values: &mut Vec<T>) {
    values.sort();
    values.dedup();
}

/// Return a normalized copy of `model`; the input is not modified
pub fn normalize_model(model: &RegimenModel) -> RegimenModel {
    let mut normalized = model.clone();

    canonical(&mut normalized.core_set);

    for supplement in normalized.supplements.values_mut() {
        canonical(&mut supplement.tags);

        for rule in &mut supplement.schedule_rules {
            if let Some(active) = rule.active_blocks.as_mut() {
                canonical(active);
            }
            match &mut rule.kind {
                ScheduleRuleKind::WeekPattern { days_included } => canonical(days_included),
                ScheduleRuleKind::TimesPerWeek { fixed_days, .. } => canonical(fixed_days),
                ScheduleRuleKind::Daily
                | ScheduleRuleKind::CycleWeeks { .. }
                | ScheduleRuleKind::Optional { .. }
                | ScheduleRuleKind::EventOnly { .. } => {}
            }
        }

        for constraint in &mut supplement.constraints {
            match &mut constraint.kind {
                ConstraintKind::AllowedBlocks { blocks } | ConstraintKind::ExcludeBlocks { blocks } => {
                    canonical(blocks)
                }
                ConstraintKind::Seasonal { months_included } => canonical(months_included),
                ConstraintKind::ExcludeSupplements { supplement_ids }
                | ConstraintKind::RequireSupplements { supplement_ids } => canonical(supplement_ids),
            }
        }
    }

    for targets in normalized.conflicts.block_exclusions.values_mut() {
        canonical(targets);
    }
    for targets in normalized.conflicts.supplement_exclusions.values_mut() {
        canonical(targets);
    }
    for effect in normalized.conflicts.event_overrides.values_mut() {
        if let EventOverride::AllowOnly { allowed_set } = effect {
            canonical(allowed_set);
        }
    }

    for event in &mut normalized.events {
        canonical(&mut event.months);
    }

    for exception in &mut normalized.global_exceptions {
        match exception {
            GlobalException::OffWeek(off_week) => canonical(&mut off_week.hard_exclusion_of_events),
        }
    }

    tracing::debug!(
        "Normalized model: {} supplements, {} events",
        normalized.supplements.len(),
        normalized.events.len()
    );

    normalized
}
