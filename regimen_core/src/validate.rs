//! Structural and referential checks on a regimen model.
//!
//! Validation runs once per generation run, before normalization. It stops
//! at the first violated invariant and reports it as `Error::Validation`.
//! Everything checked here is assumed true by the evaluator afterwards.

use crate::{
    ConstraintKind, Error, GlobalException, PipelinePhase, RegimenModel, Result, ScheduleRule,
    ScheduleRuleKind, Supplement,
};
use regex::Regex;
use std::collections::HashSet;

/// Longest off-week window accepted, one leap year
const MAX_OFF_WEEK_DAYS: u32 = 366;

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Validation(message()))
    }
}

/// Validate a model without modifying it
pub fn validate_model(model: &RegimenModel) -> Result<()> {
    ensure(!model.pipeline.is_empty(), || "Missing pipeline".into())?;

    validate_blocks(model)?;
    validate_supplement_ids(model)?;

    for id in &model.core_set {
        ensure(model.supplements.contains_key(id), || {
            format!("core_set references missing supplement_id: {}", id)
        })?;
    }

    validate_events(model)?;

    for supplement in model.supplements.values() {
        for rule in &supplement.schedule_rules {
            validate_schedule_rule(model, supplement, rule)?;
        }
        validate_constraints(model, supplement)?;
    }

    validate_conflicts(model)?;
    validate_global_exceptions(model)?;
    validate_pipeline(model)?;

    tracing::debug!(
        "Validated model: {} blocks, {} supplements, {} events",
        model.blocks.len(),
        model.supplements.len(),
        model.events.len()
    );
    Ok(())
}

fn validate_blocks(model: &RegimenModel) -> Result<()> {
    for (id, block) in &model.blocks {
        ensure(id == &block.id, || {
            format!("Block key '{}' doesn't match block.id '{}'", id, block.id)
        })?;
    }

    for (month, block_id) in &model.block_calendar {
        ensure((1..=12).contains(month), || {
            format!("block_calendar invalid month key: {}", month)
        })?;
        ensure(model.blocks.contains_key(block_id), || {
            format!(
                "block_calendar references unknown block: month={} block={}",
                month, block_id
            )
        })?;
    }

    for month in 1..=12u32 {
        ensure(model.block_calendar.contains_key(&month), || {
            format!("block_calendar has no block for month {}", month)
        })?;
    }
    Ok(())
}

fn validate_supplement_ids(model: &RegimenModel) -> Result<()> {
    let pattern = &model.validation.supplement_id_format;
    let id_re = Regex::new(pattern)
        .map_err(|e| Error::Validation(format!("Invalid supplement_id_format {:?}: {}", pattern, e)))?;

    for (id, supplement) in &model.supplements {
        ensure(id_re.is_match(id), || format!("Invalid supplement_id format: {}", id))?;
        ensure(id == &supplement.id, || {
            format!("Supplement key '{}' doesn't match supplement.id '{}'", id, supplement.id)
        })?;
        ensure(!supplement.name.is_empty(), || format!("Supplement '{}' has empty name", id))?;
    }
    Ok(())
}

fn validate_events(model: &RegimenModel) -> Result<()> {
    let mut seen = HashSet::new();
    for event in &model.events {
        ensure(seen.insert(event.id.as_str()), || {
            format!("Duplicate event id: {}", event.id)
        })?;
        ensure(
            model.conflicts.event_overrides.contains_key(&event.override_id),
            || {
                format!(
                    "events[{}].override_id not found in conflicts.event_overrides: {}",
                    event.id, event.override_id
                )
            },
        )?;
        ensure(!event.months.is_empty(), || {
            format!("events[{}] has no months", event.id)
        })?;
        for month in &event.months {
            ensure((1..=12).contains(month), || {
                format!("events[{}] invalid month: {}", event.id, month)
            })?;
        }
        ensure((1..=14).contains(&event.length_days), || {
            format!(
                "events[{}].length_days must be in 1..=14, got {}",
                event.id, event.length_days
            )
        })?;
        ensure((1..=5).contains(&event.month_week_selection), || {
            format!(
                "events[{}].month_week_selection must be in 1..=5, got {}",
                event.id, event.month_week_selection
            )
        })?;
    }
    Ok(())
}

fn validate_weekdays(owner: &str, rule: &ScheduleRule, days: &[u32]) -> Result<()> {
    let kind = rule.kind.name();
    ensure(!days.is_empty(), || format!("{}: {} rule {} has no days", owner, kind, rule.id))?;
    for day in days {
        ensure(*day <= 6, || {
            format!("{}: {} rule {} has invalid weekday index {}", owner, kind, rule.id, day)
        })?;
    }
    Ok(())
}

fn validate_block_refs(model: &RegimenModel, owner: &str, rule_id: &str, blocks: &[String]) -> Result<()> {
    ensure(!blocks.is_empty(), || {
        format!("{}: {} has an empty block list", owner, rule_id)
    })?;
    for block in blocks {
        ensure(model.blocks.contains_key(block), || {
            format!("{}: {} references unknown block {}", owner, rule_id, block)
        })?;
    }
    Ok(())
}

fn validate_schedule_rule(model: &RegimenModel, supplement: &Supplement, rule: &ScheduleRule) -> Result<()> {
    let sid = supplement.id.as_str();
    ensure(!rule.id.is_empty(), || format!("{}: schedule rule with empty id", sid))?;

    if let Some(active) = &rule.active_blocks {
        validate_block_refs(model, sid, &rule.id, active)?;
    }

    match &rule.kind {
        ScheduleRuleKind::Daily => {}
        ScheduleRuleKind::WeekPattern { days_included } => {
            validate_weekdays(sid, rule, days_included)?;
        }
        ScheduleRuleKind::TimesPerWeek { n, fixed_days, .. } => {
            ensure((1..=7).contains(n), || {
                format!("{}: rule {} n must be in 1..=7, got {}", sid, rule.id, n)
            })?;
            ensure(fixed_days.len() <= 7, || {
                format!("{}: rule {} lists more than 7 fixed days", sid, rule.id)
            })?;
            validate_weekdays(sid, rule, fixed_days)?;
        }
        ScheduleRuleKind::CycleWeeks {
            on_weeks, off_weeks, ..
        } => {
            for (label, weeks) in [("on_weeks", on_weeks), ("off_weeks", off_weeks)] {
                ensure((1..=52).contains(weeks), || {
                    format!(
                        "{}: {} rule {} {} must be in 1..=52, got {}",
                        sid,
                        rule.kind.name(),
                        rule.id,
                        label,
                        weeks
                    )
                })?;
            }
        }
        ScheduleRuleKind::Optional { flag } => {
            ensure(!flag.is_empty(), || format!("{}: rule {} has an empty flag", sid, rule.id))?;
        }
        ScheduleRuleKind::EventOnly { event_id } => {
            ensure(model.event(event_id).is_some(), || {
                format!("{} event_only references unknown event_id: {}", sid, event_id)
            })?;
        }
    }
    Ok(())
}

fn validate_constraints(model: &RegimenModel, supplement: &Supplement) -> Result<()> {
    let sid = supplement.id.as_str();
    for constraint in &supplement.constraints {
        ensure(!constraint.id.is_empty(), || format!("{}: constraint with empty id", sid))?;

        match &constraint.kind {
            ConstraintKind::AllowedBlocks { blocks } | ConstraintKind::ExcludeBlocks { blocks } => {
                validate_block_refs(model, sid, &constraint.id, blocks)?;
            }
            ConstraintKind::Seasonal { months_included } => {
                ensure(!months_included.is_empty(), || {
                    format!("{}: constraint {} has no months", sid, constraint.id)
                })?;
                for month in months_included {
                    ensure((1..=12).contains(month), || {
                        format!("{}: constraint {} invalid month {}", sid, constraint.id, month)
                    })?;
                }
            }
            ConstraintKind::ExcludeSupplements { supplement_ids }
            | ConstraintKind::RequireSupplements { supplement_ids } => {
                ensure(!supplement_ids.is_empty(), || {
                    format!("{}: constraint {} lists no supplements", sid, constraint.id)
                })?;
                for target in supplement_ids {
                    ensure(model.supplements.contains_key(target), || {
                        format!(
                            "{}: constraint {} references unknown supplement {}",
                            sid, constraint.id, target
                        )
                    })?;
                }
            }
        }
    }
    Ok(())
}

fn validate_conflicts(model: &RegimenModel) -> Result<()> {
    for block in model.conflicts.block_exclusions.keys() {
        ensure(model.blocks.contains_key(block), || {
            format!("block_exclusions references unknown block: {}", block)
        })?;
    }
    for sid in model.conflicts.supplement_exclusions.keys() {
        ensure(model.supplements.contains_key(sid), || {
            format!("supplement_exclusions references unknown supplement: {}", sid)
        })?;
    }
    Ok(())
}

fn validate_global_exceptions(model: &RegimenModel) -> Result<()> {
    for exception in &model.global_exceptions {
        match exception {
            GlobalException::OffWeek(off_week) => {
                ensure((1..=MAX_OFF_WEEK_DAYS).contains(&off_week.duration_days), || {
                    format!(
                        "off_week {} duration_days must be in 1..={}, got {}",
                        off_week.id, MAX_OFF_WEEK_DAYS, off_week.duration_days
                    )
                })?;
                for event_id in &off_week.hard_exclusion_of_events {
                    ensure(model.event(event_id).is_some(), || {
                        format!("off_week {} excludes unknown event {}", off_week.id, event_id)
                    })?;
                }
            }
        }
    }
    Ok(())
}

fn validate_pipeline(model: &RegimenModel) -> Result<()> {
    match &model.validation.pipeline_must_equal {
        Some(expected) => {
            ensure(&model.pipeline == expected, || {
                format!(
                    "pipeline must equal {:?} but is {:?}",
                    expected, model.pipeline
                )
            })?;
            ensure(expected.as_slice() == PipelinePhase::ORDER.as_slice(), || {
                format!(
                    "pipeline_must_equal {:?} does not match the evaluator order {:?}",
                    expected,
                    PipelinePhase::ORDER
                )
            })
        }
        None => {
            if model.pipeline.as_slice() != PipelinePhase::ORDER.as_slice() {
                tracing::warn!(
                    "Configured pipeline {:?} differs from the evaluator order; it is informational only",
                    model.pipeline
                );
            }
            Ok(())
        }
    }
}
