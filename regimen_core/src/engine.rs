//! Rule evaluator for a single day.
//!
//! The evaluator threads one set of active supplement ids through the
//! phases of [`PipelinePhase::ORDER`]:
//! 1. **Base**: start from the core set
//! 2. **Schedule rules**: add supplements whose rules fire on this day
//! 3. **Constraints**: remove by block or season, add required companions,
//!    repeated until a full pass changes nothing
//! 4. **Supplement exclusions**: one-way pairwise removals
//! 5. **Block exclusions**: removals for the active block
//! 6. **Events**: add event-only supplements, then apply overrides in
//!    event priority order
//! 7. **Global exceptions**: the off-week empties the set
//!
//! No state survives between days; every day is evaluated from scratch.

use crate::events::{active_events_on_day, date, weekday_index, weeks_between};
use crate::{
    ConstraintKind, CycleAlignment, Error, EventOverride, ExceptionEffect, GlobalException,
    PipelinePhase, RegimenModel, Result, RunParams, ScheduleRule, ScheduleRuleKind, Supplement,
};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeSet;

/// Supplement ids active at some point of the pipeline
pub type ActiveSet = BTreeSet<String>;

/// Inputs shared by every phase for the day being evaluated
#[derive(Clone, Copy, Debug)]
pub struct DayContext<'a> {
    pub day: NaiveDate,
    pub block_id: &'a str,
    /// Active events, highest priority first
    pub events: &'a [String],
    pub params: &'a RunParams,
}

/// Result of running the full pipeline for one day
#[derive(Clone, Debug, PartialEq)]
pub struct DayEvaluation {
    pub block_id: String,
    pub items: ActiveSet,
    pub events: Vec<String>,
    /// Empty set with no active event
    pub is_off_week: bool,
}

/// Run every phase for `day`
pub fn evaluate_day(model: &RegimenModel, day: NaiveDate, params: &RunParams) -> Result<DayEvaluation> {
    let block_id = model.block_for_month(day.month())?;
    let events = active_events_on_day(model, day)?;
    let ctx = DayContext {
        day,
        block_id,
        events: &events,
        params,
    };

    let mut current = ActiveSet::new();
    for phase in PipelinePhase::ORDER {
        current = run_phase(model, &ctx, phase, current)?;
    }

    let is_off_week = current.is_empty() && events.is_empty();
    tracing::debug!(
        "{} [{}]: {} supplements, events={:?}, off_week={}",
        day,
        block_id,
        current.len(),
        events,
        is_off_week
    );

    Ok(DayEvaluation {
        block_id: block_id.to_string(),
        items: current,
        events,
        is_off_week,
    })
}

/// Apply a single phase to `current`
pub fn run_phase(
    model: &RegimenModel,
    ctx: &DayContext<'_>,
    phase: PipelinePhase,
    current: ActiveSet,
) -> Result<ActiveSet> {
    match phase {
        PipelinePhase::BaseByBlock => Ok(base_by_block(model)),
        PipelinePhase::ApplyScheduleRules => apply_schedule_rules(model, ctx, current),
        PipelinePhase::ApplyConstraints => apply_constraints(model, ctx, current),
        PipelinePhase::ApplySupplementExclusions => Ok(apply_supplement_exclusions(model, current)),
        PipelinePhase::ApplyBlockExclusions => Ok(apply_block_exclusions(model, ctx.block_id, current)),
        PipelinePhase::ApplyEvents => apply_events(model, ctx.events, current),
        PipelinePhase::ApplyGlobalExceptions => apply_global_exceptions(model, ctx, current),
    }
}

// ============================================================================
// Phase 1-2: base set and schedule rules
// ============================================================================

/// The core set, independent of the block
pub fn base_by_block(model: &RegimenModel) -> ActiveSet {
    model.core_set.iter().cloned().collect()
}

/// Add every supplement with a rule that fires on this day
pub fn apply_schedule_rules(
    model: &RegimenModel,
    ctx: &DayContext<'_>,
    mut current: ActiveSet,
) -> Result<ActiveSet> {
    let weekday = weekday_index(ctx.day);

    for (id, supplement) in &model.supplements {
        for rule in &supplement.schedule_rules {
            if !rule_active_in_block(rule, ctx.block_id) {
                continue;
            }
            if schedule_rule_fires(rule, ctx, weekday)? {
                tracing::trace!("{}: {} rule {} adds {}", ctx.day, rule.kind.name(), rule.id, id);
                current.insert(id.clone());
            }
        }
    }

    Ok(current)
}

fn rule_active_in_block(rule: &ScheduleRule, block_id: &str) -> bool {
    rule.active_blocks
        .as_ref()
        .map_or(true, |blocks| blocks.iter().any(|b| b == block_id))
}

fn schedule_rule_fires(rule: &ScheduleRule, ctx: &DayContext<'_>, weekday: u32) -> Result<bool> {
    let fires = match &rule.kind {
        ScheduleRuleKind::Daily => true,
        ScheduleRuleKind::WeekPattern { days_included } => days_included.contains(&weekday),
        ScheduleRuleKind::TimesPerWeek {
            fixed_days,
            weekdays_only,
            ..
        } => !(*weekdays_only && weekday >= 5) && fixed_days.contains(&weekday),
        ScheduleRuleKind::CycleWeeks {
            on_weeks,
            off_weeks,
            alignment,
        } => {
            let anchor = match alignment {
                CycleAlignment::YearStart => date(ctx.day.year(), 1, 1)?,
                CycleAlignment::CustomDate => ctx.params.cycle_anchor_date.ok_or_else(|| {
                    Error::Config(format!(
                        "cycle_anchor_date required for custom_date cycle_weeks (rule {})",
                        rule.id
                    ))
                })?,
            };
            let period = i64::from(*on_weeks) + i64::from(*off_weeks);
            if period == 0 {
                return Err(Error::Config(format!("Rule {} has an empty cycle", rule.id)));
            }
            weeks_between(anchor, ctx.day).rem_euclid(period) < i64::from(*on_weeks)
        }
        ScheduleRuleKind::Optional { flag } => ctx.params.flag(flag),
        // Handled by the events phase
        ScheduleRuleKind::EventOnly { .. } => false,
    };
    Ok(fires)
}

// ============================================================================
// Phase 3: constraints
// ============================================================================

/// Apply per-supplement constraints until the set stops growing
///
/// Block and season constraints depend only on the day, so they are
/// settled first: ineligible supplements leave the set, and requiring one
/// of them is a domain error. The companion closure then runs in passes
/// over a snapshot of the set. Only `require_supplements` additions trigger
/// another pass. A model whose constraints keep adding and removing the
/// same supplement never settles; that is reported as a domain error once
/// the pass budget (catalog size plus one) is exhausted.
pub fn apply_constraints(
    model: &RegimenModel,
    ctx: &DayContext<'_>,
    current: ActiveSet,
) -> Result<ActiveSet> {
    let mut eligible = ActiveSet::new();
    for id in current {
        if permitted_on_day(lookup(model, &id)?, ctx) {
            eligible.insert(id);
        } else {
            tracing::trace!("{}: {} not allowed in block {}", ctx.day, id, ctx.block_id);
        }
    }
    let mut current = eligible;

    let max_passes = model.supplements.len() + 1;
    for pass in 1..=max_passes {
        let mut changed = false;
        let snapshot: Vec<String> = current.iter().cloned().collect();

        for id in &snapshot {
            if !current.contains(id) {
                continue;
            }
            for constraint in &lookup(model, id)?.constraints {
                match &constraint.kind {
                    ConstraintKind::ExcludeSupplements { supplement_ids } => {
                        for target in supplement_ids {
                            current.remove(target);
                        }
                    }
                    ConstraintKind::RequireSupplements { supplement_ids } => {
                        for target in supplement_ids {
                            if !permitted_on_day(lookup(model, target)?, ctx) {
                                return Err(Error::Domain(format!(
                                    "{} requires {}, which is not allowed on {} (block {})",
                                    id, target, ctx.day, ctx.block_id
                                )));
                            }
                            if current.insert(target.clone()) {
                                changed = true;
                            }
                        }
                    }
                    ConstraintKind::AllowedBlocks { .. }
                    | ConstraintKind::ExcludeBlocks { .. }
                    | ConstraintKind::Seasonal { .. } => {}
                }
            }
        }

        if !changed {
            return Ok(current);
        }
        tracing::trace!("{}: constraint pass {} added supplements", ctx.day, pass);
    }

    Err(Error::Domain(format!(
        "Constraints did not reach a fixed point on {} after {} passes",
        ctx.day, max_passes
    )))
}

fn lookup<'m>(model: &'m RegimenModel, id: &str) -> Result<&'m Supplement> {
    model
        .supplements
        .get(id)
        .ok_or_else(|| Error::Domain(format!("Active supplement {} is not in the catalog", id)))
}

/// Whether the block and season constraints of `supplement` admit this day
fn permitted_on_day(supplement: &Supplement, ctx: &DayContext<'_>) -> bool {
    supplement.constraints.iter().all(|constraint| match &constraint.kind {
        ConstraintKind::AllowedBlocks { blocks } => blocks.iter().any(|b| b == ctx.block_id),
        ConstraintKind::ExcludeBlocks { blocks } => !blocks.iter().any(|b| b == ctx.block_id),
        ConstraintKind::Seasonal { months_included } => months_included.contains(&ctx.day.month()),
        ConstraintKind::ExcludeSupplements { .. } | ConstraintKind::RequireSupplements { .. } => true,
    })
}

// ============================================================================
// Phase 4-5: exclusions
// ============================================================================

/// For every present owner, remove the supplements it excludes
pub fn apply_supplement_exclusions(model: &RegimenModel, mut current: ActiveSet) -> ActiveSet {
    for (owner, targets) in &model.conflicts.supplement_exclusions {
        if current.contains(owner) {
            for target in targets {
                current.remove(target);
            }
        }
    }
    current
}

/// Remove supplements forbidden while `block_id` is active
pub fn apply_block_exclusions(model: &RegimenModel, block_id: &str, mut current: ActiveSet) -> ActiveSet {
    if let Some(excluded) = model.conflicts.block_exclusions.get(block_id) {
        for target in excluded {
            current.remove(target);
        }
    }
    current
}

// ============================================================================
// Phase 6: events
// ============================================================================

/// Add event-only supplements, then apply each event's override
///
/// `events` must be in descending priority order. Each override works on
/// the set left by the previous one, so later overrides can only narrow.
pub fn apply_events(model: &RegimenModel, events: &[String], mut current: ActiveSet) -> Result<ActiveSet> {
    for (id, supplement) in &model.supplements {
        let triggered = supplement.schedule_rules.iter().any(|rule| {
            matches!(&rule.kind, ScheduleRuleKind::EventOnly { event_id } if events.contains(event_id))
        });
        if triggered {
            current.insert(id.clone());
        }
    }

    for event_id in events {
        let event = model
            .event(event_id)
            .ok_or_else(|| Error::Domain(format!("Unknown active event {}", event_id)))?;
        let effect = model
            .conflicts
            .event_overrides
            .get(&event.override_id)
            .ok_or_else(|| {
                Error::Domain(format!(
                    "Event {} references unknown override {}",
                    event_id, event.override_id
                ))
            })?;

        current = match effect {
            EventOverride::AllowOnly { allowed_set } => current
                .into_iter()
                .filter(|id| allowed_set.contains(id))
                .collect(),
            EventOverride::RemoveAll => ActiveSet::new(),
        };
    }

    Ok(current)
}

// ============================================================================
// Phase 7: global exceptions
// ============================================================================

/// Empty the set inside the off-week window
///
/// An off-week day must not coincide with any of the exception's forbidden
/// events. Selecting the window by week of year is not supported.
pub fn apply_global_exceptions(
    model: &RegimenModel,
    ctx: &DayContext<'_>,
    current: ActiveSet,
) -> Result<ActiveSet> {
    for exception in &model.global_exceptions {
        match exception {
            GlobalException::OffWeek(off_week) => {
                let in_window = match (ctx.params.off_week_start_date, ctx.params.off_week_week_of_year) {
                    (Some(start), _) => {
                        let span = Duration::days(i64::from(off_week.duration_days) - 1);
                        let end = start.checked_add_signed(span).ok_or_else(|| {
                            Error::Domain(format!(
                                "Off-week {} starting {} runs past the last representable date",
                                off_week.id, start
                            ))
                        })?;
                        start <= ctx.day && ctx.day <= end
                    }
                    (None, Some(week)) => {
                        return Err(Error::Config(format!(
                            "Off-week selection by week of year ({}) is not implemented; use an off-week start date",
                            week
                        )));
                    }
                    (None, None) => false,
                };

                if !in_window {
                    continue;
                }

                let overlap: Vec<&String> = ctx
                    .events
                    .iter()
                    .filter(|e| off_week.hard_exclusion_of_events.contains(*e))
                    .collect();
                if !overlap.is_empty() {
                    return Err(Error::Domain(format!(
                        "Off-week {} on {} overlaps forbidden events: {:?}",
                        off_week.id, ctx.day, overlap
                    )));
                }

                match off_week.effect {
                    ExceptionEffect::RemoveAll => return Ok(ActiveSet::new()),
                }
            }
        }
    }

    Ok(current)
}
