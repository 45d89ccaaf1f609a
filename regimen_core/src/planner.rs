//! Day assembly and whole-year generation.
//!
//! The year driver validates and normalizes the model once, then evaluates
//! every day independently. Days share nothing but the immutable model and
//! run parameters, so they are evaluated in parallel and collected back in
//! date order.

use crate::engine::{evaluate_day, ActiveSet};
use crate::normalize::normalize_model;
use crate::validate::validate_model;
use crate::{DayItem, DayPlan, Error, OrderingRules, RegimenModel, Result, RunParams, TimingSlot};
use chrono::{Datelike, NaiveDate, Weekday};
use rayon::prelude::*;
use std::cmp::Reverse;

// ============================================================================
// Day Assembler
// ============================================================================

/// Project the final id set onto ordered `DayItem`s
pub fn assemble_day_items(model: &RegimenModel, ids: &ActiveSet) -> Result<Vec<DayItem>> {
    let mut items = ids
        .iter()
        .map(|id| {
            let supplement = model
                .supplements
                .get(id)
                .ok_or_else(|| Error::Domain(format!("Unknown supplement {} in day plan", id)))?;
            Ok(DayItem {
                supplement_id: id.clone(),
                name: supplement.name.clone(),
                timing_hint: supplement.timing_hint(),
                priority: supplement.priority,
                dose: supplement.default_dose.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    sort_day_items(&model.ordering, &mut items);
    Ok(items)
}

/// Sort by timing rank, then priority (highest first), then id
///
/// A timing slot missing from the configured order ranks after every
/// listed slot.
pub fn sort_day_items(ordering: &OrderingRules, items: &mut [DayItem]) {
    let order = &ordering.timing_hint_order;
    let rank = |item: &DayItem| {
        let slot = TimingSlot::from(item.timing_hint);
        order.iter().position(|s| *s == slot).unwrap_or(order.len())
    };

    items.sort_by(|a, b| {
        (rank(a), Reverse(a.priority), &a.supplement_id).cmp(&(
            rank(b),
            Reverse(b.priority),
            &b.supplement_id,
        ))
    });
}

// ============================================================================
// Year Driver
// ============================================================================

/// Validate, normalize and check run parameters once per run
fn prepare(model: &RegimenModel, params: &RunParams) -> Result<RegimenModel> {
    validate_model(model)?;
    let normalized = normalize_model(model);

    if let Some(start) = params.off_week_start_date {
        if start.weekday() != Weekday::Mon {
            return Err(Error::Config(format!(
                "off_week_start_date must be a Monday, got {} ({})",
                start,
                start.weekday()
            )));
        }
        if params.off_week_week_of_year.is_some() {
            tracing::warn!("Both off-week selectors supplied; using the start date {}", start);
        }
    }

    Ok(normalized)
}

fn build_day_plan(model: &RegimenModel, day: NaiveDate, params: &RunParams) -> Result<DayPlan> {
    let evaluation = evaluate_day(model, day, params)?;
    let block_name = model
        .blocks
        .get(&evaluation.block_id)
        .map(|b| b.name.clone())
        .unwrap_or_else(|| evaluation.block_id.clone());
    let items = assemble_day_items(model, &evaluation.items)?;
    let is_pulse_day = !evaluation.events.is_empty();

    Ok(DayPlan {
        day,
        block_name,
        block_id: evaluation.block_id,
        items,
        events: evaluation.events,
        is_off_week: evaluation.is_off_week,
        is_pulse_day,
    })
}

fn evaluate_days(model: &RegimenModel, days: &[NaiveDate], params: &RunParams) -> Result<Vec<DayPlan>> {
    days.par_iter()
        .map(|&day| build_day_plan(model, day, params))
        .collect()
}

/// One `DayPlan` per calendar day of `year`, in ascending date order
pub fn generate_year(model: &RegimenModel, year: i32, params: &RunParams) -> Result<Vec<DayPlan>> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| Error::Config(format!("Year {} is out of range", year)))?;
    let days: Vec<NaiveDate> = first.iter_days().take_while(|d| d.year() == year).collect();

    generate_days(model, &days, params)
}

/// Plans for `count` consecutive days starting at `first`
pub fn generate_range(
    model: &RegimenModel,
    first: NaiveDate,
    count: u32,
    params: &RunParams,
) -> Result<Vec<DayPlan>> {
    let days: Vec<NaiveDate> = first.iter_days().take(count as usize).collect();
    generate_days(model, &days, params)
}

fn generate_days(model: &RegimenModel, days: &[NaiveDate], params: &RunParams) -> Result<Vec<DayPlan>> {
    let normalized = prepare(model, params)?;

    tracing::info!(
        "Generating {} day plans ({} supplements, {} events)",
        days.len(),
        normalized.supplements.len(),
        normalized.events.len()
    );

    let plans = evaluate_days(&normalized, days, params)?;

    tracing::info!(
        "Generated {} day plans, {} off-week days, {} pulse days",
        plans.len(),
        plans.iter().filter(|p| p.is_off_week).count(),
        plans.iter().filter(|p| p.is_pulse_day).count()
    );

    Ok(plans)
}

/// Evaluate a single date with the full pipeline
pub fn plan_for_day(model: &RegimenModel, day: NaiveDate, params: &RunParams) -> Result<DayPlan> {
    let normalized = prepare(model, params)?;
    build_day_plan(&normalized, day, params)
}
