//! Core domain types for the regimen planner.
//!
//! This module defines the fundamental types used throughout the system:
//! - The regimen model (blocks, supplements, rules, constraints, events)
//! - Conflict tables and global exceptions
//! - Run parameters supplied once per generation run
//! - Per-day output (`DayPlan`, `DayItem`)

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Pipeline
// ============================================================================

/// One phase of the per-day rule pipeline
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    BaseByBlock,
    ApplyScheduleRules,
    ApplyConstraints,
    ApplySupplementExclusions,
    ApplyBlockExclusions,
    ApplyEvents,
    ApplyGlobalExceptions,
}

impl PipelinePhase {
    /// The order in which the evaluator runs its phases. Not configurable.
    pub const ORDER: [PipelinePhase; 7] = [
        PipelinePhase::BaseByBlock,
        PipelinePhase::ApplyScheduleRules,
        PipelinePhase::ApplyConstraints,
        PipelinePhase::ApplySupplementExclusions,
        PipelinePhase::ApplyBlockExclusions,
        PipelinePhase::ApplyEvents,
        PipelinePhase::ApplyGlobalExceptions,
    ];
}

// ============================================================================
// Timing and Dose
// ============================================================================

/// Time of day a supplement is meant to be taken
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimingHint {
    Morning,
    Any,
    Evening,
}

/// Entry of the canonical timing order; `Unset` stands for "no hint"
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimingSlot {
    Morning,
    Any,
    Evening,
    Unset,
}

impl From<Option<TimingHint>> for TimingSlot {
    fn from(hint: Option<TimingHint>) -> Self {
        match hint {
            Some(TimingHint::Morning) => TimingSlot::Morning,
            Some(TimingHint::Any) => TimingSlot::Any,
            Some(TimingHint::Evening) => TimingSlot::Evening,
            None => TimingSlot::Unset,
        }
    }
}

/// Default dose of a supplement
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Dose {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub timing_hint: Option<TimingHint>,
}

// ============================================================================
// Blocks
// ============================================================================

/// A rotation phase active for whole calendar months
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Schedule Rules
// ============================================================================

/// How `times_per_week` picks its days
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    FixedDays,
}

/// Anchor of a `cycle_weeks` rule
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CycleAlignment {
    /// January 1st of the evaluated day's year
    YearStart,
    /// The run-wide `cycle_anchor_date`
    #[default]
    CustomDate,
}

/// A rule that can add its owning supplement to a day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScheduleRule {
    pub id: String,
    /// `None` means the rule applies in every block
    #[serde(default)]
    pub active_blocks: Option<Vec<String>>,
    #[serde(flatten)]
    pub kind: ScheduleRuleKind,
}

/// Schedule rule kinds with their parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleRuleKind {
    Daily,
    WeekPattern {
        days_included: Vec<u32>,
    },
    TimesPerWeek {
        n: u32,
        #[serde(default)]
        selection_policy: SelectionPolicy,
        fixed_days: Vec<u32>,
        #[serde(default)]
        weekdays_only: bool,
    },
    CycleWeeks {
        on_weeks: u32,
        off_weeks: u32,
        #[serde(default)]
        alignment: CycleAlignment,
    },
    Optional {
        flag: String,
    },
    EventOnly {
        event_id: String,
    },
}

impl ScheduleRuleKind {
    /// Tag name as written in model files
    pub fn name(&self) -> &'static str {
        match self {
            ScheduleRuleKind::Daily => "daily",
            ScheduleRuleKind::WeekPattern { .. } => "week_pattern",
            ScheduleRuleKind::TimesPerWeek { .. } => "times_per_week",
            ScheduleRuleKind::CycleWeeks { .. } => "cycle_weeks",
            ScheduleRuleKind::Optional { .. } => "optional",
            ScheduleRuleKind::EventOnly { .. } => "event_only",
        }
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// A rule that can remove its owner or add/remove companions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Constraint {
    pub id: String,
    #[serde(flatten)]
    pub kind: ConstraintKind,
}

/// Constraint kinds with their parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintKind {
    AllowedBlocks { blocks: Vec<String> },
    ExcludeBlocks { blocks: Vec<String> },
    Seasonal { months_included: Vec<u32> },
    ExcludeSupplements { supplement_ids: Vec<String> },
    RequireSupplements { supplement_ids: Vec<String> },
}

// ============================================================================
// Supplements
// ============================================================================

/// A schedulable supplement definition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Supplement {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_dose: Option<Dose>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub schedule_rules: Vec<ScheduleRule>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Supplement {
    pub fn timing_hint(&self) -> Option<TimingHint> {
        self.default_dose.as_ref().and_then(|d| d.timing_hint)
    }
}

// ============================================================================
// Conflicts
// ============================================================================

/// Effect an active event has on the accumulated day set
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum EventOverride {
    /// Intersect the day set with `allowed_set`
    AllowOnly { allowed_set: Vec<String> },
    /// Empty the day set
    RemoveAll,
}

/// Exclusion tables and event overrides
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Conflicts {
    /// Block id -> supplements forbidden while that block is active
    #[serde(default)]
    pub block_exclusions: BTreeMap<String, Vec<String>>,
    /// Supplement id -> supplements it forbids (one-way)
    #[serde(default)]
    pub supplement_exclusions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub event_overrides: BTreeMap<String, EventOverride>,
}

// ============================================================================
// Global Exceptions
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionEffect {
    #[default]
    RemoveAll,
}

/// Exception rules applied after every other phase
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GlobalException {
    OffWeek(OffWeekException),
}

/// A contiguous run of days on which the regimen is paused
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OffWeekException {
    pub id: String,
    pub duration_days: u32,
    #[serde(default)]
    pub effect: ExceptionEffect,
    #[serde(default)]
    pub priority: i32,
    /// Events that must never be active inside the window
    #[serde(default)]
    pub hard_exclusion_of_events: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// Events
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Pulse,
}

/// A recurring, month-relative event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub months: Vec<u32>,
    pub length_days: u32,
    /// Key into the month-week selection mapping
    pub month_week_selection: u32,
    #[serde(default)]
    pub time_of_day: Option<TimingHint>,
    #[serde(default)]
    pub capsules_per_day: Option<u32>,
    pub override_id: String,
    #[serde(default)]
    pub priority: i32,
}

// ============================================================================
// Engine Settings, Validation and Ordering Metadata
// ============================================================================

/// What to do with a selected day that does not exist in the month
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DayFallback {
    #[default]
    #[serde(alias = "next_valid_day_in_month")]
    LastDayOfMonth,
    Fail,
}

/// Day selection for pulse events
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PulseSelection {
    #[serde(with = "int_keys", default = "default_week_mapping")]
    pub month_week_selection_mapping: BTreeMap<u32, Vec<u32>>,
    #[serde(default)]
    pub fallback_if_day_invalid: DayFallback,
}

impl Default for PulseSelection {
    fn default() -> Self {
        Self {
            month_week_selection_mapping: default_week_mapping(),
            fallback_if_day_invalid: DayFallback::default(),
        }
    }
}

fn default_week_mapping() -> BTreeMap<u32, Vec<u32>> {
    BTreeMap::from([
        (1, vec![1, 2]),
        (2, vec![8, 9]),
        (3, vec![15, 16]),
        (4, vec![22, 23]),
        (5, vec![29, 30]),
    ])
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineSettings {
    #[serde(default)]
    pub pulse: PulseSelection,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ValidationRules {
    #[serde(default = "default_id_format")]
    pub supplement_id_format: String,
    /// Expected phase sequence; checked against the model and the engine
    #[serde(default)]
    pub pipeline_must_equal: Option<Vec<PipelinePhase>>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            supplement_id_format: default_id_format(),
            pipeline_must_equal: None,
        }
    }
}

fn default_id_format() -> String {
    "^[a-z0-9_]+$".into()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OrderingRules {
    #[serde(default = "default_timing_order")]
    pub timing_hint_order: Vec<TimingSlot>,
}

impl Default for OrderingRules {
    fn default() -> Self {
        Self {
            timing_hint_order: default_timing_order(),
        }
    }
}

fn default_timing_order() -> Vec<TimingSlot> {
    vec![
        TimingSlot::Morning,
        TimingSlot::Any,
        TimingSlot::Evening,
        TimingSlot::Unset,
    ]
}

// ============================================================================
// Regimen Model
// ============================================================================

/// The complete rule configuration for one regimen
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RegimenModel {
    pub pipeline: Vec<PipelinePhase>,
    #[serde(default)]
    pub settings: EngineSettings,
    /// Month (1-12) -> block id
    #[serde(with = "int_keys")]
    pub block_calendar: BTreeMap<u32, String>,
    pub blocks: BTreeMap<String, Block>,
    pub core_set: Vec<String>,
    pub conflicts: Conflicts,
    #[serde(default)]
    pub global_exceptions: Vec<GlobalException>,
    /// Kept in configuration order; equal-priority events resolve in this order
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    pub supplements: BTreeMap<String, Supplement>,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default)]
    pub ordering: OrderingRules,
}

impl RegimenModel {
    /// Block id scheduled for a calendar month
    pub fn block_for_month(&self, month: u32) -> Result<&str> {
        self.block_calendar
            .get(&month)
            .map(String::as_str)
            .ok_or_else(|| Error::Domain(format!("No block scheduled for month {}", month)))
    }

    pub fn event(&self, id: &str) -> Option<&EventDefinition> {
        self.events.iter().find(|e| e.id == id)
    }
}

// ============================================================================
// Run Parameters
// ============================================================================

/// Parameters fixed for a whole generation run
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RunParams {
    /// First day of the off-week; must be a Monday
    #[serde(default)]
    pub off_week_start_date: Option<NaiveDate>,
    /// Week-of-year off-week selection (not implemented, rejected at evaluation)
    #[serde(default)]
    pub off_week_week_of_year: Option<u32>,
    #[serde(default)]
    pub cycle_anchor_date: Option<NaiveDate>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl RunParams {
    /// Value of a runtime flag; unset flags are false
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

// ============================================================================
// Output Types
// ============================================================================

/// A supplement scheduled on a given day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DayItem {
    pub supplement_id: String,
    pub name: String,
    pub timing_hint: Option<TimingHint>,
    pub priority: i32,
    pub dose: Option<Dose>,
}

impl DayItem {
    /// `name (amount unit)` when the dose has an amount or a unit, else `name`
    pub fn label(&self) -> String {
        let dose = self.dose.as_ref();
        let parts: Vec<String> = [
            dose.and_then(|d| d.amount).map(|a| a.to_string()),
            dose.and_then(|d| d.unit.clone()),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, parts.join(" "))
        }
    }
}

/// The resolved plan for one calendar day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DayPlan {
    pub day: NaiveDate,
    pub block_id: String,
    pub block_name: String,
    pub items: Vec<DayItem>,
    /// Active events, highest priority first
    pub events: Vec<String>,
    pub is_off_week: bool,
    pub is_pulse_day: bool,
}

/// A day's items grouped by time of day, order preserved
#[derive(Debug, Default)]
pub struct TimingBuckets<'a> {
    pub morning: Vec<&'a DayItem>,
    /// `any` and items without a hint
    pub any: Vec<&'a DayItem>,
    pub evening: Vec<&'a DayItem>,
}

impl DayPlan {
    pub fn buckets(&self) -> TimingBuckets<'_> {
        let mut buckets = TimingBuckets::default();
        for item in &self.items {
            match item.timing_hint {
                Some(TimingHint::Morning) => buckets.morning.push(item),
                Some(TimingHint::Evening) => buckets.evening.push(item),
                Some(TimingHint::Any) | None => buckets.any.push(item),
            }
        }
        buckets
    }
}

/// Join item labels with ` | `
pub fn join_labels(items: &[&DayItem]) -> String {
    items.iter().map(|i| i.label()).collect::<Vec<_>>().join(" | ")
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Integer-keyed maps, written with string keys so TOML can carry them
mod int_keys {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, V>(map: &BTreeMap<u32, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        let keyed: BTreeMap<String, &V> = map.iter().map(|(k, v)| (k.to_string(), v)).collect();
        keyed.serialize(serializer)
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<u32, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        let raw = BTreeMap::<String, V>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| match k.trim().parse::<u32>() {
                Ok(key) => Ok((key, v)),
                Err(_) => Err(D::Error::custom(format!("expected integer key, found `{}`", k))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_rule_from_toml() {
        let rule: ScheduleRule = toml::from_str(
            r#"
id = "nmn_4x_week"
type = "times_per_week"
active_blocks = ["NAD"]
n = 4
fixed_days = [0, 1, 3, 4]
"#,
        )
        .unwrap();

        assert_eq!(rule.active_blocks, Some(vec!["NAD".to_string()]));
        match rule.kind {
            ScheduleRuleKind::TimesPerWeek {
                n,
                fixed_days,
                weekdays_only,
                selection_policy,
            } => {
                assert_eq!(n, 4);
                assert_eq!(fixed_days, vec![0, 1, 3, 4]);
                assert!(!weekdays_only);
                assert_eq!(selection_policy, SelectionPolicy::FixedDays);
            }
            other => panic!("Expected times_per_week, got {:?}", other),
        }
    }

    #[test]
    fn test_daily_rule_without_blocks() {
        let rule: ScheduleRule =
            serde_json::from_str(r#"{"id": "omega3_daily", "type": "daily"}"#).unwrap();
        assert_eq!(rule.active_blocks, None);
        assert_eq!(rule.kind, ScheduleRuleKind::Daily);
    }

    #[test]
    fn test_unknown_rule_kind_rejected() {
        let result: std::result::Result<ScheduleRule, _> =
            serde_json::from_str(r#"{"id": "x", "type": "fortnightly"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_event_override_tags() {
        let allow: EventOverride =
            serde_json::from_str(r#"{"effect": "allow_only", "allowed_set": ["a", "b"]}"#)
                .unwrap();
        assert_eq!(
            allow,
            EventOverride::AllowOnly {
                allowed_set: vec!["a".into(), "b".into()]
            }
        );

        let remove: EventOverride = serde_json::from_str(r#"{"effect": "remove_all"}"#).unwrap();
        assert_eq!(remove, EventOverride::RemoveAll);
    }

    #[test]
    fn test_fallback_alias() {
        let fallback: DayFallback = serde_json::from_str(r#""next_valid_day_in_month""#).unwrap();
        assert_eq!(fallback, DayFallback::LastDayOfMonth);
    }

    #[test]
    fn test_int_keyed_mapping_roundtrip() {
        let settings = PulseSelection::default();
        let toml_str = toml::to_string(&settings).unwrap();
        let parsed: PulseSelection = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.month_week_selection_mapping[&2], vec![8, 9]);
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_timing_slot_from_hint() {
        assert_eq!(TimingSlot::from(Some(TimingHint::Evening)), TimingSlot::Evening);
        assert_eq!(TimingSlot::from(None), TimingSlot::Unset);
    }

    #[test]
    fn test_item_label() {
        let mut item = DayItem {
            supplement_id: "fisetin_pulse".into(),
            name: "Fisetin".into(),
            timing_hint: Some(TimingHint::Morning),
            priority: 1000,
            dose: None,
        };
        assert_eq!(item.label(), "Fisetin");

        item.dose = Some(Dose {
            amount: Some(12.0),
            unit: Some("caps".into()),
            timing_hint: None,
        });
        assert_eq!(item.label(), "Fisetin (12 caps)");

        item.dose = Some(Dose {
            amount: Some(0.5),
            unit: None,
            timing_hint: None,
        });
        assert_eq!(item.label(), "Fisetin (0.5)");

        item.dose = Some(Dose::default());
        assert_eq!(item.label(), "Fisetin");
    }

    #[test]
    fn test_unset_flags_default_false() {
        let mut params = RunParams::default();
        params.flags.insert("enable_melissa".into(), true);
        assert!(params.flag("enable_melissa"));
        assert!(!params.flag("enable_anything_else"));
    }
}
