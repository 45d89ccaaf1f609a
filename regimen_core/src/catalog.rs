//! Default regimen model.
//!
//! This module provides the built-in block rotation, supplements, conflicts
//! and events used when no model file is configured.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Cached default model - built once and reused across all operations
static DEFAULT_MODEL: Lazy<RegimenModel> = Lazy::new(build_default_model_internal);

/// Get a reference to the cached default model
pub fn get_default_model() -> &'static RegimenModel {
    &DEFAULT_MODEL
}

/// Builds the default regimen model
///
/// **Note**: For production use, prefer `get_default_model()` which returns a
/// cached reference. This function is retained for tests and for callers
/// that want to modify a copy.
pub fn build_default_model() -> RegimenModel {
    build_default_model_internal()
}

const CORE_SET: [&str; 5] = ["omega3_nko", "mg_zn_b6", "collagen", "probiotic", "d3k2"];
const WEEKDAYS: [u32; 5] = [0, 1, 2, 3, 4];

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn blocks(values: &[&str]) -> Option<Vec<String>> {
    Some(ids(values))
}

fn timed(hint: TimingHint) -> Option<Dose> {
    Some(Dose {
        amount: None,
        unit: None,
        timing_hint: Some(hint),
    })
}

fn supplement(
    id: &str,
    name: &str,
    default_dose: Option<Dose>,
    tags: &[&str],
    priority: i32,
    schedule_rules: Vec<ScheduleRule>,
) -> Supplement {
    Supplement {
        id: id.into(),
        name: name.into(),
        default_dose,
        tags: ids(tags),
        constraints: vec![],
        schedule_rules,
        priority,
        notes: None,
    }
}

fn rule(id: &str, active_blocks: Option<Vec<String>>, kind: ScheduleRuleKind) -> ScheduleRule {
    ScheduleRule {
        id: id.into(),
        active_blocks,
        kind,
    }
}

fn week_pattern(days: &[u32]) -> ScheduleRuleKind {
    ScheduleRuleKind::WeekPattern {
        days_included: days.to_vec(),
    }
}

fn fixed_days(days: &[u32]) -> ScheduleRuleKind {
    ScheduleRuleKind::TimesPerWeek {
        n: days.len() as u32,
        selection_policy: SelectionPolicy::FixedDays,
        fixed_days: days.to_vec(),
        weekdays_only: false,
    }
}

fn cycle(on_weeks: u32, off_weeks: u32) -> ScheduleRuleKind {
    ScheduleRuleKind::CycleWeeks {
        on_weeks,
        off_weeks,
        alignment: CycleAlignment::CustomDate,
    }
}

fn constrained(mut s: Supplement, id: &str, kind: ConstraintKind) -> Supplement {
    s.constraints.push(Constraint {
        id: id.into(),
        kind,
    });
    s
}

/// Internal function that actually builds the model
fn build_default_model_internal() -> RegimenModel {
    use ScheduleRuleKind::{Daily, EventOnly, Optional, TimesPerWeek};
    use TimingHint::{Evening, Morning};

    let mut list: Vec<Supplement> = Vec::new();

    // ========================================================================
    // Core (daily, removable by the off-week)
    // ========================================================================

    for (id, name) in [
        ("omega3_nko", "Omega-3 NKO"),
        ("mg_zn_b6", "Mg + Zn + B6"),
        ("collagen", "Collagen"),
        ("probiotic", "Probiotics"),
    ] {
        list.push(supplement(
            id,
            name,
            None,
            &["CORE"],
            100,
            vec![rule(&format!("{}_daily", id), None, Daily)],
        ));
    }

    let mut d3k2 = constrained(
        supplement("d3k2", "D3K2", None, &["CORE"], 60, vec![rule("d3k2_daily", None, Daily)]),
        "d3k2_seasonal",
        ConstraintKind::Seasonal {
            months_included: vec![10, 11, 12, 1, 2, 3],
        },
    );
    d3k2.notes = Some("Winter months only.".into());
    list.push(d3k2);

    // ========================================================================
    // NAD
    // ========================================================================

    list.push(supplement(
        "nmn",
        "NMN",
        timed(Morning),
        &["NAD"],
        80,
        vec![rule("nmn_4x_week", blocks(&["NAD"]), fixed_days(&[0, 1, 3, 4]))],
    ));
    list.push(supplement(
        "pterostilbene_resveratrol",
        "Pterostilbene / Resveratrol",
        timed(Morning),
        &["NAD"],
        70,
        vec![rule("ptr_same_as_nmn", blocks(&["NAD"]), week_pattern(&[0, 1, 3, 4]))],
    ));
    list.push(constrained(
        supplement(
            "astragalus",
            "Astragalus",
            None,
            &["NAD"],
            55,
            vec![rule("astragalus_cycle_12_4", None, cycle(12, 4))],
        ),
        "astragalus_allowed_blocks",
        ConstraintKind::AllowedBlocks {
            blocks: ids(&["NAD"]),
        },
    ));
    list.push(supplement(
        "phosphatidylserine",
        "Phosphatidylserine",
        timed(Evening),
        &["NAD"],
        50,
        vec![rule("ps_5on2off", blocks(&["NAD"]), week_pattern(&WEEKDAYS))],
    ));
    list.push(supplement(
        "lions_mane",
        "Lion's Mane",
        timed(Morning),
        &["NAD", "MITO"],
        45,
        vec![rule("lm_5on2off", blocks(&["NAD", "MITO"]), week_pattern(&WEEKDAYS))],
    ));
    list.push(supplement(
        "ca_akg",
        "Ca-AKG",
        timed(Morning),
        &["NAD", "MITO"],
        45,
        vec![
            rule("caakg_nad_2x", blocks(&["NAD"]), fixed_days(&[1, 4])),
            rule("caakg_mito_4x", blocks(&["MITO"]), fixed_days(&[0, 1, 3, 5])),
        ],
    ));

    // ========================================================================
    // MITO
    // ========================================================================

    let mut q10 = supplement(
        "q10_pqq_spermidine",
        "Q10 + PQQ + Spermidine (combo)",
        timed(Morning),
        &["MITO", "NAD"],
        60,
        vec![rule(
            "q10pqqsperm_5on2off",
            blocks(&["MITO", "NAD"]),
            week_pattern(&WEEKDAYS),
        )],
    );
    q10.notes = Some("3-in-1 product, also covers Q10 during NAD.".into());
    list.push(q10);
    list.push(supplement(
        "cordyceps",
        "Cordyceps",
        timed(Morning),
        &["MITO"],
        35,
        vec![rule("cordyceps_4x", blocks(&["MITO"]), fixed_days(&[0, 2, 3, 5]))],
    ));
    list.push(supplement(
        "astaxanthin",
        "Astaxanthin",
        None,
        &["MITO"],
        30,
        vec![
            rule("astax_daily_mito", blocks(&["MITO"]), Daily),
            rule("astax_3x_else", blocks(&["ANTIAGE", "DETOX"]), fixed_days(&[0, 2, 4])),
        ],
    ));
    list.push(supplement(
        "gotu_kola",
        "Gotu Kola",
        None,
        &["MITO", "DETOX"],
        30,
        vec![rule("gotu_5on2off", blocks(&["MITO", "DETOX"]), week_pattern(&WEEKDAYS))],
    ));

    // ========================================================================
    // ANTI-AGE
    // ========================================================================

    list.push(supplement(
        "r_ala",
        "R-ALA",
        timed(Morning),
        &["ANTIAGE"],
        55,
        vec![rule("rala_5on2off", blocks(&["ANTIAGE"]), week_pattern(&WEEKDAYS))],
    ));
    for (id, name, priority) in [
        ("benfotiamine", "Benfotiamine", 45),
        ("carnosine", "L-Carnosine", 45),
        ("curcumin_piperine", "Curcumin + Piperine", 50),
        ("lycopene", "Lycopene", 45),
        ("hawthorn", "Hawthorn Extract", 25),
    ] {
        list.push(supplement(
            id,
            name,
            None,
            &["ANTIAGE"],
            priority,
            vec![rule(&format!("{}_daily", id), blocks(&["ANTIAGE"]), Daily)],
        ));
    }
    list.push(supplement(
        "berberine",
        "Berberine",
        None,
        &["ANTIAGE"],
        40,
        vec![rule("berb_3on", blocks(&["ANTIAGE"]), week_pattern(&[0, 2, 4]))],
    ));
    list.push(supplement(
        "opc",
        "OPC",
        None,
        &["ANTIAGE"],
        35,
        vec![
            rule("opc_daily_antiage", blocks(&["ANTIAGE"]), Daily),
            rule("opc_3x_else", blocks(&["NAD", "MITO", "DETOX"]), fixed_days(&[0, 2, 4])),
        ],
    ));
    list.push(supplement(
        "beet_extract",
        "Beetroot Extract",
        None,
        &["ANTIAGE"],
        25,
        vec![rule("beet_4x", blocks(&["ANTIAGE"]), fixed_days(&[0, 2, 4, 5]))],
    ));
    list.push(supplement(
        "aronia_c",
        "Aronia + Vitamin C",
        None,
        &["ANTIAGE", "MITO"],
        25,
        vec![rule("aronia_daily", blocks(&["ANTIAGE", "MITO"]), Daily)],
    ));
    list.push(supplement(
        "saw_palmetto",
        "Saw Palmetto",
        None,
        &["ANTIAGE"],
        20,
        vec![rule("sawp_3x", blocks(&["ANTIAGE"]), fixed_days(&[0, 2, 4]))],
    ));

    // ========================================================================
    // DETOX
    // ========================================================================

    list.push(supplement(
        "nac",
        "NAC",
        None,
        &["DETOX"],
        60,
        vec![rule("nac_5on2off", blocks(&["DETOX"]), week_pattern(&WEEKDAYS))],
    ));
    let mut selenium = supplement(
        "selenium",
        "Selenium",
        None,
        &["DETOX"],
        55,
        vec![rule("sel_same_as_nac", blocks(&["DETOX"]), week_pattern(&WEEKDAYS))],
    );
    selenium.notes = Some("Taken together with NAC (combined product).".into());
    list.push(selenium);
    for (id, name, priority) in [
        ("silymarin", "Silymarin", 35),
        ("fitolizyna", "Fitolizyna", 25),
        ("chanca_piedra", "Chanca Piedra", 25),
    ] {
        list.push(supplement(
            id,
            name,
            None,
            &["DETOX"],
            priority,
            vec![rule(&format!("{}_daily", id), blocks(&["DETOX"]), Daily)],
        ));
    }
    list.push(supplement(
        "lecithin_sunflower",
        "Sunflower Lecithin",
        None,
        &["DETOX"],
        25,
        vec![rule("lec_4x", blocks(&["DETOX"]), fixed_days(&[0, 2, 3, 5]))],
    ));
    list.push(supplement(
        "melissa",
        "Lemon Balm",
        timed(Evening),
        &["DETOX"],
        5,
        vec![rule(
            "mel_optional",
            blocks(&["DETOX"]),
            Optional {
                flag: "enable_melissa".into(),
            },
        )],
    ));
    list.push(supplement(
        "ashwagandha",
        "Ashwagandha",
        timed(Evening),
        &["DETOX", "ANTIAGE"],
        30,
        vec![rule("ash_cycle_8_4", blocks(&["DETOX", "ANTIAGE"]), cycle(8, 4))],
    ));

    // ========================================================================
    // NEURO
    // ========================================================================

    for (id, name) in [("l_theanine", "L-Theanine"), ("apigenin", "Apigenin")] {
        list.push(supplement(
            id,
            name,
            timed(Evening),
            &["NEURO"],
            20,
            vec![rule(&format!("{}_daily", id), None, Daily)],
        ));
    }
    list.push(constrained(
        supplement(
            "l_tyrosine",
            "L-Tyrosine",
            timed(Morning),
            &["NEURO"],
            15,
            vec![rule(
                "tyr_2x_week",
                None,
                TimesPerWeek {
                    n: 2,
                    selection_policy: SelectionPolicy::FixedDays,
                    fixed_days: vec![1, 3],
                    weekdays_only: true,
                },
            )],
        ),
        "tyr_exclude_blocks_detox",
        ConstraintKind::ExcludeBlocks {
            blocks: ids(&["DETOX"]),
        },
    ));
    list.push(constrained(
        supplement(
            "ginkgo",
            "Ginkgo Biloba",
            timed(Morning),
            &["NEURO"],
            15,
            vec![rule("ginkgo_3x", None, fixed_days(&[0, 2, 4]))],
        ),
        "ginkgo_exclude_blocks_nad",
        ConstraintKind::ExcludeBlocks {
            blocks: ids(&["NAD"]),
        },
    ));

    // ========================================================================
    // Pulse (event-driven)
    // ========================================================================

    list.push(supplement(
        "fisetin_pulse",
        "Fisetin",
        Some(Dose {
            amount: Some(12.0),
            unit: Some("caps".into()),
            timing_hint: Some(Morning),
        }),
        &["PULSE"],
        1000,
        vec![rule(
            "fisetin_event_only",
            None,
            EventOnly {
                event_id: "pulse_fisetin".into(),
            },
        )],
    ));

    let supplements: BTreeMap<String, Supplement> =
        list.into_iter().map(|s| (s.id.clone(), s)).collect();

    // ========================================================================
    // Blocks and calendar
    // ========================================================================

    let block_list = [
        ("NAD", "NAD"),
        ("MITO", "MITO"),
        ("ANTIAGE", "ANTI-AGE"),
        ("DETOX", "DETOX"),
    ];
    let block_table: BTreeMap<String, Block> = block_list
        .iter()
        .map(|(id, name)| {
            (
                id.to_string(),
                Block {
                    id: id.to_string(),
                    name: name.to_string(),
                    description: None,
                    enabled: true,
                },
            )
        })
        .collect();

    let rotation = [
        "NAD", "MITO", "ANTIAGE", "DETOX", "NAD", "MITO", "ANTIAGE", "DETOX", "NAD", "ANTIAGE",
        "MITO", "DETOX",
    ];
    let block_calendar: BTreeMap<u32, String> = rotation
        .iter()
        .enumerate()
        .map(|(i, b)| (i as u32 + 1, b.to_string()))
        .collect();

    // ========================================================================
    // Conflicts, exceptions, events
    // ========================================================================

    let mut pulse_allowed = ids(&CORE_SET);
    pulse_allowed.push("fisetin_pulse".into());

    let conflicts = Conflicts {
        block_exclusions: BTreeMap::from([
            (
                "NAD".into(),
                ids(&["curcumin_piperine", "lycopene", "astaxanthin", "r_ala"]),
            ),
            ("DETOX".into(), ids(&["q10_pqq_spermidine"])),
            ("MITO".into(), vec![]),
            ("ANTIAGE".into(), vec![]),
        ]),
        supplement_exclusions: BTreeMap::from([(
            "nmn".into(),
            ids(&["curcumin_piperine", "astaxanthin", "lycopene"]),
        )]),
        event_overrides: BTreeMap::from([
            (
                "pulse_fisetin".into(),
                EventOverride::AllowOnly {
                    allowed_set: pulse_allowed,
                },
            ),
            ("off_week".into(), EventOverride::RemoveAll),
        ]),
    };

    let global_exceptions = vec![GlobalException::OffWeek(OffWeekException {
        id: "off_week".into(),
        duration_days: 7,
        effect: ExceptionEffect::RemoveAll,
        priority: 10000,
        hard_exclusion_of_events: ids(&["pulse_fisetin"]),
        notes: Some("The off-week removes everything, including the core set.".into()),
    })];

    let events = vec![EventDefinition {
        id: "pulse_fisetin".into(),
        kind: EventKind::Pulse,
        months: vec![3, 6, 9, 12],
        length_days: 2,
        month_week_selection: 2,
        time_of_day: Some(Morning),
        capsules_per_day: Some(12),
        override_id: "pulse_fisetin".into(),
        priority: 9000,
    }];

    RegimenModel {
        pipeline: PipelinePhase::ORDER.to_vec(),
        settings: EngineSettings::default(),
        block_calendar,
        blocks: block_table,
        core_set: ids(&CORE_SET),
        conflicts,
        global_exceptions,
        events,
        supplements,
        validation: ValidationRules {
            pipeline_must_equal: Some(PipelinePhase::ORDER.to_vec()),
            ..ValidationRules::default()
        },
        ordering: OrderingRules::default(),
    }
}

/// Small hand-sized model shared by unit tests across the crate
#[cfg(test)]
pub(crate) fn minimal_model() -> RegimenModel {
    let supplement = |id: &str, priority: i32, hint: Option<TimingHint>| Supplement {
        id: id.into(),
        name: id.to_uppercase(),
        default_dose: hint.map(|h| Dose {
            amount: None,
            unit: None,
            timing_hint: Some(h),
        }),
        tags: vec![],
        constraints: vec![],
        schedule_rules: vec![],
        priority,
        notes: None,
    };

    let supplements = [
        supplement("core_a", 100, Some(TimingHint::Morning)),
        supplement("core_b", 90, None),
        supplement("extra", 10, Some(TimingHint::Evening)),
    ]
    .into_iter()
    .map(|s| (s.id.clone(), s))
    .collect();

    let blocks = ["A", "B"]
        .iter()
        .map(|id| {
            (
                id.to_string(),
                Block {
                    id: id.to_string(),
                    name: format!("Block {}", id),
                    description: None,
                    enabled: true,
                },
            )
        })
        .collect();

    RegimenModel {
        pipeline: PipelinePhase::ORDER.to_vec(),
        settings: EngineSettings::default(),
        block_calendar: (1..=12)
            .map(|m| (m, if m % 2 == 1 { "A" } else { "B" }.to_string()))
            .collect(),
        blocks,
        core_set: vec!["core_a".into(), "core_b".into()],
        conflicts: Conflicts::default(),
        global_exceptions: vec![],
        events: vec![],
        supplements,
        validation: ValidationRules::default(),
        ordering: OrderingRules::default(),
    }
}
