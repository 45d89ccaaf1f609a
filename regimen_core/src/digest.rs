//! Plain-text digests of day plans, suitable as e-mail bodies.

use crate::{DayItem, DayPlan, Error, Result};

const SEPARATOR: &str = "----------------------------------------";

/// Subject line plus body text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub body: String,
}

impl Digest {
    /// Digest of a single day
    pub fn for_day(plan: &DayPlan) -> Self {
        Digest {
            subject: subject(plan),
            body: build_day_text(plan),
        }
    }

    /// Digest of consecutive days; the subject names the date range
    pub fn for_window(plans: &[DayPlan]) -> Result<Self> {
        match plans {
            [] => Err(Error::Domain("Cannot build a digest for zero days".into())),
            [single] => Ok(Self::for_day(single)),
            [first, .., last] => Ok(Digest {
                subject: format!("Regimen — {} to {}", first.day, last.day),
                body: build_window_digest(plans),
            }),
        }
    }
}

/// `Regimen — {date} ({block})`
pub fn subject(plan: &DayPlan) -> String {
    format!("Regimen — {} ({})", plan.day, plan.block_id)
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[&DayItem]) {
    lines.push(String::new());
    lines.push(format!("{}:", title));
    if items.is_empty() {
        lines.push("- (none)".into());
    } else {
        lines.extend(items.iter().map(|item| format!("- {}", item.label())));
    }
}

/// Text for one day: header lines, then one bullet list per time of day
pub fn build_day_text(plan: &DayPlan) -> String {
    let events = if plan.events.is_empty() {
        "-".to_string()
    } else {
        plan.events.join(", ")
    };

    let mut lines = vec![
        format!("DATE: {}", plan.day),
        format!("BLOCK: {}", plan.block_id),
        format!("EVENTS: {}", events),
    ];
    if plan.is_off_week {
        lines.push("OFF WEEK".into());
    }

    let buckets = plan.buckets();
    push_section(&mut lines, "MORNING", &buckets.morning);
    push_section(&mut lines, "DURING THE DAY", &buckets.any);
    push_section(&mut lines, "EVENING", &buckets.evening);

    lines.join("\n")
}

/// Day texts for a rolling window, separated by a rule line
pub fn build_window_digest(plans: &[DayPlan]) -> String {
    plans
        .iter()
        .map(build_day_text)
        .collect::<Vec<_>>()
        .join(&format!("\n\n{}\n\n", SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dose, TimingHint};
    use chrono::NaiveDate;

    fn plan(day: u32, items: Vec<DayItem>, events: &[&str]) -> DayPlan {
        DayPlan {
            day: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            block_id: "NAD".into(),
            block_name: "NAD".into(),
            items,
            events: events.iter().map(|e| e.to_string()).collect(),
            is_off_week: false,
            is_pulse_day: !events.is_empty(),
        }
    }

    fn item(name: &str, hint: Option<TimingHint>, dose: Option<Dose>) -> DayItem {
        DayItem {
            supplement_id: name.to_lowercase(),
            name: name.into(),
            timing_hint: hint,
            priority: 0,
            dose,
        }
    }

    #[test]
    fn test_day_text_layout() {
        let nmn = item(
            "NMN",
            Some(TimingHint::Morning),
            Some(Dose {
                amount: Some(500.0),
                unit: Some("mg".into()),
                timing_hint: Some(TimingHint::Morning),
            }),
        );
        let p = plan(5, vec![nmn, item("Collagen", None, None)], &[]);

        let expected = "\
DATE: 2026-01-05
BLOCK: NAD
EVENTS: -

MORNING:
- NMN (500 mg)

DURING THE DAY:
- Collagen

EVENING:
- (none)";
        assert_eq!(build_day_text(&p), expected);
    }

    #[test]
    fn test_off_week_day_text() {
        let mut p = plan(5, vec![], &[]);
        p.is_off_week = true;

        let text = build_day_text(&p);
        assert!(text.contains("OFF WEEK"));
        assert_eq!(text.matches("- (none)").count(), 3);
    }

    #[test]
    fn test_subject() {
        let p = plan(5, vec![], &["pulse_fisetin"]);
        assert_eq!(subject(&p), "Regimen — 2026-01-05 (NAD)");
        assert!(build_day_text(&p).contains("EVENTS: pulse_fisetin"));
    }

    #[test]
    fn test_window_digest() {
        let plans = vec![plan(5, vec![], &[]), plan(6, vec![], &[]), plan(7, vec![], &[])];
        let digest = Digest::for_window(&plans).unwrap();

        assert_eq!(digest.subject, "Regimen — 2026-01-05 to 2026-01-07");
        assert_eq!(digest.body.matches(SEPARATOR).count(), 2);
        let first = digest.body.find("DATE: 2026-01-05").unwrap();
        let last = digest.body.find("DATE: 2026-01-07").unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_window_of_one_is_day_digest() {
        let plans = vec![plan(5, vec![], &[])];
        assert_eq!(Digest::for_window(&plans).unwrap(), Digest::for_day(&plans[0]));
    }

    #[test]
    fn test_empty_window_rejected() {
        assert!(matches!(Digest::for_window(&[]), Err(Error::Domain(_))));
    }
}
