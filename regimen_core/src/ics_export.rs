//! iCalendar (RFC 5545) export of day plans.
//!
//! Every day becomes one all-day `VEVENT`. UIDs depend only on the prefix and
//! the date, so re-importing a regenerated calendar updates events in place.
//! Output uses CRLF line endings and folds lines at 75 octets.

use crate::{join_labels, DayItem, DayPlan, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;

const FOLD_LIMIT: usize = 75;

/// Calendar-level export settings
#[derive(Clone, Debug, PartialEq)]
pub struct IcsOptions {
    pub calendar_name: String,
    pub uid_prefix: String,
    /// Emit events for days with no items and no events
    pub include_empty_days: bool,
    /// Written as `DTSTAMP` on every event
    pub dtstamp: DateTime<Utc>,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            calendar_name: "Regimen".into(),
            uid_prefix: "regimen".into(),
            include_empty_days: true,
            dtstamp: DateTime::<Utc>::default(),
        }
    }
}

/// Stable per-day UID: `{prefix}-{YYYYMMDD}-{hash}@regimen`
pub fn uid_for_day(prefix: &str, day: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", prefix, day).as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}-{}@regimen", prefix, day.format("%Y%m%d"), &digest[..16])
}

/// Escape a TEXT property value
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Append `line` to `out`, folded at 75 octets without splitting characters
fn push_folded(out: &mut String, line: &str) {
    let mut start = 0;
    let mut width = 0;
    let mut limit = FOLD_LIMIT;

    for (idx, ch) in line.char_indices() {
        if width + ch.len_utf8() > limit {
            out.push_str(&line[start..idx]);
            out.push_str("\r\n ");
            start = idx;
            width = 0;
            // Continuation lines start with a space
            limit = FOLD_LIMIT - 1;
        }
        width += ch.len_utf8();
    }

    out.push_str(&line[start..]);
    out.push_str("\r\n");
}

fn summary(plan: &DayPlan) -> String {
    if plan.events.is_empty() {
        plan.block_id.clone()
    } else {
        format!("{} • {}", plan.block_id, plan.events.join(" & "))
    }
}

fn description(plan: &DayPlan) -> String {
    if plan.items.is_empty() {
        return "OFF/EMPTY DAY".into();
    }

    let buckets = plan.buckets();
    [
        bucket_line("MORNING", &buckets.morning),
        bucket_line("ANY", &buckets.any),
        bucket_line("EVENING", &buckets.evening),
    ]
    .join("\n")
}

fn bucket_line(label: &str, items: &[&DayItem]) -> String {
    if items.is_empty() {
        format!("{}: -", label)
    } else {
        format!("{}: {}", label, join_labels(items))
    }
}

fn is_empty_day(plan: &DayPlan) -> bool {
    plan.items.is_empty() && plan.events.is_empty()
}

/// Render plans as a complete calendar
pub fn render_ics(plans: &[DayPlan], options: &IcsOptions) -> String {
    let dtstamp = options.dtstamp.format("%Y%m%dT%H%M%SZ").to_string();
    let mut out = String::new();

    push_folded(&mut out, "BEGIN:VCALENDAR");
    push_folded(&mut out, "VERSION:2.0");
    push_folded(&mut out, "PRODID:-//Regimen//Schedule//EN");
    push_folded(&mut out, "CALSCALE:GREGORIAN");
    push_folded(&mut out, &format!("X-WR-CALNAME:{}", escape_text(&options.calendar_name)));

    for plan in plans {
        if !options.include_empty_days && is_empty_day(plan) {
            continue;
        }

        let start = plan.day.format("%Y%m%d");
        let end = plan
            .day
            .succ_opt()
            .map(|d| d.format("%Y%m%d").to_string())
            .unwrap_or_else(|| start.to_string());

        push_folded(&mut out, "BEGIN:VEVENT");
        push_folded(&mut out, &format!("UID:{}", uid_for_day(&options.uid_prefix, plan.day)));
        push_folded(&mut out, &format!("DTSTAMP:{}", dtstamp));
        push_folded(&mut out, &format!("DTSTART;VALUE=DATE:{}", start));
        push_folded(&mut out, &format!("DTEND;VALUE=DATE:{}", end));
        push_folded(&mut out, &format!("SUMMARY:{}", escape_text(&summary(plan))));
        push_folded(&mut out, &format!("DESCRIPTION:{}", escape_text(&description(plan))));
        push_folded(&mut out, "END:VEVENT");
    }

    push_folded(&mut out, "END:VCALENDAR");
    out
}

/// Export plans to an `.ics` file
///
/// Returns the number of events written.
pub fn export_ics(plans: &[DayPlan], path: &Path, options: &IcsOptions) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let calendar = render_ics(plans, options);
    std::fs::write(path, &calendar)?;

    let written = plans
        .iter()
        .filter(|p| options.include_empty_days || !is_empty_day(p))
        .count();
    tracing::info!("Wrote {} calendar events to {:?}", written, path);
    Ok(written)
}
