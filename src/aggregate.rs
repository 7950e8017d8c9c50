use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::decode::JobCardRecord;
use crate::lookup::SampleLookup;

/// Shown wherever a display field has no value from any source.
pub const PLACEHOLDER: &str = "—";
/// Lab name used when neither the row nor its sample carries one.
pub const DEFAULT_LAB_NAME: &str = "EPA Labs Private Limited";
/// Rows without a report number all collapse into this one bucket. They are
/// kept visible on purpose; dropping them would hide data-entry mistakes.
pub const UNKNOWN_REPORT_NO: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobCardStatus {
    Active,
    Completed,
    Inactive,
}

impl JobCardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobCardStatus::Active => "active",
            JobCardStatus::Completed => "completed",
            JobCardStatus::Inactive => "inactive",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobCardStatus::Active => "Active",
            JobCardStatus::Completed => "Completed",
            JobCardStatus::Inactive => "Inactive",
        }
    }
}

/// Review lifecycle of a job card, read off its approval and check flags.
pub fn derive_status(record: &JobCardRecord) -> JobCardStatus {
    // Nothing done yet.
    if !record.is_approved && !record.is_technician_checked && !record.is_quality_checked {
        return JobCardStatus::Inactive;
    }
    // Approved by the analyst, no review check yet.
    if record.is_approved && !record.is_technician_checked && !record.is_quality_checked {
        return JobCardStatus::Active;
    }
    // Approved and at least one of the two review checks done.
    if record.is_approved && (record.is_technician_checked || record.is_quality_checked) {
        return JobCardStatus::Completed;
    }
    // A check flag without approval. Legacy behavior files these under
    // inactive and downstream views rely on that.
    JobCardStatus::Inactive
}

/// One report's worth of job cards, plus the display fields resolved for it.
/// Rebuilt from scratch on every load; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedJobCard {
    pub report_no: String,
    pub sample_number: String,
    pub sample_description: String,
    pub project_name: String,
    pub lab_name: String,
    pub status: JobCardStatus,
    pub parameters: Vec<JobCardRecord>,
    pub analyst_name: String,
    pub created_at: String,
}

impl GroupedJobCard {
    fn matches_query(&self, needle: &str) -> bool {
        self.report_no.to_lowercase().contains(needle)
            || self.sample_number.to_lowercase().contains(needle)
            || self.sample_description.to_lowercase().contains(needle)
            || self.project_name.to_lowercase().contains(needle)
            || self.lab_name.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub all: usize,
    pub active: usize,
    pub inactive: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(JobCardStatus),
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Backfill sample-derived display fields onto each row. A row keeps its own
/// non-blank values; only `sampleNumber` is always taken from the match,
/// since rows never carry one natively. Rows with no matching sample pass
/// through untouched.
pub fn enrich(records: Vec<JobCardRecord>, lookup: &SampleLookup) -> Vec<JobCardRecord> {
    records
        .into_iter()
        .map(|mut record| {
            let Some(sample) = lookup.get(record.report_no.trim()) else {
                return record;
            };

            record.sample_number = Some(
                non_blank(sample.sample_number.as_deref())
                    .unwrap_or(PLACEHOLDER)
                    .to_string(),
            );
            record.sample_description = Some(
                non_blank(record.sample_description.as_deref())
                    .or_else(|| non_blank(sample.sample_description.as_deref()))
                    .unwrap_or(PLACEHOLDER)
                    .to_string(),
            );
            record.project_name = Some(
                non_blank(record.project_name.as_deref())
                    .or_else(|| non_blank(sample.project_name.as_deref()))
                    .unwrap_or(PLACEHOLDER)
                    .to_string(),
            );
            record.lab_name = Some(
                non_blank(record.lab_name.as_deref())
                    .or_else(|| non_blank(sample.lab_name.as_deref()))
                    .unwrap_or(DEFAULT_LAB_NAME)
                    .to_string(),
            );
            record
        })
        .collect()
}

fn group_key(record: &JobCardRecord) -> String {
    let report_no = record.report_no.trim();
    if report_no.is_empty() {
        UNKNOWN_REPORT_NO.to_string()
    } else {
        record.report_no.clone()
    }
}

fn seed_group(key: &str, record: &JobCardRecord) -> GroupedJobCard {
    GroupedJobCard {
        report_no: key.to_string(),
        sample_number: PLACEHOLDER.to_string(),
        sample_description: non_blank(record.sample_description.as_deref())
            .or_else(|| non_blank(Some(record.paremeter_type.as_str())))
            .unwrap_or(PLACEHOLDER)
            .to_string(),
        project_name: non_blank(record.project_name.as_deref())
            .unwrap_or(PLACEHOLDER)
            .to_string(),
        lab_name: non_blank(record.lab_name.as_deref())
            .unwrap_or(DEFAULT_LAB_NAME)
            .to_string(),
        // Status comes from the report's lead row only; a later row in the
        // same report never changes it.
        status: derive_status(record),
        parameters: Vec::new(),
        analyst_name: record.analyst_name.clone(),
        created_at: record.created_at.clone(),
    }
}

fn created_at_ts(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    None
}

/// Collapse the flat row list into one group per report number, newest
/// first. Every row lands in exactly one group, in source order within it.
pub fn group(records: &[JobCardRecord]) -> Vec<GroupedJobCard> {
    let mut encounter_order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, GroupedJobCard> = HashMap::new();

    for record in records {
        let key = group_key(record);
        let slot = match by_key.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                encounter_order.push(key.clone());
                entry.insert(seed_group(&key, record))
            }
        };
        slot.parameters.push(record.clone());
    }

    let mut groups: Vec<GroupedJobCard> = encounter_order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect();

    // Second pass: a group's sample number comes from whichever of its rows
    // picked one up during enrichment. The unknown bucket never matches a
    // sample, so it keeps the placeholder.
    for group in &mut groups {
        if group.report_no == UNKNOWN_REPORT_NO {
            continue;
        }
        if let Some(sample_number) = group.parameters.iter().find_map(|p| {
            non_blank(p.sample_number.as_deref()).filter(|s| *s != PLACEHOLDER)
        }) {
            group.sample_number = sample_number.to_string();
        }
    }

    // Unparsable or missing timestamps sort as the oldest; the stable sort
    // keeps first-encounter order on ties.
    groups.sort_by_key(|g| std::cmp::Reverse(created_at_ts(&g.created_at).unwrap_or(i64::MIN)));
    groups
}

/// Status and free-text filters composed with AND. Returns a fresh list;
/// the grouped collection itself is never touched.
pub fn filter(groups: &[GroupedJobCard], status: StatusFilter, query: &str) -> Vec<GroupedJobCard> {
    let needle = query.trim().to_lowercase();
    groups
        .iter()
        .filter(|g| match status {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => g.status == wanted,
        })
        .filter(|g| needle.is_empty() || g.matches_query(&needle))
        .cloned()
        .collect()
}

/// Tallies over the full grouped collection, regardless of any active filter.
pub fn counts(groups: &[GroupedJobCard]) -> StatusCounts {
    let mut counts = StatusCounts {
        all: groups.len(),
        ..StatusCounts::default()
    };
    for group in groups {
        match group.status {
            JobCardStatus::Active => counts.active += 1,
            JobCardStatus::Inactive => counts.inactive += 1,
            JobCardStatus::Completed => counts.completed += 1,
        }
    }
    counts
}
