use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::decode::{self, JobCardRecord, SampleRecord};

/// External sample-lookup collaborator. Implementations own transport,
/// retries and timeouts; this crate only consumes the per-key outcome.
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn fetch(&self, report_no: &str) -> anyhow::Result<Vec<SampleRecord>>;
}

/// Fan-in product of the per-report sample fetches: the successful matches
/// keyed by report number, plus the keys whose lookup is known to have
/// failed. A failed key simply has no match; it never aborts a load.
#[derive(Debug, Clone, Default)]
pub struct SampleLookup {
    samples: HashMap<String, SampleRecord>,
    failed: BTreeSet<String>,
}

impl SampleLookup {
    pub fn get(&self, report_no: &str) -> Option<&SampleRecord> {
        self.samples.get(report_no)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn failed_keys(&self) -> &BTreeSet<String> {
        &self.failed
    }

    /// Register a fetched sample under its own report number. The first
    /// sample seen for a key wins; later duplicates are ignored.
    pub fn insert(&mut self, sample: SampleRecord) {
        let key = sample.report_number.trim();
        if key.is_empty() {
            return;
        }
        let key = key.to_string();
        self.samples.entry(key).or_insert(sample);
    }

    pub fn mark_failed(&mut self, report_no: impl Into<String>) {
        self.failed.insert(report_no.into());
    }

    /// Build a lookup from raw per-report payloads that were fetched
    /// upstream, e.g. handed over the IPC boundary. `null` payloads stand
    /// for lookups that already failed; a payload that does not decode is
    /// treated the same way instead of poisoning the whole load.
    pub fn from_payloads<'a, I>(payloads: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut lookup = SampleLookup::default();
        for payload in payloads {
            match decode::decode_samples(payload) {
                Ok(samples) => {
                    for sample in samples {
                        lookup.insert(sample);
                    }
                }
                Err(e) => warn!("skipping undecodable sample payload: {e}"),
            }
        }
        lookup
    }
}

/// Distinct non-blank report numbers, in first-encounter order.
pub fn distinct_report_nos(records: &[JobCardRecord]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for record in records {
        let report_no = record.report_no.trim();
        if report_no.is_empty() {
            continue;
        }
        if seen.insert(report_no.to_string()) {
            out.push(report_no.to_string());
        }
    }
    out
}

/// Issue one sample lookup per report number, all concurrently, and gather
/// whatever comes back. An individual failure degrades that key to "no
/// match" and is recorded; the other lookups keep going.
pub async fn fetch_sample_lookup(
    source: Arc<dyn SampleSource>,
    report_nos: &[String],
) -> SampleLookup {
    let mut tasks = JoinSet::new();
    for report_no in report_nos {
        let source = Arc::clone(&source);
        let report_no = report_no.clone();
        tasks.spawn(async move {
            let outcome = source.fetch(&report_no).await;
            (report_no, outcome)
        });
    }

    let mut lookup = SampleLookup::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((report_no, Ok(samples))) => {
                if samples.is_empty() {
                    debug!("no sample on file for report {report_no}");
                }
                for sample in samples {
                    lookup.insert(sample);
                }
            }
            Ok((report_no, Err(e))) => {
                warn!("sample lookup failed for report {report_no}: {e:#}");
                lookup.mark_failed(report_no);
            }
            Err(e) => warn!("sample lookup task died: {e}"),
        }
    }
    lookup
}
