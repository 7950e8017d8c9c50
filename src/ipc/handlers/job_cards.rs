use log::debug;
use serde_json::json;

use crate::aggregate::{self, JobCardStatus, StatusFilter};
use crate::decode;
use crate::ipc::error::{err, err_decode, ok};
use crate::ipc::types::{AppState, LoadedView, Request};
use crate::lookup::{self, SampleLookup};

fn parse_status_filter(req: &Request) -> Result<StatusFilter, serde_json::Value> {
    match req
        .params
        .get("status")
        .and_then(|v| v.as_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        None | Some("all") => Ok(StatusFilter::All),
        Some("active") => Ok(StatusFilter::Only(JobCardStatus::Active)),
        Some("inactive") => Ok(StatusFilter::Only(JobCardStatus::Inactive)),
        Some("completed") => Ok(StatusFilter::Only(JobCardStatus::Completed)),
        Some(other) => Err(err(
            &req.id,
            "bad_params",
            "status must be one of: all, active, inactive, completed",
            Some(json!({ "status": other })),
        )),
    }
}

fn loaded_view<'a>(state: &'a AppState, req: &Request) -> Result<&'a LoadedView, serde_json::Value> {
    state
        .view
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_job_cards", "load job cards first", None))
}

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(records_raw) = req.params.get("records") else {
        return err(&req.id, "bad_params", "missing params.records", None);
    };
    let analyst_name = req
        .params
        .get("analystName")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let records = match decode::decode_job_cards(records_raw) {
        Ok(records) => records,
        Err(e) => return err_decode(&req.id, e),
    };

    let sample_payloads = req
        .params
        .get("samples")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().collect::<Vec<_>>())
        .unwrap_or_default();
    let sample_lookup = SampleLookup::from_payloads(sample_payloads);

    let requested = lookup::distinct_report_nos(&records);
    let unmatched_reports: Vec<String> = requested
        .into_iter()
        .filter(|report_no| sample_lookup.get(report_no).is_none())
        .collect();
    debug!(
        "load: {} rows, {} samples matched, {} reports unmatched",
        records.len(),
        sample_lookup.len(),
        unmatched_reports.len()
    );

    let enriched = aggregate::enrich(records, &sample_lookup);
    let groups = aggregate::group(&enriched);
    let counts = aggregate::counts(&groups);

    let view = LoadedView {
        analyst_name,
        groups,
        counts,
        unmatched_reports,
    };
    let result = json!({
        "analystName": view.analyst_name,
        "groups": view.groups,
        "counts": view.counts,
        "unmatchedReports": view.unmatched_reports,
    });
    state.view = Some(view);
    ok(&req.id, result)
}

fn handle_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = match loaded_view(state, req) {
        Ok(view) => view,
        Err(resp) => return resp,
    };
    let status = match parse_status_filter(req) {
        Ok(status) => status,
        Err(resp) => return resp,
    };
    let query = req.params.get("query").and_then(|v| v.as_str()).unwrap_or("");

    let groups = aggregate::filter(&view.groups, status, query);
    // Counts always describe the unfiltered collection.
    ok(
        &req.id,
        json!({
            "groups": groups,
            "counts": view.counts,
        }),
    )
}

fn handle_counts(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = match loaded_view(state, req) {
        Ok(view) => view,
        Err(resp) => return resp,
    };
    ok(&req.id, json!({ "counts": view.counts }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "jobCards.load" => Some(handle_load(state, req)),
        "jobCards.view" => Some(handle_view(state, req)),
        "jobCards.counts" => Some(handle_counts(state, req)),
        _ => None,
    }
}
