//! In-memory query engine over a fetched fleet.
//!
//! The engine owns the record set and nothing else: filter, sort and page
//! parameters arrive with every query, so queries are read-only and can be
//! repeated freely (e.g. on every keystroke).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use fd_protocol::{
    FieldKind, FleetRecord, QueryResult, QuerySpec, RecordField, SortSpec, VehicleStatus,
};
use log::{debug, warn};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct RecordQueryEngine {
    records: Vec<FleetRecord>,
}

/// Aggregate view of a filtered record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    pub total: usize,
    pub available: usize,
    pub rented: usize,
    pub maintenance: usize,
    pub categories: BTreeMap<String, usize>,
    /// Mean of the parseable daily rates, rounded to cents.
    pub average_daily_rate: Option<f64>,
    /// Location of the first matching record.
    pub location: Option<String>,
}

impl RecordQueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held set wholesale. Later duplicates of a `vehicleId` are
    /// dropped so the id stays a unique key.
    pub fn load(&mut self, records: Vec<FleetRecord>) {
        let mut seen = HashSet::with_capacity(records.len());
        let incoming = records.len();
        self.records = records
            .into_iter()
            .filter(|r| seen.insert(r.vehicle_id.clone()))
            .collect();
        let dropped = incoming - self.records.len();
        if dropped > 0 {
            warn!("dropped duplicate vehicle ids on load (count={dropped})");
        }
        debug!("record set loaded (count={})", self.records.len());
    }

    pub fn records(&self) -> &[FleetRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn query(&self, spec: &QuerySpec) -> QueryResult {
        let matched = self.matching(spec);
        let size = spec.page.size.max(1);
        let total_count = matched.len();
        let page_count = total_count.div_ceil(size).max(1);

        let start = spec.page.index.saturating_mul(size).min(total_count);
        let end = start.saturating_add(size).min(total_count);

        QueryResult {
            page: matched[start..end].iter().map(|r| (*r).clone()).collect(),
            total_count,
            page_count,
        }
    }

    /// Summarize every record the query's filters select; paging is ignored.
    pub fn summarize(&self, spec: &QuerySpec) -> FleetSummary {
        let matched = self.matching(spec);
        let mut summary = FleetSummary {
            total: matched.len(),
            location: matched.first().map(|r| r.location.clone()),
            ..Default::default()
        };

        let mut rate_sum = 0.0;
        let mut rate_count = 0usize;
        for record in &matched {
            match record.status {
                Some(VehicleStatus::Available) => summary.available += 1,
                Some(VehicleStatus::Rented) => summary.rented += 1,
                Some(VehicleStatus::Maintenance) => summary.maintenance += 1,
                None => {}
            }
            if !record.category.is_empty() {
                *summary
                    .categories
                    .entry(record.category.to_lowercase())
                    .or_insert(0) += 1;
            }
            if let Some(rate) = record.daily_rate.as_ref().and_then(|r| r.as_f64()) {
                rate_sum += rate;
                rate_count += 1;
            }
        }
        if rate_count > 0 {
            let mean = rate_sum / rate_count as f64;
            summary.average_daily_rate = Some((mean * 100.0).round() / 100.0);
        }
        summary
    }

    /// Sorted distinct non-empty values of a field, for filter choices.
    pub fn distinct(&self, field: RecordField) -> Vec<String> {
        self.records
            .iter()
            .map(|r| field.text_of(r).into_owned())
            .filter(|v| !v.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn matching(&self, spec: &QuerySpec) -> Vec<&FleetRecord> {
        let mut matched: Vec<&FleetRecord> =
            self.records.iter().filter(|r| matches(r, spec)).collect();
        if let Some(sort) = spec.sort {
            sort_records(&mut matched, sort);
        }
        matched
    }
}

/// True when the record passes every non-empty filter of the query.
pub fn matches(record: &FleetRecord, spec: &QuerySpec) -> bool {
    let text = spec.text_filter.trim();
    if !text.is_empty() {
        let needle = text.to_lowercase();
        let hit = RecordField::SEARCHABLE
            .iter()
            .any(|field| field.text_of(record).to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }

    spec.field_filters
        .iter()
        .all(|(field, wanted)| field_matches(record, *field, wanted))
}

fn field_matches(record: &FleetRecord, field: RecordField, wanted: &str) -> bool {
    let wanted = wanted.trim();
    if wanted.is_empty() {
        return true;
    }
    match field.kind() {
        FieldKind::Text => field
            .text_of(record)
            .to_lowercase()
            .contains(&wanted.to_lowercase()),
        FieldKind::Enumerated => field.text_of(record).to_lowercase() == wanted.to_lowercase(),
        FieldKind::Numeric => wanted
            .parse::<f64>()
            .map(|n| field.number_of(record) == n)
            .unwrap_or(false),
    }
}

/// Stable sort; equal keys keep their source order in both directions.
fn sort_records(records: &mut [&FleetRecord], sort: SortSpec) {
    records.sort_by(|a, b| {
        let ord = compare(a, b, sort.field);
        if sort.descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn compare(a: &FleetRecord, b: &FleetRecord, field: RecordField) -> Ordering {
    match field.kind() {
        FieldKind::Numeric => field.number_of(a).total_cmp(&field.number_of(b)),
        FieldKind::Text | FieldKind::Enumerated => field
            .text_of(a)
            .to_lowercase()
            .cmp(&field.text_of(b).to_lowercase()),
    }
}
