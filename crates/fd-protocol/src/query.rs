//! Query specification types for browsing a loaded fleet.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::FleetRecord;

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// How a field is compared when filtering and sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text: filters are case-insensitive substring tests.
    Text,
    /// Small closed vocabulary: filters are case-insensitive equality.
    Enumerated,
    /// Compared as numbers; missing or unparseable values count as 0.
    Numeric,
}

/// A filterable and sortable field of [`FleetRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordField {
    VehicleId,
    Make,
    Model,
    Year,
    Category,
    Status,
    Location,
    ZipCode,
    DailyRate,
    Mileage,
}

impl RecordField {
    /// Fields consulted by the free-text filter.
    pub const SEARCHABLE: [RecordField; 3] = [Self::Make, Self::Model, Self::Location];

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Year | Self::DailyRate | Self::Mileage => FieldKind::Numeric,
            Self::Category | Self::Status | Self::ZipCode => FieldKind::Enumerated,
            Self::VehicleId | Self::Make | Self::Model | Self::Location => FieldKind::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VehicleId => "vehicleId",
            Self::Make => "make",
            Self::Model => "model",
            Self::Year => "year",
            Self::Category => "category",
            Self::Status => "status",
            Self::Location => "location",
            Self::ZipCode => "zipCode",
            Self::DailyRate => "dailyRate",
            Self::Mileage => "mileage",
        }
    }

    /// The field rendered as text. Missing values render as the empty string.
    pub fn text_of<'a>(&self, record: &'a FleetRecord) -> Cow<'a, str> {
        match self {
            Self::VehicleId => Cow::Borrowed(record.vehicle_id.as_str()),
            Self::Make => Cow::Borrowed(record.make.as_str()),
            Self::Model => Cow::Borrowed(record.model.as_str()),
            Self::Category => Cow::Borrowed(record.category.as_str()),
            Self::Location => Cow::Borrowed(record.location.as_str()),
            Self::ZipCode => Cow::Borrowed(record.zip_code.as_str()),
            Self::Status => Cow::Borrowed(record.status.map(|s| s.as_str()).unwrap_or("")),
            Self::Year => number_text(&record.year),
            Self::DailyRate => number_text(&record.daily_rate),
            Self::Mileage => number_text(&record.mileage),
        }
    }

    /// The field as a number. Non-numeric fields and missing values give 0.
    pub fn number_of(&self, record: &FleetRecord) -> f64 {
        let value = match self {
            Self::Year => record.year.as_ref(),
            Self::DailyRate => record.daily_rate.as_ref(),
            Self::Mileage => record.mileage.as_ref(),
            _ => None,
        };
        value.and_then(|v| v.as_f64()).unwrap_or(0.0)
    }
}

fn number_text(value: &Option<crate::record::LooseNumber>) -> Cow<'_, str> {
    match value {
        Some(v) => Cow::Owned(v.to_string()),
        None => Cow::Borrowed(""),
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordField {
    type Err = String;

    /// Accepts camelCase, snake_case, and a few short forms (`zip`, `rate`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "vehicleid" | "id" => Ok(Self::VehicleId),
            "make" => Ok(Self::Make),
            "model" => Ok(Self::Model),
            "year" => Ok(Self::Year),
            "category" => Ok(Self::Category),
            "status" => Ok(Self::Status),
            "location" => Ok(Self::Location),
            "zipcode" | "zip" => Ok(Self::ZipCode),
            "dailyrate" | "rate" => Ok(Self::DailyRate),
            "mileage" => Ok(Self::Mileage),
            _ => Err(format!("unknown record field: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: RecordField,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Zero-based page index.
    pub index: usize,
    pub size: usize,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            index: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Filter, sort and page parameters for one query. Supplied per call; the
/// engine keeps none of it between queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuerySpec {
    pub text_filter: String,
    pub field_filters: BTreeMap<RecordField, String>,
    pub sort: Option<SortSpec>,
    pub page: PageSpec,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_filter = text.into();
        self
    }

    pub fn with_filter(mut self, field: RecordField, value: impl Into<String>) -> Self {
        self.field_filters.insert(field, value.into());
        self
    }

    pub fn sorted_by(mut self, field: RecordField, descending: bool) -> Self {
        self.sort = Some(SortSpec { field, descending });
        self
    }

    pub fn with_page(mut self, index: usize, size: usize) -> Self {
        self.page = PageSpec { index, size };
        self
    }
}

/// One page of query output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub page: Vec<FleetRecord>,
    pub total_count: usize,
    pub page_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::VehicleStatus;

    #[test]
    fn field_names_parse_in_several_spellings() {
        assert_eq!("dailyRate".parse::<RecordField>(), Ok(RecordField::DailyRate));
        assert_eq!("daily_rate".parse::<RecordField>(), Ok(RecordField::DailyRate));
        assert_eq!("ZIP".parse::<RecordField>(), Ok(RecordField::ZipCode));
        assert_eq!("vehicle_id".parse::<RecordField>(), Ok(RecordField::VehicleId));
        assert!("color".parse::<RecordField>().is_err());
    }

    #[test]
    fn field_kinds() {
        assert_eq!(RecordField::Mileage.kind(), FieldKind::Numeric);
        assert_eq!(RecordField::Status.kind(), FieldKind::Enumerated);
        assert_eq!(RecordField::ZipCode.kind(), FieldKind::Enumerated);
        assert_eq!(RecordField::Location.kind(), FieldKind::Text);
    }

    #[test]
    fn field_accessors() {
        let record = FleetRecord::new("V1")
            .with_status(VehicleStatus::Rented)
            .with_daily_rate("72.5");
        assert_eq!(RecordField::Status.text_of(&record), "rented");
        assert_eq!(RecordField::DailyRate.text_of(&record), "72.5");
        assert_eq!(RecordField::DailyRate.number_of(&record), 72.5);
        assert_eq!(RecordField::Mileage.number_of(&record), 0.0);
        assert_eq!(RecordField::Make.text_of(&record), "");
    }

    #[test]
    fn query_spec_deserializes_from_presentation_json() {
        let json = r#"{
            "textFilter": "seattle",
            "fieldFilters": {"make": "toyota", "status": "available"},
            "sort": {"field": "dailyRate", "descending": true},
            "page": {"index": 1, "size": 10}
        }"#;
        let spec: QuerySpec = serde_json::from_str(json).unwrap();
        let expected = QuerySpec::new()
            .with_text("seattle")
            .with_filter(RecordField::Make, "toyota")
            .with_filter(RecordField::Status, "available")
            .sorted_by(RecordField::DailyRate, true)
            .with_page(1, 10);
        assert_eq!(spec, expected);
    }

    #[test]
    fn query_spec_defaults() {
        let spec: QuerySpec = serde_json::from_str("{}").unwrap();
        assert!(spec.text_filter.is_empty());
        assert!(spec.sort.is_none());
        assert_eq!(spec.page, PageSpec { index: 0, size: DEFAULT_PAGE_SIZE });
    }
}
