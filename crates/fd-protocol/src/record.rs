//! Fleet record types as delivered by the record store and the agent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Rental status of a vehicle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Available,
    Rented,
    Maintenance,
}

impl VehicleStatus {
    pub const ALL: [VehicleStatus; 3] = [Self::Available, Self::Rented, Self::Maintenance];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Rented => "rented",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "rented" => Ok(Self::Rented),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(format!("unknown vehicle status: {other}")),
        }
    }
}

/// A numeric field that the store may deliver as a JSON number or as a
/// numeric string (DynamoDB decimals often arrive as `"54.20"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(serde_json::Number),
    Text(String),
}

impl LooseNumber {
    /// Numeric value, or `None` when the text does not parse.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => n.as_f64()?,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for LooseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for LooseNumber {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for LooseNumber {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One vehicle in the fleet inventory.
///
/// Input accepts both the camelCase keys the agent emits and the snake_case
/// keys of the inventory table. Only `vehicleId` is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FleetRecord {
    #[serde(alias = "vehicle_id", deserialize_with = "scalar_string")]
    pub vehicle_id: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<LooseNumber>,
    #[serde(default)]
    pub category: String,
    #[serde(
        default,
        deserialize_with = "lenient_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<VehicleStatus>,
    #[serde(default)]
    pub location: String,
    #[serde(default, alias = "zip_code", deserialize_with = "scalar_string")]
    pub zip_code: String,
    #[serde(default, alias = "daily_rate", skip_serializing_if = "Option::is_none")]
    pub daily_rate: Option<LooseNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage: Option<LooseNumber>,
    #[serde(default, alias = "license_plate", skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    #[serde(default, alias = "last_updated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl FleetRecord {
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            ..Default::default()
        }
    }

    pub fn with_vehicle(
        mut self,
        make: impl Into<String>,
        model: impl Into<String>,
        year: i64,
    ) -> Self {
        self.make = make.into();
        self.model = model.into();
        self.year = Some(year.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_status(mut self, status: VehicleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>, zip_code: impl Into<String>) -> Self {
        self.location = location.into();
        self.zip_code = zip_code.into();
        self
    }

    pub fn with_daily_rate(mut self, rate: impl Into<LooseNumber>) -> Self {
        self.daily_rate = Some(rate.into());
        self
    }

    pub fn with_mileage(mut self, mileage: i64) -> Self {
        self.mileage = Some(mileage.into());
        self
    }
}

/// Unknown or malformed statuses become `None` instead of failing the record.
fn lenient_status<'de, D>(deserializer: D) -> Result<Option<VehicleStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// Accepts a string or a number (zip codes are sometimes stored numerically).
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}
