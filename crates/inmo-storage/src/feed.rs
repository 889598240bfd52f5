//! JSON listings feed parsing.
//!
//! The feed is a JSON array of objects keyed in Spanish (`titulo`, `barrio`,
//! `precio`, ...). Each record is validated on its own: a bad record is
//! skipped and counted, never fatal for the batch.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use inmo_core::error::InmoError;
use inmo_core::types::{Listing, OperationKind, PropertyKind};

/// Why a feed record was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value for `{0}`")]
    InvalidField(&'static str),
}

/// Result of parsing a feed: the valid listings plus skip accounting.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub listings: Vec<Listing>,
    pub total: usize,
    pub skipped: usize,
}

/// Read and parse a feed file.
pub fn read_feed(path: &Path) -> Result<ParsedFeed, InmoError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| InmoError::Feed(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_feed(&raw)
}

/// Parse feed content. A leading UTF-8 BOM is tolerated.
///
/// Fails only when the document is not a JSON array.
pub fn parse_feed(raw: &str) -> Result<ParsedFeed, InmoError> {
    let content = raw.trim_start_matches('\u{feff}');
    let value: Value = serde_json::from_str(content)
        .map_err(|e| InmoError::Feed(format!("Invalid JSON: {}", e)))?;

    let records = match value {
        Value::Array(records) => records,
        other => {
            return Err(InmoError::Feed(format!(
                "Expected a JSON array of listings, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut parsed = ParsedFeed {
        total: records.len(),
        ..Default::default()
    };

    for (index, record) in records.iter().enumerate() {
        match record_to_listing(record) {
            Ok(listing) => parsed.listings.push(listing),
            Err(reason) => {
                debug!(index, %reason, "Skipping feed record");
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

/// Convert one feed record into a listing.
///
/// Required: title, neighborhood, price, operation and kind. The operation
/// must be recognized; price and area must be non-negative.
pub fn record_to_listing(record: &Value) -> Result<Listing, RecordError> {
    let obj = record.as_object().ok_or(RecordError::NotAnObject)?;

    let title = required_text(obj, "titulo", &["titulo", "title"])?;
    let neighborhood = required_text(obj, "barrio", &["barrio", "neighborhood"])?;
    let operation_raw = required_text(obj, "operacion", &["operacion", "operation"])?;
    let kind_raw = required_text(obj, "tipo", &["tipo", "kind"])?;

    let price = match field(obj, &["precio", "price"]) {
        None | Some(Value::Null) => return Err(RecordError::MissingField("precio")),
        Some(v) => as_f64(v).ok_or(RecordError::InvalidField("precio"))?,
    };
    if price < 0.0 {
        return Err(RecordError::InvalidField("precio"));
    }

    let operation =
        OperationKind::parse(&operation_raw).ok_or(RecordError::InvalidField("operacion"))?;
    let kind = PropertyKind::parse(&kind_raw);

    let area_sqm = match field(obj, &["metros_cuadrados", "area_sqm"]) {
        None | Some(Value::Null) => 0.0,
        Some(v) => as_f64(v).ok_or(RecordError::InvalidField("metros_cuadrados"))?,
    };
    if area_sqm < 0.0 {
        return Err(RecordError::InvalidField("metros_cuadrados"));
    }

    let id = optional_text(obj, &["id_temporal", "id"])
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut listing = Listing::new(id, title, neighborhood, price, operation, kind);

    listing.rooms = field(obj, &["ambientes", "rooms"])
        .and_then(as_f64)
        .filter(|r| *r >= 0.0)
        .map(|r| r as u32)
        .unwrap_or(0);
    listing.area_sqm = area_sqm;
    listing.description = optional_text(obj, &["descripcion", "description"]).unwrap_or_default();
    if let Some(currency) = optional_text(obj, &["moneda_precio", "price_currency"]) {
        listing.price_currency = currency.to_uppercase();
    }

    listing.address = optional_text(obj, &["direccion", "address"]);
    listing.age_years = field(obj, &["antiguedad", "age_years"])
        .and_then(as_f64)
        .filter(|a| *a >= 0.0)
        .map(|a| a as u32);
    listing.condition = optional_text(obj, &["estado", "condition"]);
    listing.orientation = optional_text(obj, &["orientacion", "orientation"]);
    listing.monthly_fee = field(obj, &["expensas", "monthly_fee"])
        .and_then(as_f64)
        .filter(|f| *f >= 0.0);
    if let Some(currency) = optional_text(obj, &["moneda_expensas", "monthly_fee_currency"]) {
        listing.monthly_fee_currency = currency.to_uppercase();
    }
    listing.amenities = optional_text(obj, &["amenities"]);

    listing.garage = flag(obj, &["cochera", "garage"]);
    listing.balcony = flag(obj, &["balcon", "balcony"]);
    listing.pool = flag(obj, &["pileta", "pool"]);
    listing.pets_allowed = flag(obj, &["acepta_mascotas", "pets_allowed"]);
    listing.air_conditioning = flag(obj, &["aire_acondicionado", "air_conditioning"]);

    listing.media_info = optional_text(obj, &["info_multimedia", "media_info"]);
    listing.documents = uri_list(obj, &["documentos", "documents"]);
    listing.videos = uri_list(obj, &["videos"]);
    listing.photos = uri_list(obj, &["fotos", "photos"]);

    if let Some(ts) = optional_text(obj, &["fecha_procesamiento", "processed_at"])
        .and_then(|s| parse_timestamp(&s))
    {
        listing.processed_at = ts;
    }

    Ok(listing)
}

// =============================================================================
// Helpers
// =============================================================================

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn required_text(
    obj: &Map<String, Value>,
    name: &'static str,
    keys: &[&str],
) -> Result<String, RecordError> {
    match field(obj, keys) {
        None | Some(Value::Null) => Err(RecordError::MissingField(name)),
        Some(v) => scalar_text(v).ok_or(RecordError::MissingField(name)),
    }
}

fn optional_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    field(obj, keys).and_then(scalar_text)
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

/// Boolean-like flags are kept as text; JSON booleans become "si"/"no".
fn flag(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::Bool(true) => Some("si".to_string()),
        Value::Bool(false) => Some("no".to_string()),
        other => scalar_text(other),
    }
}

/// Media references: a JSON array of strings, or one comma-separated string.
fn uri_list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    match field(obj, keys) {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => vec![],
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
