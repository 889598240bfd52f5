use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Commercial operation a listing is offered under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Sale,
    Rental,
}

impl OperationKind {
    /// Recognize an operation from free text (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "venta" | "sale" | "compra" => Some(Self::Sale),
            "alquiler" | "rental" | "rent" | "renta" => Some(Self::Rental),
            _ => None,
        }
    }

    /// Canonical stored form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "venta",
            Self::Rental => "alquiler",
        }
    }
}

/// Kind of property. Open-ended: unknown kinds are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    House,
    Apartment,
    RowHouse,
    Land,
    Office,
    Other(String),
}

impl PropertyKind {
    /// Recognize a property kind from free text (case-insensitive).
    pub fn parse(value: &str) -> Self {
        let lowered = value.trim().to_lowercase();
        match lowered.as_str() {
            "casa" | "house" => Self::House,
            "departamento" | "depto" | "apartment" => Self::Apartment,
            "ph" => Self::RowHouse,
            "terreno" | "terrenos" | "lote" | "lotes" | "land" => Self::Land,
            "oficina" | "office" => Self::Office,
            _ => Self::Other(lowered),
        }
    }

    /// Canonical stored form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::House => "casa",
            Self::Apartment => "departamento",
            Self::RowHouse => "ph",
            Self::Land => "terreno",
            Self::Office => "oficina",
            Self::Other(s) => s.as_str(),
        }
    }
}

// =============================================================================
// Listing
// =============================================================================

fn default_price_currency() -> String {
    "USD".to_string()
}

fn default_fee_currency() -> String {
    "ARS".to_string()
}

/// One property record in the store.
///
/// Spanish aliases are accepted on input so prior-turn context can be echoed
/// back by clients that speak the feed vocabulary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(alias = "id_temporal")]
    pub id: String,
    #[serde(default, alias = "titulo")]
    pub title: String,
    #[serde(default, alias = "barrio")]
    pub neighborhood: String,
    #[serde(default, alias = "precio")]
    pub price: f64,
    #[serde(default = "default_price_currency", alias = "moneda_precio")]
    pub price_currency: String,
    #[serde(default, alias = "ambientes")]
    pub rooms: u32,
    #[serde(default, alias = "metros_cuadrados")]
    pub area_sqm: f64,
    #[serde(default, alias = "descripcion")]
    pub description: String,
    #[serde(default, alias = "operacion")]
    pub operation: String,
    #[serde(default, alias = "tipo")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "direccion")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "antiguedad")]
    pub age_years: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "estado")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "orientacion")]
    pub orientation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "expensas")]
    pub monthly_fee: Option<f64>,
    #[serde(default = "default_fee_currency", alias = "moneda_expensas")]
    pub monthly_fee_currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<String>,

    // Boolean-like flags, stored as the feed provides them ("si", "no", ...).
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "cochera")]
    pub garage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "balcon")]
    pub balcony: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "pileta")]
    pub pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "acepta_mascotas")]
    pub pets_allowed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "aire_acondicionado")]
    pub air_conditioning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "info_multimedia")]
    pub media_info: Option<String>,
    #[serde(default, alias = "documentos")]
    pub documents: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default, alias = "fotos")]
    pub photos: Vec<String>,

    #[serde(default = "Utc::now", alias = "fecha_procesamiento")]
    pub processed_at: DateTime<Utc>,
}

impl Listing {
    /// Create a listing with the required fields; extras take their defaults.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        neighborhood: impl Into<String>,
        price: f64,
        operation: OperationKind,
        kind: PropertyKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            neighborhood: neighborhood.into(),
            price,
            price_currency: default_price_currency(),
            rooms: 0,
            area_sqm: 0.0,
            description: String::new(),
            operation: operation.as_str().to_string(),
            kind: kind.as_str().to_string(),
            address: None,
            age_years: None,
            condition: None,
            orientation: None,
            monthly_fee: None,
            monthly_fee_currency: default_fee_currency(),
            amenities: None,
            garage: None,
            balcony: None,
            pool: None,
            pets_allowed: None,
            air_conditioning: None,
            media_info: None,
            documents: vec![],
            videos: vec![],
            photos: vec![],
            processed_at: Utc::now(),
        }
    }

    pub fn with_rooms(mut self, rooms: u32) -> Self {
        self.rooms = rooms;
        self
    }

    pub fn with_area(mut self, area_sqm: f64) -> Self {
        self.area_sqm = area_sqm;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn operation_kind(&self) -> Option<OperationKind> {
        OperationKind::parse(&self.operation)
    }

    pub fn property_kind(&self) -> PropertyKind {
        PropertyKind::parse(&self.kind)
    }
}

// =============================================================================
// Filter Set
// =============================================================================

/// Sparse set of optional search predicates.
///
/// Absent predicates impose no constraint. Serialized field order is fixed,
/// which makes the JSON form of a normalized set usable as a cache key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "barrio")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "precio_min")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "precio_max")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "ambientes")]
    pub min_rooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "operacion")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "tipo")]
    pub kind: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "metros_min",
        alias = "min_sqm"
    )]
    pub min_area: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "metros_max",
        alias = "max_sqm"
    )]
    pub max_area: Option<f64>,
}

fn normalize_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

impl FilterSet {
    /// True when no predicate is present.
    pub fn is_empty(&self) -> bool {
        self.neighborhood.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_rooms.is_none()
            && self.operation.is_none()
            && self.kind.is_none()
            && self.min_area.is_none()
            && self.max_area.is_none()
    }

    /// Trim and lowercase string predicates; blank strings become absent.
    pub fn normalized(&self) -> FilterSet {
        FilterSet {
            neighborhood: normalize_text(&self.neighborhood),
            operation: normalize_text(&self.operation),
            kind: normalize_text(&self.kind),
            ..self.clone()
        }
    }

    /// Canonical key: JSON of the normalized set with fixed field order.
    pub fn cache_key(&self) -> String {
        let normalized = self.normalized();
        serde_json::to_string(&normalized).unwrap_or_else(|_| format!("{:?}", normalized))
    }

    /// Overlay `other` on top of `self`. Predicates present in `other` win.
    pub fn merge(&self, other: &FilterSet) -> FilterSet {
        FilterSet {
            neighborhood: other.neighborhood.clone().or_else(|| self.neighborhood.clone()),
            min_price: other.min_price.or(self.min_price),
            max_price: other.max_price.or(self.max_price),
            min_rooms: other.min_rooms.or(self.min_rooms),
            operation: other.operation.clone().or_else(|| self.operation.clone()),
            kind: other.kind.clone().or_else(|| self.kind.clone()),
            min_area: other.min_area.or(self.min_area),
            max_area: other.max_area.or(self.max_area),
        }
    }

    /// Whether a listing satisfies every present predicate.
    ///
    /// Mirrors the store's query semantics: case-insensitive substring for
    /// text predicates, inclusive bounds for numeric ones.
    pub fn matches(&self, listing: &Listing) -> bool {
        let f = self.normalized();
        let contains = |field: &str, needle: &Option<String>| {
            needle
                .as_deref()
                .map_or(true, |n| field.to_lowercase().contains(n))
        };

        contains(&listing.neighborhood, &f.neighborhood)
            && contains(&listing.operation, &f.operation)
            && contains(&listing.kind, &f.kind)
            && f.min_price.map_or(true, |v| listing.price >= v)
            && f.max_price.map_or(true, |v| listing.price <= v)
            && f.min_rooms.map_or(true, |v| listing.rooms >= v)
            && f.min_area.map_or(true, |v| listing.area_sqm >= v)
            && f.max_area.map_or(true, |v| listing.area_sqm <= v)
    }
}

// =============================================================================
// Supporting records
// =============================================================================

/// Distinct catalog vocabulary, used as generation context.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFacets {
    pub neighborhoods: Vec<String>,
    pub kinds: Vec<String>,
    pub operations: Vec<String>,
}

/// One chat exchange, as recorded in the conversation log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    pub user_message: String,
    pub bot_response: String,
    /// Response latency in seconds.
    pub response_time: f64,
    pub search_performed: bool,
    pub results_count: u32,
}

impl ConversationEntry {
    pub fn new(channel: &str, user_message: &str, bot_response: &str) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            channel: channel.to_string(),
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
            response_time: 0.0,
            search_performed: false,
            results_count: 0,
        }
    }
}

/// Outcome of a bulk load from the listings feed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub total: usize,
    pub loaded: usize,
    pub skipped: usize,
}
