use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ordering::ListingOrder;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String,
    pub host_id: String,
    pub title: String,
    pub description: String,
    pub property_type: PropertyType,
    pub price_per_night: Decimal,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub max_guests: u32,
    pub address: String,
    pub city: String,
    pub country: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub amenities: serde_json::Value,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Apartment,
    House,
    Villa,
    Cabin,
    BeachHouse,
    Other,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "APARTMENT",
            PropertyType::House => "HOUSE",
            PropertyType::Villa => "VILLA",
            PropertyType::Cabin => "CABIN",
            PropertyType::BeachHouse => "BEACH_HOUSE",
            PropertyType::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "APARTMENT" => PropertyType::Apartment,
            "HOUSE" => PropertyType::House,
            "VILLA" => PropertyType::Villa,
            "CABIN" => PropertyType::Cabin,
            "BEACH_HOUSE" => PropertyType::BeachHouse,
            _ => PropertyType::Other,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewListing {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub property_type: PropertyType,
    pub price_per_night: Decimal,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    pub max_guests: u32,
    #[serde(default)]
    pub address: String,
    pub city: String,
    pub country: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    #[serde(default = "empty_amenities")]
    pub amenities: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub property_type: Option<PropertyType>,
    pub price_per_night: Option<Decimal>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub max_guests: Option<u32>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub amenities: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub city: Option<String>,
    pub country: Option<String>,
    pub property_type: Option<PropertyType>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub order: Option<ListingOrder>,
}

fn empty_amenities() -> serde_json::Value {
    serde_json::json!({})
}
