use serde::{Deserialize, Serialize};

/// A single real-estate listing as ingested from the upstream feed.
///
/// Fields the similarity pipeline depends on are typed explicitly; anything
/// else the feed carries is preserved in `extra` so a re-index never drops
/// payload data. The amenities and photo lists stay `Option` so a missing
/// field is distinguishable from an empty one during validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyRecord {
    pub id: u64,
    pub listing_id: String,
    pub full_address: String,
    pub property_type: Option<String>,
    pub architectural_style: Option<String>,
    pub sale_lease: Option<String>,
    pub list_price: Option<f64>,
    pub price_range: Option<String>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub association_amenities: Option<Vec<String>>,
    pub interior_features: Vec<String>,
    pub exterior_features: Vec<String>,
    pub appliances: Vec<String>,
    pub lot_features: Vec<String>,
    pub accessibility_features: Vec<String>,
    pub building_features: Vec<String>,
    pub fireplace_features: Vec<String>,
    pub laundry_features: Vec<String>,
    pub parking_features: Vec<String>,
    pub pool_features: Vec<String>,
    pub security_features: Vec<String>,
    pub waterfront_features: Vec<String>,
    pub community_features: Vec<String>,
    pub photos: Option<Vec<String>>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PropertyRecord {
    /// Every structured feature entry, in the order the feature lists enter
    /// the features embedding prompt.
    pub fn feature_entries(&self) -> impl Iterator<Item = &str> {
        self.association_amenities
            .iter()
            .flatten()
            .chain(&self.interior_features)
            .chain(&self.exterior_features)
            .chain(&self.appliances)
            .chain(&self.lot_features)
            .chain(&self.accessibility_features)
            .chain(&self.building_features)
            .chain(&self.fireplace_features)
            .chain(&self.laundry_features)
            .chain(&self.parking_features)
            .chain(&self.pool_features)
            .chain(&self.security_features)
            .chain(&self.waterfront_features)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::PropertyRecord;

    #[test]
    fn unknown_payload_fields_are_preserved() {
        let raw = serde_json::json!({
            "id": 42,
            "listing_id": "X42",
            "full_address": "1 main st",
            "provider_flags": {"featured": true}
        });

        let record: PropertyRecord = serde_json::from_value(raw).expect("record should parse");
        assert_eq!(record.id, 42);
        assert!(record.extra.contains_key("provider_flags"));

        let back = serde_json::to_value(&record).expect("record should serialize");
        assert_eq!(back["provider_flags"]["featured"], true);
    }

    #[test]
    fn feature_entries_follow_prompt_order() {
        let record = PropertyRecord {
            association_amenities: Some(vec!["gym".into()]),
            interior_features: vec!["hardwood".into()],
            waterfront_features: vec!["dock".into()],
            ..Default::default()
        };

        let entries: Vec<&str> = record.feature_entries().collect();
        assert_eq!(entries, vec!["gym", "hardwood", "dock"]);
    }
}
