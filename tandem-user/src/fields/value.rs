//! Native value types for the per-profile field store.
//!
//! Validated values live as [`FieldValue`] between validation and persistence,
//! then get flattened into the profile's `fields` jsonb column. Scoring,
//! search, and export read the stored json directly.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const ADDRESS_SUBFIELDS: [&str; 5] = ["title", "street", "postal_code", "city", "country"];
pub const CURRENT_ADDRESS_KEY: &str = "current_address";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
    List(Vec<String>),
    Addresses(MultiAddress),
}

impl FieldValue {
    /// Stored representation. Dates render as ISO strings so the store stays
    /// plain json; the catalog is what re-types them on the way out.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(n) => serde_json::Value::from(*n),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::List(items) => serde_json::Value::from(items.clone()),
            FieldValue::Addresses(addresses) => {
                serde_json::to_value(addresses).unwrap_or(serde_json::Value::Null)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Int(_) | FieldValue::Bool(_) | FieldValue::Date(_) => false,
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Addresses(addresses) => addresses.addresses.is_empty(),
        }
    }
}

/// Emptiness of a value already in the store.
pub fn json_is_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Object(map) => map
            .get("addresses")
            .map(|a| a.as_object().map_or(true, |m| m.is_empty()))
            .unwrap_or_else(|| map.is_empty()),
        _ => false,
    }
}

// --- Multi-address ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub title: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl Address {
    fn get(&self, subfield: &str) -> &str {
        match subfield {
            "title" => &self.title,
            "street" => &self.street,
            "postal_code" => &self.postal_code,
            "city" => &self.city,
            "country" => &self.country,
            _ => "",
        }
    }

    fn is_blank(&self) -> bool {
        ADDRESS_SUBFIELDS.iter().all(|s| self.get(s).is_empty())
    }
}

/// A dict of index -> address plus a selector for the one currently shown.
/// Indexes are renumbered 0..N on every parse, so the stored dict is dense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAddress {
    pub addresses: BTreeMap<String, Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_address: Option<String>,
}

impl MultiAddress {
    /// Parses the flat `{subfield}_{index}` submission map, dropping entries
    /// whose subfields are all blank and renumbering the survivors.
    pub fn parse(raw: &HashMap<String, String>) -> Result<Self, String> {
        let mut indexed: BTreeMap<u32, Address> = BTreeMap::new();

        for (key, value) in raw {
            if key == CURRENT_ADDRESS_KEY {
                continue;
            }
            let Some((subfield, index)) = split_subfield_key(key) else {
                return Err(format!("unrecognized address subfield `{key}`"));
            };
            let entry = indexed.entry(index).or_insert_with(|| Address {
                title: String::new(),
                street: String::new(),
                postal_code: String::new(),
                city: String::new(),
                country: String::new(),
            });
            match subfield {
                "title" => entry.title = value.clone(),
                "street" => entry.street = value.clone(),
                "postal_code" => entry.postal_code = value.clone(),
                "city" => entry.city = value.clone(),
                "country" => entry.country = value.clone(),
                _ => unreachable!(),
            }
        }

        let submitted_current: Option<u32> = raw
            .get(CURRENT_ADDRESS_KEY)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse()
                    .map_err(|_| format!("`{CURRENT_ADDRESS_KEY}` must be an index"))
            })
            .transpose()?;

        let mut addresses = BTreeMap::new();
        let mut current_address = None;
        let mut next = 0u32;
        for (submitted_index, address) in indexed {
            if address.is_blank() {
                continue;
            }
            if submitted_current == Some(submitted_index) {
                current_address = Some(next.to_string());
            }
            addresses.insert(next.to_string(), address);
            next += 1;
        }

        Ok(Self {
            addresses,
            current_address,
        })
    }

    /// Re-renders the stored dict into the flat submission map, the inverse
    /// of [`MultiAddress::parse`] for dense stores.
    pub fn form_initial(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for (index, address) in &self.addresses {
            for subfield in ADDRESS_SUBFIELDS {
                out.insert(format!("{subfield}_{index}"), address.get(subfield).to_string());
            }
        }
        if let Some(current) = &self.current_address {
            out.insert(CURRENT_ADDRESS_KEY.to_string(), current.clone());
        }
        out
    }
}

/// Splits `street_0` into `("street", 0)`. Subfield names themselves contain
/// underscores, so the index is the part after the last one.
fn split_subfield_key(key: &str) -> Option<(&str, u32)> {
    let (subfield, index) = key.rsplit_once('_')?;
    if !ADDRESS_SUBFIELDS.contains(&subfield) {
        return None;
    }
    Some((subfield, index.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_and_rerender_round_trip() {
        let raw = submission(&[
            ("title_0", "Home"),
            ("street_0", "Elm Street 4"),
            ("postal_code_0", "10115"),
            ("city_0", "Berlin"),
            ("country_0", "DE"),
            ("title_1", "Office"),
            ("street_1", "Kanalweg 9"),
            ("postal_code_1", "76133"),
            ("city_1", "Karlsruhe"),
            ("country_1", "DE"),
            ("current_address", "1"),
        ]);

        let parsed = MultiAddress::parse(&raw).unwrap();
        assert_eq!(parsed.addresses.len(), 2);
        assert_eq!(parsed.current_address.as_deref(), Some("1"));
        assert_eq!(parsed.addresses["0"].title, "Home");
        assert_eq!(parsed.addresses["1"].city, "Karlsruhe");

        // No blank subfields, so re-rendering reproduces the submission.
        assert_eq!(parsed.form_initial(), raw);
    }

    #[test]
    fn test_blank_entries_dropped_and_renumbered() {
        let raw = submission(&[
            ("title_0", ""),
            ("street_0", ""),
            ("postal_code_0", ""),
            ("city_0", ""),
            ("country_0", ""),
            ("title_3", "Workshop"),
            ("street_3", "Dock 2"),
            ("postal_code_3", "20457"),
            ("city_3", "Hamburg"),
            ("country_3", "DE"),
            ("current_address", "3"),
        ]);

        let parsed = MultiAddress::parse(&raw).unwrap();
        assert_eq!(parsed.addresses.len(), 1);
        assert!(parsed.addresses.contains_key("0"));
        assert_eq!(parsed.addresses["0"].title, "Workshop");
        // The selector follows the renumbering.
        assert_eq!(parsed.current_address.as_deref(), Some("0"));
    }

    #[test]
    fn test_unrecognized_subfield_rejected() {
        let raw = submission(&[("planet_0", "Mars")]);
        assert!(MultiAddress::parse(&raw).is_err());
    }

    #[test]
    fn test_field_value_emptiness() {
        assert!(FieldValue::Text(String::new()).is_empty());
        assert!(!FieldValue::Text("x".into()).is_empty());
        assert!(FieldValue::List(vec![]).is_empty());
        assert!(!FieldValue::Bool(false).is_empty());
        assert!(!FieldValue::Int(0).is_empty());
    }

    #[test]
    fn test_json_emptiness_matches_store_shapes() {
        assert!(json_is_empty(&serde_json::json!("")));
        assert!(json_is_empty(&serde_json::json!([])));
        assert!(json_is_empty(&serde_json::json!(null)));
        assert!(json_is_empty(&serde_json::json!({"addresses": {}})));
        assert!(!json_is_empty(&serde_json::json!("x")));
        assert!(!json_is_empty(&serde_json::json!(["a"])));
        assert!(!json_is_empty(&serde_json::json!(false)));
    }

    #[test]
    fn test_date_value_serializes_as_iso_string() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            FieldValue::Date(date).to_json(),
            serde_json::json!("2024-03-09")
        );
    }
}
