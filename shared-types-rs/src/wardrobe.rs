//! Snapshot of a user's wardrobe and profile as returned by the wardrobe service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One owned clothing item. Only `name` and `id` are interpreted; every
/// other attribute is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardrobeItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "itemName", alias = "item_name")]
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl WardrobeItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            attributes: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardrobeContext {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub wardrobe_items: Vec<WardrobeItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
}

impl WardrobeContext {
    /// Value used when the wardrobe service cannot be reached.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            wardrobe_items: Vec::new(),
            profile: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.wardrobe_items.is_empty()
    }

    pub fn item_names(&self) -> Vec<&str> {
        self.wardrobe_items.iter().map(|item| item.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_keeps_opaque_attributes() {
        let item: WardrobeItem = serde_json::from_value(json!({
            "id": "w-1",
            "name": "Navy Blazer",
            "category": "outerwear",
            "colors": ["navy"]
        }))
        .unwrap();

        assert_eq!(item.name, "Navy Blazer");
        assert_eq!(item.attributes.get("category"), Some(&json!("outerwear")));

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["colors"], json!(["navy"]));
    }

    #[test]
    fn test_context_shape() {
        let context: WardrobeContext = serde_json::from_value(json!({
            "userId": "u1",
            "wardrobe_items": [{"itemName": "White Tee"}],
            "profile": {"height_cm": 170}
        }))
        .unwrap();

        assert_eq!(context.item_names(), vec!["White Tee"]);
        assert!(!context.is_empty());
        assert!(WardrobeContext::empty("u1").is_empty());
    }

    #[test]
    fn test_item_without_name_is_a_shape_mismatch() {
        let result: Result<WardrobeContext, _> = serde_json::from_value(json!({
            "userId": "u1",
            "wardrobe_items": [{"category": "shoes"}]
        }));
        assert!(result.is_err());
    }
}
