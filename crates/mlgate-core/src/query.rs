//! # Query Module
//!
//! Composable predicates over stored items.
//!
//! - Pure evaluation: filtering never mutates the items it inspects
//! - Serializable: a `Query` round-trips losslessly through JSON, so the
//!   same value can be evaluated locally or posted to a remote store
//! - Backend-agnostic: anything implementing [`Filterable`] can be searched

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// FILTERABLE
// =============================================================================

/// An item a [`Filter`] can be evaluated against.
pub trait Filterable {
    /// The item's unique key within its collection.
    fn identifier(&self) -> String;

    /// The item's type tag (artifact type, collection name, ...).
    fn item_type(&self) -> String;

    /// A named top-level property, if the item has one.
    fn property(&self, name: &str) -> Option<Value>;

    /// The string values of the tag list named `name`.
    ///
    /// Defaults to reading the property `name` as a list of strings.
    fn tag_values(&self, name: &str) -> Vec<String> {
        match self.property(name) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => vec![s],
            _ => Vec::new(),
        }
    }
}

/// Read a top-level property from any serializable item.
///
/// Used by `Filterable` impls whose properties are just their serde fields.
pub fn serialized_property<T: Serialize>(item: &T, name: &str) -> Option<Value> {
    match serde_json::to_value(item) {
        Ok(Value::Object(mut map)) => map.remove(name),
        _ => None,
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// A predicate over [`Filterable`] items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Filter {
    /// Matches every item.
    #[default]
    All,
    /// Matches no item.
    None,
    /// Exact identifier match.
    Identifier { id: String },
    /// Exact item-type match.
    Type { item_type: String },
    /// The tag list `name` contains `value`.
    Tag { name: String, value: String },
    /// The top-level property `name` equals `value`.
    Property { name: String, value: Value },
    /// Every child filter matches (true when empty).
    And { filters: Vec<Filter> },
    /// At least one child filter matches (false when empty).
    Or { filters: Vec<Filter> },
}

impl Filter {
    /// Identifier helper.
    #[must_use]
    pub fn identifier(id: impl Into<String>) -> Self {
        Self::Identifier { id: id.into() }
    }

    /// Item-type helper.
    #[must_use]
    pub fn item_type(item_type: impl Into<String>) -> Self {
        Self::Type {
            item_type: item_type.into(),
        }
    }

    /// Tag helper.
    #[must_use]
    pub fn tag(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Tag {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Property helper.
    #[must_use]
    pub fn property(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Property {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Conjunction helper.
    #[must_use]
    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And { filters }
    }

    /// Disjunction helper.
    #[must_use]
    pub fn or(filters: Vec<Filter>) -> Self {
        Self::Or { filters }
    }

    /// Evaluate the filter against one item.
    pub fn matches<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Identifier { id } => item.identifier() == *id,
            Self::Type { item_type } => item.item_type() == *item_type,
            Self::Tag { name, value } => item.tag_values(name).iter().any(|t| t == value),
            Self::Property { name, value } => item
                .property(name)
                .is_some_and(|actual| values_equal(&actual, value)),
            Self::And { filters } => filters.iter().all(|f| f.matches(item)),
            Self::Or { filters } => filters.iter().any(|f| f.matches(item)),
        }
    }
}

/// JSON equality where numbers compare by value (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

// =============================================================================
// QUERY
// =============================================================================

/// A search request: one root filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filter: Filter,
}

impl Query {
    /// Create a query from a root filter.
    #[must_use]
    pub fn new(filter: Filter) -> Self {
        Self { filter }
    }

    /// A query matching everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Keep the items the query matches, preserving their order.
    pub fn run<T: Filterable>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| self.filter.matches(item))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Item {
        id: &'static str,
        kind: &'static str,
        doc: Value,
    }

    impl Filterable for Item {
        fn identifier(&self) -> String {
            self.id.to_string()
        }
        fn item_type(&self) -> String {
            self.kind.to_string()
        }
        fn property(&self, name: &str) -> Option<Value> {
            self.doc.get(name).cloned()
        }
    }

    fn card() -> Item {
        Item {
            id: "card1",
            kind: "negotiation_card",
            doc: json!({"tags": ["fairness", "robustness"], "score": 3, "owner": "ana"}),
        }
    }

    #[test]
    fn leaf_filters() {
        let item = card();
        assert!(Filter::All.matches(&item));
        assert!(!Filter::None.matches(&item));
        assert!(Filter::identifier("card1").matches(&item));
        assert!(!Filter::identifier("card2").matches(&item));
        assert!(Filter::item_type("negotiation_card").matches(&item));
        assert!(Filter::tag("tags", "fairness").matches(&item));
        assert!(!Filter::tag("tags", "privacy").matches(&item));
        assert!(!Filter::tag("labels", "fairness").matches(&item));
        assert!(Filter::property("owner", "ana").matches(&item));
        assert!(!Filter::property("missing", "ana").matches(&item));
    }

    #[test]
    fn numeric_properties_compare_by_value() {
        let item = card();
        assert!(Filter::property("score", 3.0).matches(&item));
        assert!(Filter::property("score", 3).matches(&item));
        assert!(!Filter::property("score", 3.5).matches(&item));
    }

    #[test]
    fn composite_filters() {
        let item = card();
        assert!(Filter::and(vec![]).matches(&item));
        assert!(!Filter::or(vec![]).matches(&item));
        assert!(
            Filter::and(vec![
                Filter::identifier("card1"),
                Filter::or(vec![Filter::None, Filter::tag("tags", "robustness")]),
            ])
            .matches(&item)
        );
        assert!(!Filter::and(vec![Filter::All, Filter::None]).matches(&item));
    }

    #[test]
    fn wire_format_uses_type_discriminator() {
        let query = Query::new(Filter::and(vec![
            Filter::identifier("a"),
            Filter::property("n", 1),
        ]));
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            json!({"filter": {"type": "and", "filters": [
                {"type": "identifier", "id": "a"},
                {"type": "property", "name": "n", "value": 1}
            ]}})
        );
        let back: Query = serde_json::from_value(json).unwrap();
        assert_eq!(back, query);
    }

    #[test]
    fn missing_filter_defaults_to_all() {
        let query: Query = serde_json::from_str("{}").unwrap();
        assert_eq!(query.filter, Filter::All);
    }

    #[test]
    fn run_preserves_order() {
        let items = vec![
            Item { id: "b", kind: "x", doc: json!({}) },
            Item { id: "a", kind: "y", doc: json!({}) },
            Item { id: "c", kind: "x", doc: json!({}) },
        ];
        let hits = Query::new(Filter::item_type("x")).run(items);
        let ids: Vec<_> = hits.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
