//! Document query predicates.
//!
//! Queries are built by the action layer, serialised to the provider's wire
//! format by the hosted backend, and evaluated in-process by the local one.

use serde_json::{json, Value};
use std::cmp::Ordering;

use super::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Attribute equals any of the values
    Equal { attribute: String, values: Vec<Value> },
    /// Substring match on strings, membership on arrays
    Contains { attribute: String, values: Vec<Value> },
    Or(Vec<Query>),
    OrderAsc(String),
    OrderDesc(String),
    Limit(usize),
    Offset(usize),
}

impl Query {
    pub fn equal<V: Into<Value>>(attribute: &str, values: impl IntoIterator<Item = V>) -> Self {
        Query::Equal {
            attribute: attribute.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains<V: Into<Value>>(attribute: &str, values: impl IntoIterator<Item = V>) -> Self {
        Query::Contains {
            attribute: attribute.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn or(queries: Vec<Query>) -> Self {
        Query::Or(queries)
    }

    pub fn order_asc(attribute: &str) -> Self {
        Query::OrderAsc(attribute.to_string())
    }

    pub fn order_desc(attribute: &str) -> Self {
        Query::OrderDesc(attribute.to_string())
    }

    pub fn limit(limit: usize) -> Self {
        Query::Limit(limit)
    }

    pub fn offset(offset: usize) -> Self {
        Query::Offset(offset)
    }

    /// JSON form accepted by the hosted provider's `queries[]` parameter
    pub fn to_wire(&self) -> Value {
        match self {
            Query::Equal { attribute, values } => {
                json!({ "method": "equal", "attribute": attribute, "values": values })
            }
            Query::Contains { attribute, values } => {
                json!({ "method": "contains", "attribute": attribute, "values": values })
            }
            Query::Or(queries) => {
                let inner: Vec<Value> = queries.iter().map(Query::to_wire).collect();
                json!({ "method": "or", "values": inner })
            }
            Query::OrderAsc(attribute) => json!({ "method": "orderAsc", "attribute": attribute }),
            Query::OrderDesc(attribute) => json!({ "method": "orderDesc", "attribute": attribute }),
            Query::Limit(limit) => json!({ "method": "limit", "values": [limit] }),
            Query::Offset(offset) => json!({ "method": "offset", "values": [offset] }),
        }
    }

    fn is_filter(&self) -> bool {
        matches!(self, Query::Equal { .. } | Query::Contains { .. } | Query::Or(_))
    }

    /// Whether a document satisfies this predicate. Ordering and paging
    /// queries match everything.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Query::Equal { attribute, values } => match doc.attribute(attribute) {
                Some(actual) => values.iter().any(|v| *v == actual),
                None => false,
            },
            Query::Contains { attribute, values } => match doc.attribute(attribute) {
                Some(Value::String(s)) => values
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|needle| s.contains(needle)),
                Some(Value::Array(items)) => values.iter().any(|v| items.contains(v)),
                _ => false,
            },
            Query::Or(queries) => queries.iter().any(|q| q.matches(doc)),
            Query::OrderAsc(_) | Query::OrderDesc(_) | Query::Limit(_) | Query::Offset(_) => true,
        }
    }
}

/// Evaluate a query list over documents: filter, sort, then page.
/// Returns the number of matches before paging alongside the page.
pub fn apply(documents: Vec<Document>, queries: &[Query]) -> (u64, Vec<Document>) {
    let mut matched: Vec<Document> = documents
        .into_iter()
        .filter(|doc| queries.iter().filter(|q| q.is_filter()).all(|q| q.matches(doc)))
        .collect();
    let total = matched.len() as u64;

    let orders: Vec<(&str, bool)> = queries
        .iter()
        .filter_map(|q| match q {
            Query::OrderAsc(attr) => Some((attr.as_str(), true)),
            Query::OrderDesc(attr) => Some((attr.as_str(), false)),
            _ => None,
        })
        .collect();

    if !orders.is_empty() {
        matched.sort_by(|a, b| {
            for (attr, ascending) in &orders {
                let ord = compare_values(a.attribute(attr).as_ref(), b.attribute(attr).as_ref());
                let ord = if *ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let offset = queries
        .iter()
        .rev()
        .find_map(|q| match q {
            Query::Offset(n) => Some(*n),
            _ => None,
        })
        .unwrap_or(0);
    let limit = queries
        .iter()
        .rev()
        .find_map(|q| match q {
            Query::Limit(n) => Some(*n),
            _ => None,
        })
        .unwrap_or(DEFAULT_LIMIT);

    let page = matched.into_iter().skip(offset).take(limit).collect();
    (total, page)
}

/// Page size the hosted provider applies when no limit is given
pub const DEFAULT_LIMIT: usize = 25;

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
