//! Identifier recovery for creation endpoints
//!
//! Some creation endpoints answer `201` without echoing the new entity's id.
//! Resolution order:
//!
//! 1. an id field in the creation response (`data.uuid`, `data.id`, `uuid`, `id`)
//! 2. a list query filtered by a predicate (usually the email used at creation)
//! 3. `None`, which callers treat as "dependent steps are skippable"

use std::future::Future;

use careflow_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Where a resolved id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    /// Present in the creation response
    Direct,
    /// Found in the list by predicate
    Matched,
    /// No unique match; first list element taken
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedId {
    pub id: String,
    pub source: IdSource,
}

#[derive(Debug, Clone)]
pub struct IdResolver {
    id_pointers: Vec<String>,
}

impl Default for IdResolver {
    fn default() -> Self {
        Self {
            id_pointers: ["/data/uuid", "/data/id", "/uuid", "/id"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl IdResolver {
    /// Resolver probing custom JSON pointers, in order
    pub fn with_pointers<I, S>(pointers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id_pointers: pointers.into_iter().map(Into::into).collect(),
        }
    }

    /// Identifier carried directly by a response body
    pub fn direct_id(&self, body: &Value) -> Option<String> {
        self.id_pointers
            .iter()
            .filter_map(|p| body.pointer(p))
            .find_map(id_string)
    }

    /// Identifier of a list element
    pub fn element_id(&self, element: &Value) -> Option<String> {
        ["uuid", "id"]
            .iter()
            .filter_map(|k| element.get(*k))
            .find_map(id_string)
    }

    /// Resolve the id of a freshly created entity.
    ///
    /// `list_fetcher` is only invoked when the creation response carries no
    /// id. With several matches the first match wins; with none the first
    /// list element is used. Both cases are logged as ambiguous.
    pub async fn resolve_id<F, Fut, P>(
        &self,
        create_response: &Value,
        list_fetcher: F,
        matches: P,
    ) -> Option<ResolvedId>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
        P: Fn(&Value) -> bool,
    {
        if let Some(id) = self.direct_id(create_response) {
            debug!("Id {} taken from creation response", id);
            return Some(ResolvedId { id, source: IdSource::Direct });
        }

        let elements = match list_fetcher().await {
            Ok(elements) => elements,
            Err(e) => {
                warn!("Id lookup failed, list unreachable: {}", e);
                return None;
            }
        };

        let matched: Vec<&Value> = elements.iter().filter(|e| matches(e)).collect();
        let (element, source) = match matched.as_slice() {
            [only] => (*only, IdSource::Matched),
            [first, rest @ ..] => {
                warn!("Id lookup ambiguous: {} matches, using the first", rest.len() + 1);
                (*first, IdSource::Matched)
            }
            [] => match elements.first() {
                Some(first) => {
                    warn!(
                        "Id lookup found no match among {} elements, falling back to the first",
                        elements.len()
                    );
                    (first, IdSource::Fallback)
                }
                None => {
                    warn!("Id lookup returned an empty list");
                    return None;
                }
            },
        };

        self.element_id(element).map(|id| ResolvedId { id, source })
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Predicate matching elements whose `field` equals `expected`
pub fn field_equals(field: &str, expected: &str) -> impl Fn(&Value) -> bool {
    let field = field.to_string();
    let expected = expected.to_string();
    move |element| element.get(&field).and_then(Value::as_str) == Some(expected.as_str())
}

/// Elements of a paged list response.
///
/// Accepts `data.content`, `data` as an array, `content`, or a bare array.
pub fn page_content(body: &Value) -> Vec<Value> {
    let candidates = [
        body.pointer("/data/content"),
        body.get("data"),
        body.get("content"),
        Some(body),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_array().cloned())
        .unwrap_or_default()
}
