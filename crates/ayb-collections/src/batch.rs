//! Ordered batch execution (§4.4.5): up to 100 items, run in one
//! transaction and rolled back together on the first failure, unless the
//! caller opts into `atomic: false`, in which case every item is
//! independent and failures don't affect their neighbors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMethod {
    Create,
    Update,
    Replace,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub method: BatchMethod,
    pub id: Option<Value>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
    #[serde(default = "default_atomic")]
    pub atomic: bool,
}

fn default_atomic() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[must_use]
pub fn validate_size(request: &BatchRequest) -> Option<&'static str> {
    if request.items.is_empty() {
        return Some("batch must contain at least one item");
    }
    if request.items.len() > MAX_BATCH_SIZE {
        return Some("batch exceeds the maximum of 100 items");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_atomic_is_true() {
        let request = BatchRequest {
            items: vec![],
            atomic: default_atomic(),
        };
        assert!(request.atomic);
    }

    #[test]
    fn rejects_empty_batch() {
        let request = BatchRequest {
            items: vec![],
            atomic: true,
        };
        assert!(validate_size(&request).is_some());
    }

    #[test]
    fn rejects_oversized_batch() {
        let items: Vec<BatchItem> = (0..101)
            .map(|_| BatchItem {
                method: BatchMethod::Create,
                id: None,
                body: None,
            })
            .collect();
        let request = BatchRequest { items, atomic: true };
        assert!(validate_size(&request).is_some());
    }

    #[test]
    fn accepts_batch_at_the_cap() {
        let items: Vec<BatchItem> = (0..100)
            .map(|_| BatchItem {
                method: BatchMethod::Create,
                id: None,
                body: None,
            })
            .collect();
        let request = BatchRequest { items, atomic: true };
        assert!(validate_size(&request).is_none());
    }
}
