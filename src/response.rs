//! Response envelope and pagination metadata.
//!
//! Every route answers `{ success, data?, error? }`; paginated payloads
//! carry a `pagination` block alongside their items.

use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: i64,
    pub limit: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total_count: i64) -> Self {
        let limit = limit.max(1);
        let total_pages = ((total_count.max(0) as u64).div_ceil(limit as u64)) as u32;
        Self {
            current_page: page,
            total_pages,
            total_count: total_count.max(0),
            limit,
            has_next_page: page < total_pages,
            has_prev_page: page > 1 && total_pages > 0,
        }
    }
}

/// Page/limit query parameters shared by the simple paginated listings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl PageParams {
    pub fn normalized(self) -> (u32, u32) {
        (self.page.max(1), self.limit.clamp(1, 100))
    }

    pub fn offset(self) -> i64 {
        let (page, limit) = self.normalized();
        i64::from(page - 1) * i64::from(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_normalization() {
        let (page, limit) = PageParams { page: 0, limit: 1000 }.normalized();
        assert_eq!((page, limit), (1, 100));
        assert_eq!(PageParams { page: 3, limit: 10 }.offset(), 20);
    }

    #[test]
    fn test_empty_result_has_zero_pages() {
        let meta = PageMeta::new(1, 12, 0);
        assert_eq!(meta.total_pages, 0);
        assert_eq!(meta.total_count, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_prev_page);
    }

    #[test]
    fn test_partial_last_page() {
        let meta = PageMeta::new(1, 12, 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(!meta.has_prev_page);
    }

    #[test]
    fn test_middle_page() {
        let meta = PageMeta::new(2, 10, 30);
        assert!(meta.has_next_page);
        assert!(meta.has_prev_page);
    }

    #[test]
    fn test_envelope_shapes() {
        let ok = serde_json::to_value(ApiResponse::ok(serde_json::json!({"n": 1})).0).unwrap();
        assert_eq!(ok["success"], true);
        assert!(ok.get("error").is_none());

        let err = serde_json::to_value(ApiResponse::<()>::error("nope")).unwrap();
        assert_eq!(err["success"], false);
        assert_eq!(err["error"], "nope");
    }
}
