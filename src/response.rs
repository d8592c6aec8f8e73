use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Response envelope shared by every endpoint.
///
/// Success carries `code = 200` and a payload; failure carries the HTTP
/// status as `code` and no payload.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            msg: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// One page of an offset-paginated collection.
///
/// `pages == 0` if and only if `total == 0`; an out-of-range page is
/// reported as the empty result, never as an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginatedResult<T> {
    /// Requested page number, 1-based.
    pub current: u64,
    /// Requested page size.
    pub size: u64,
    /// Total page count, `ceil(total / size)`.
    pub pages: u64,
    /// Total record count for the query.
    pub total: u64,
    pub records: Vec<T>,
}

impl<T> PaginatedResult<T> {
    pub fn new(current: u64, size: u64, total: u64, records: Vec<T>) -> Self {
        Self {
            current,
            size,
            pages: page_count(total, size),
            total,
            records,
        }
    }

    /// The answer for a page with nothing on it.
    pub fn empty(current: u64, size: u64) -> Self {
        Self {
            current,
            size,
            pages: 0,
            total: 0,
            records: Vec::new(),
        }
    }
}

/// Number of pages needed to hold `total` records at `size` per page.
pub fn page_count(total: u64, size: u64) -> u64 {
    if size == 0 {
        return 0;
    }
    total.div_ceil(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 2), 0);
        assert_eq!(page_count(1, 2), 1);
        assert_eq!(page_count(4, 2), 2);
        assert_eq!(page_count(5, 2), 3);
        assert_eq!(page_count(100, 100), 1);
        assert_eq!(page_count(101, 100), 2);
    }

    #[test]
    fn test_empty_result_invariant() {
        let page: PaginatedResult<String> = PaginatedResult::empty(4, 2);
        assert_eq!(page.pages, 0);
        assert_eq!(page.total, 0);
        assert!(page.records.is_empty());
        // The caller's request parameters are echoed back.
        assert_eq!(page.current, 4);
        assert_eq!(page.size, 2);
    }

    #[test]
    fn test_populated_result_derives_pages() {
        let page = PaginatedResult::new(1, 2, 5, vec!["a", "b"]);
        assert_eq!(page.pages, 3);
        assert_eq!(page.total, 5);
        assert!(page.records.len() as u64 <= page.size);
    }

    #[test]
    fn test_failure_envelope_has_no_data() {
        let resp = ApiResponse::failure(403, "captcha verification failed");
        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body["code"], 403);
        assert!(body.get("data").is_none());
    }
}
