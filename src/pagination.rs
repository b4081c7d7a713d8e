//! Limit/offset pagination for admin list endpoints.

use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Query parameters for paginated list endpoints.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct PaginationParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// Clamp to sane bounds: limit 1..=200 (default 50), offset >= 0.
    pub fn clamp(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// Envelope for paginated responses.
#[derive(Debug, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_defaults() {
        let (limit, offset) = PaginationParams::default().clamp();
        assert_eq!(limit, 50);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_clamp_bounds() {
        let params = PaginationParams {
            limit: Some(10_000),
            offset: Some(-5),
        };
        let (limit, offset) = params.clamp();
        assert_eq!(limit, 200);
        assert_eq!(offset, 0);

        let params = PaginationParams {
            limit: Some(0),
            offset: Some(30),
        };
        let (limit, offset) = params.clamp();
        assert_eq!(limit, 1);
        assert_eq!(offset, 30);
    }
}
