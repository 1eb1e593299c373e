use serde::Deserialize;
use utoipa::IntoParams;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// `limit` / `offset` query parameters shared by list endpoints.
///
/// A missing, zero or negative limit means [`DEFAULT_LIMIT`]; larger values
/// are capped at [`MAX_LIMIT`].
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    pub fn limit(&self) -> i64 {
        match self.limit {
            Some(n) if n > 0 => n.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_caps() {
        assert_eq!(Pagination::default().limit(), DEFAULT_LIMIT);
        assert_eq!(Pagination::new(Some(0), None).limit(), DEFAULT_LIMIT);
        assert_eq!(Pagination::new(Some(-3), None).limit(), DEFAULT_LIMIT);
        assert_eq!(Pagination::new(Some(5), None).limit(), 5);
        assert_eq!(Pagination::new(Some(10_000), None).limit(), MAX_LIMIT);
        assert_eq!(Pagination::new(None, Some(-1)).offset(), 0);
        assert_eq!(Pagination::new(None, Some(40)).offset(), 40);
    }
}
