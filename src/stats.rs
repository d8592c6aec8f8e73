use std::sync::Arc;

use crate::auth::SessionGuard;
use crate::error::{Result, ServiceError};
use crate::response::{page_count, PaginatedResult};
use crate::session::Session;
use crate::store::{AccessLogStore, LinkAccessEvent};

/// Largest permitted page size; bounds response payload and query cost.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Answers paginated, access-controlled statistics queries over the
/// access log of one link.
pub struct StatsAggregator {
    guard: Arc<SessionGuard>,
    access_log: Arc<dyn AccessLogStore>,
}

impl StatsAggregator {
    pub fn new(guard: Arc<SessionGuard>, access_log: Arc<dyn AccessLogStore>) -> Self {
        Self { guard, access_log }
    }

    /// Returns one page of access events for `hash`.
    ///
    /// Pagination bounds are validated before any session or store access,
    /// so a malformed request consumes no captcha. A page past the end of
    /// the log is a valid empty answer, not an error.
    pub async fn get_stats(
        &self,
        session: &Session,
        hash: &str,
        credential: &str,
        captcha: &str,
        page: u64,
        size: u64,
    ) -> Result<PaginatedResult<LinkAccessEvent>> {
        if page < 1 || size < 1 || size > MAX_PAGE_SIZE {
            return Err(ServiceError::InvalidArgument(
                "page must be >= 1 and size within 1..=100".into(),
            ));
        }

        self.guard.verify(session, captcha, hash, credential).await?;

        let total = self.access_log.count(hash);
        let total_pages = page_count(total, size);

        // Offset is only derived for in-range pages; `page <= total_pages`
        // bounds the multiplication.
        if total > 0 && page <= total_pages {
            let offset = (page - 1) * size;
            let records = self.access_log.find_page(hash, offset, size);
            Ok(PaginatedResult::new(page, size, total, records))
        } else {
            Ok(PaginatedResult::empty(page, size))
        }
    }
}
