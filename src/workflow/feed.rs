use std::sync::Arc;

use crate::domain::activity::{
    ActivityEntry, ActivityFilter, ActivityKind, ActivityQuery, FeedCursor,
};
use crate::error::{AppError, AppResult};
use crate::services::TicketStore;

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct FeedPage {
    /// 1-based.
    pub number: usize,
    pub entries: Vec<ActivityEntry>,
    pub has_more: bool,
    /// Entries of kind `log` on the whole ticket, regardless of the filter.
    pub log_total: usize,
}

impl FeedPage {
    pub fn next_cursor(&self) -> Option<FeedCursor> {
        if self.has_more {
            self.entries.last().map(ActivityEntry::cursor)
        } else {
            None
        }
    }
}

/// Newest-first, cursor-paginated view over one ticket's activity.
///
/// Page `n` starts after the last entry of page `n - 1`, so pages can only be
/// reached by walking forward from the first one.
pub struct ActivityFeed {
    store: Arc<dyn TicketStore>,
    ticket_id: String,
    filter: ActivityFilter,
    page_size: usize,
    /// `page_starts[i]` is where page `i + 1` begins.
    page_starts: Vec<Option<FeedCursor>>,
    current: Option<usize>,
}

impl ActivityFeed {
    pub fn new(store: Arc<dyn TicketStore>, ticket_id: impl Into<String>) -> Self {
        Self {
            store,
            ticket_id: ticket_id.into(),
            filter: ActivityFilter::All,
            page_size: PAGE_SIZE,
            page_starts: vec![None],
            current: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn filter(&self) -> ActivityFilter {
        self.filter
    }

    /// Switching the filter invalidates every cursor fetched so far.
    pub fn set_filter(&mut self, filter: ActivityFilter) {
        if filter != self.filter {
            self.filter = filter;
            self.page_starts = vec![None];
            self.current = None;
        }
    }

    pub fn current_page(&self) -> Option<usize> {
        self.current
    }

    pub async fn first_page(&mut self) -> AppResult<FeedPage> {
        self.page(1).await
    }

    pub async fn next_page(&mut self) -> AppResult<FeedPage> {
        let next = self.current.map_or(1, |current| current + 1);
        self.page(next).await
    }

    pub async fn previous_page(&mut self) -> AppResult<FeedPage> {
        match self.current {
            Some(current) if current > 1 => self.page(current - 1).await,
            _ => Err(AppError::StateConflict(
                "already on the first page".to_string(),
            )),
        }
    }

    pub async fn refresh(&mut self) -> AppResult<FeedPage> {
        self.page(self.current.unwrap_or(1)).await
    }

    pub async fn page(&mut self, number: usize) -> AppResult<FeedPage> {
        if number == 0 {
            return Err(AppError::Validation("pages are numbered from 1".to_string()));
        }
        let start = match self.page_starts.get(number - 1) {
            Some(start) => start.clone(),
            None => {
                return Err(AppError::StateConflict(format!(
                    "page {number} is not reachable yet; load page {} first",
                    number - 1
                )));
            }
        };

        let (entries, has_more) = self.fetch(start).await?;
        let log_total = self
            .store
            .count_activity(&self.ticket_id, ActivityKind::Log)
            .await?;

        let page = FeedPage {
            number,
            entries,
            has_more,
            log_total,
        };
        self.page_starts.truncate(number);
        if let Some(cursor) = page.next_cursor() {
            self.page_starts.push(Some(cursor));
        }
        self.current = Some(number);
        Ok(page)
    }

    /// A one-off page starting after `cursor`; does not touch the cursor chain.
    pub async fn page_after(&self, cursor: FeedCursor) -> AppResult<FeedPage> {
        let (entries, has_more) = self.fetch(Some(cursor)).await?;
        let log_total = self
            .store
            .count_activity(&self.ticket_id, ActivityKind::Log)
            .await?;
        Ok(FeedPage {
            number: 0,
            entries,
            has_more,
            log_total,
        })
    }

    async fn fetch(&self, start_after: Option<FeedCursor>) -> AppResult<(Vec<ActivityEntry>, bool)> {
        let query = ActivityQuery {
            filter: self.filter,
            start_after,
            limit: self.page_size + 1,
        };
        let mut entries = self.store.query_activity(&self.ticket_id, &query).await?;
        let has_more = entries.len() > self.page_size;
        entries.truncate(self.page_size);
        Ok((entries, has_more))
    }
}

/// Applies a feed filter to a live snapshot, keeping its order.
pub fn filter_snapshot(entries: &[ActivityEntry], filter: ActivityFilter) -> Vec<ActivityEntry> {
    entries
        .iter()
        .filter(|entry| filter.matches(entry.kind))
        .cloned()
        .collect()
}
