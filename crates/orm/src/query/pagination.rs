//! Query Builder pagination - offset pages and chunked iteration

use std::fmt;
use std::future::Future;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::builder::QueryBuilder;
use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, Model};
use crate::validation::ValidationErrors;

/// Requested window. `page` (1-based) wins over `offset` when both are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOptions {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub page: Option<u64>,
}

impl PaginationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub total_records: u64,
    pub total_pages: u64,
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
}

/// One page of models.
///
/// `next_cursor` is the offset the next page starts at, `None` on the last
/// page.
pub struct Page<E> {
    pub data: Vec<Model<E>>,
    pub paging: Paging,
    pub next_cursor: Option<u64>,
}

impl<E> fmt::Debug for Page<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("data", &self.data)
            .field("paging", &self.paging)
            .field("next_cursor", &self.next_cursor)
            .finish()
    }
}

impl<E: Entity> Serialize for Page<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut page = serializer.serialize_struct("Page", 3)?;
        page.serialize_field("data", &self.data)?;
        page.serialize_field("paging", &self.paging)?;
        page.serialize_field("next_cursor", &self.next_cursor)?;
        page.end()
    }
}

fn invalid(field: &str, message: &str) -> ModelError {
    let mut errors = ValidationErrors::new();
    errors.add_error(field, message);
    ModelError::Validation(errors)
}

impl<E: Entity> QueryBuilder<E> {
    /// Fetch one page plus the totals of the whole filtered set.
    ///
    /// The total is counted over the same predicates with no window, so a
    /// grouped query pages through groups.
    pub async fn paginate(self, db: &Database, options: PaginationOptions) -> ModelResult<Page<E>> {
        let config = db.config();
        let limit = match options.limit {
            Some(0) => return Err(invalid("limit", "The limit must be greater than zero")),
            Some(limit) => limit.min(config.max_page_size),
            None => config.default_page_size,
        };

        let (page, offset) = match options.page {
            Some(page) => {
                let page = page.max(1);
                let offset = (page - 1)
                    .checked_mul(limit)
                    .ok_or_else(|| invalid("page", "The page is out of range"))?;
                (page, offset)
            }
            None => {
                let offset = options.offset.unwrap_or(0);
                (offset / limit + 1, offset)
            }
        };

        let total_records = self.clone().count(db).await?;
        let total_pages = total_records.div_ceil(limit);
        let data = self.offset(offset).limit(limit).get(db).await?;

        let next_cursor = offset
            .checked_add(limit)
            .filter(|next| *next < total_records);

        tracing::debug!(
            "Paginated {}: page {} of {} ({} record(s))",
            E::entity_name(),
            page,
            total_pages,
            total_records
        );

        Ok(Page {
            data,
            paging: Paging {
                total_records,
                total_pages,
                page,
                limit,
                offset,
            },
            next_cursor,
        })
    }

    /// Hand `callback` successive windows of `size` rows until a fetch comes
    /// back short. Returns the number of chunks delivered.
    ///
    /// Rows must not be reordered by concurrent writers while iterating.
    pub async fn chunk<F, Fut>(self, db: &Database, size: u64, mut callback: F) -> ModelResult<u64>
    where
        F: FnMut(Vec<Model<E>>) -> Fut,
        Fut: Future<Output = ModelResult<()>>,
    {
        if size == 0 {
            return Err(invalid("size", "The chunk size must be greater than zero"));
        }

        let start = self.state.offset().unwrap_or(0);
        let mut chunks = 0u64;
        loop {
            let batch = self
                .clone()
                .offset(start.saturating_add(chunks.saturating_mul(size)))
                .limit(size)
                .get(db)
                .await?;
            let fetched = batch.len() as u64;
            if fetched == 0 {
                break;
            }

            callback(batch).await?;
            chunks += 1;
            if fetched < size {
                break;
            }
        }
        Ok(chunks)
    }

    /// `chunk` with the configured chunk size
    pub async fn each_chunk<F, Fut>(self, db: &Database, callback: F) -> ModelResult<u64>
    where
        F: FnMut(Vec<Model<E>>) -> Fut,
        Fut: Future<Output = ModelResult<()>>,
    {
        let size = db.config().chunk_size;
        self.chunk(db, size, callback).await
    }
}
