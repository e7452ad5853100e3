//! Cursor-paginated listings as a restartable, caller-driven sequence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::gateway::{RemoteError, RemoteGateway, RemoteProject};

/// One page of results. `next_cursor == None` marks the last page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Something that can fetch a page given a cursor.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch(&self, cursor: Option<&str>) -> Result<Page<Self::Item>, RemoteError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Start,
    At(String),
    Done,
}

/// Drives a [`PageSource`] one page at a time.
///
/// Stopping early is just not calling [`next_page`](Self::next_page) again.
#[derive(Debug)]
pub struct Paginator<S> {
    source: S,
    state: State,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: State::Start,
        }
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    ///
    /// A failed fetch leaves the position unchanged, so calling again retries
    /// the same page.
    pub async fn next_page(&mut self) -> Result<Option<Vec<S::Item>>, RemoteError> {
        let cursor = match &self.state {
            State::Done => return Ok(None),
            State::Start => None,
            State::At(cursor) => Some(cursor.clone()),
        };
        let page = self.source.fetch(cursor.as_deref()).await?;
        self.state = match page.next_cursor {
            // A cursor that does not advance would loop forever.
            Some(next) if Some(&next) != cursor.as_ref() => State::At(next),
            _ => State::Done,
        };
        Ok(Some(page.items))
    }

    /// Go back to the first page.
    pub fn restart(&mut self) {
        self.state = State::Start;
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Pull every remaining page.
    pub async fn collect_all(mut self) -> Result<Vec<S::Item>, RemoteError> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }
}

/// [`PageSource`] over [`RemoteGateway::list_projects`].
pub struct ProjectListing<'a> {
    gateway: &'a dyn RemoteGateway,
}

impl<'a> ProjectListing<'a> {
    pub fn new(gateway: &'a dyn RemoteGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl PageSource for ProjectListing<'_> {
    type Item = RemoteProject;

    async fn fetch(&self, cursor: Option<&str>) -> Result<Page<RemoteProject>, RemoteError> {
        self.gateway.list_projects(cursor).await
    }
}
