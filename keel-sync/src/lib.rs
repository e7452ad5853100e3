//! # keel-sync
//!
//! Local state cache, change detection and push orchestration.
//!
//! Call [`push`] to reconcile a project checkout with its remote project, or
//! [`plan`] to preview the same work without touching either side.

pub mod cache;
pub mod category;
pub mod detect;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod local;
pub mod page;
pub mod plan;
pub mod push;
pub mod report;

pub use cache::{FingerprintTable, StateCache};
pub use category::{Category, CategorySet, ParseCategoryError};
pub use detect::{Change, ChangeKind};
pub use error::SyncError;
pub use gateway::{RemoteError, RemoteGateway, RemoteProject};
pub use local::LocalState;
pub use page::{Page, PageSource, Paginator, ProjectListing};
pub use plan::{plan, PendingChange, PushPlan};
pub use push::{default_concurrency, push, PushOptions};
pub use report::{CategoryReport, EntityFailure, PushReport};
