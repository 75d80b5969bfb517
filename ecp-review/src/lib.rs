//! ecp-review library - review and reprocessing session for one project
//!
//! Holds the client-side contract of the review screen: a snapshot of the
//! project's result rows kept fresh by a poll task, sorting and filtering,
//! id-keyed selection, bulk validation, optimistic single-row reprocessing
//! and the completion gate.

pub mod api;
pub mod error;
pub mod poller;
pub mod selection;
pub mod state;
pub mod table;

pub use api::{HttpReviewApi, ReviewApi};
pub use error::{ReviewError, ReviewResult};
pub use poller::ReviewSession;
pub use selection::Selection;
pub use state::{Phase, ReviewState};
pub use table::{Filters, SortDirection, SortKey, SortState};
