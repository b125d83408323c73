pub mod client;
pub mod types;

pub use client::{ApiError, GithubClient, PULL_PAGE_SIZE, SEARCH_PAGE_SIZE};
pub use types::{Page, Quota};
