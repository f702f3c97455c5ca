pub mod config;
pub mod context;
pub mod models;
pub mod repo;
pub mod source;

pub use context::RunContext;
pub use repo::RepoSlug;
pub use source::{FetchError, RunSource};
