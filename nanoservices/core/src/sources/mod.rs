pub mod http_client;
pub mod pagination;
pub mod traits;

pub use http_client::{GitHubClient, GitHubClientBuilder, GitHubSourceFactory};
pub use traits::{RepositorySource, SourceFactory};
