use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for source fetching; tests and future authenticated
/// mirrors swap in their own implementation.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
