pub mod dynamo;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Problem, Query, User};

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Stored item is malformed: {0}")]
    Corrupt(String),
}

/// Persistence for the three record kinds. Every write is a single-item put
/// or delete; there are no transactions.
///
/// List operations return records newest first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn put_user(&self, user: &User) -> Result<(), StoreError>;
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Returns false when there was nothing to delete.
    async fn delete_user(&self, user_id: &str) -> Result<bool, StoreError>;

    async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError>;
    async fn get_problem(&self, problem_id: &str) -> Result<Option<Problem>, StoreError>;
    /// All problems, or only those owned by `owner`.
    async fn list_problems(&self, owner: Option<&str>) -> Result<Vec<Problem>, StoreError>;

    async fn put_query(&self, query: &Query) -> Result<(), StoreError>;
    async fn get_query(&self, query_id: &str) -> Result<Option<Query>, StoreError>;
    /// All queries, or only those collected by `collector`.
    async fn list_queries(&self, collector: Option<&str>) -> Result<Vec<Query>, StoreError>;

    /// Login accepts either a username or an email address.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        match self.find_user_by_username(login).await? {
            Some(user) => Ok(Some(user)),
            None => self.find_user_by_email(login).await,
        }
    }
}
