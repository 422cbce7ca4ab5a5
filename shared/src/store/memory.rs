use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Store, StoreError};
use crate::types::{Problem, Query, User};

/// Process-local store for `STORE_BACKEND=memory` runs and tests. Contents
/// live as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    problems: RwLock<HashMap<String, Problem>>,
    queries: RwLock<HashMap<String, Query>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.users.write().await.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(user_id).is_some())
    }

    async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError> {
        self.problems
            .write()
            .await
            .insert(problem.id.clone(), problem.clone());
        Ok(())
    }

    async fn get_problem(&self, problem_id: &str) -> Result<Option<Problem>, StoreError> {
        Ok(self.problems.read().await.get(problem_id).cloned())
    }

    async fn list_problems(&self, owner: Option<&str>) -> Result<Vec<Problem>, StoreError> {
        let mut problems: Vec<Problem> = self
            .problems
            .read()
            .await
            .values()
            .filter(|p| owner.is_none() || p.user.as_deref() == owner)
            .cloned()
            .collect();
        problems.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(problems)
    }

    async fn put_query(&self, query: &Query) -> Result<(), StoreError> {
        self.queries
            .write()
            .await
            .insert(query.id.clone(), query.clone());
        Ok(())
    }

    async fn get_query(&self, query_id: &str) -> Result<Option<Query>, StoreError> {
        Ok(self.queries.read().await.get(query_id).cloned())
    }

    async fn list_queries(&self, collector: Option<&str>) -> Result<Vec<Query>, StoreError> {
        let mut queries: Vec<Query> = self
            .queries
            .read()
            .await
            .values()
            .filter(|q| collector.map_or(true, |c| q.collected_by == c))
            .cloned()
            .collect();
        queries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CreateProblemRequest, Role};
    use chrono::{Duration, Utc};

    fn user(id: &str, username: &str, email: &str) -> User {
        let now = Utc::now();
        User {
            id: id.into(),
            name: username.into(),
            email: email.into(),
            username: username.into(),
            password_hash: String::new(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_login_lookup_by_username_or_email() {
        let store = MemoryStore::new();
        store.put_user(&user("u1", "asha", "asha@example.org")).await.unwrap();

        let by_name = store.find_user_by_login("asha").await.unwrap().unwrap();
        let by_email = store.find_user_by_login("asha@example.org").await.unwrap().unwrap();
        assert_eq!(by_name.id, "u1");
        assert_eq!(by_email.id, "u1");
        assert!(store.find_user_by_login("ravi").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_problems_newest_first_and_filtered_by_owner() {
        let store = MemoryStore::new();
        let base = Utc::now();
        for (i, owner) in [Some("u1"), None, Some("u1")].into_iter().enumerate() {
            let problem = CreateProblemRequest {
                title: Some(format!("p{}", i)),
                description: Some("d".into()),
                ..Default::default()
            }
            .into_problem(owner.map(str::to_string), base + Duration::seconds(i as i64))
            .unwrap();
            store.put_problem(&problem).await.unwrap();
        }

        let all = store.list_problems(None).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["p2", "p1", "p0"]);

        let mine = store.list_problems(Some("u1")).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|p| p.user.as_deref() == Some("u1")));
    }

    #[tokio::test]
    async fn test_delete_user_reports_absence() {
        let store = MemoryStore::new();
        store.put_user(&user("u1", "asha", "asha@example.org")).await.unwrap();
        assert!(store.delete_user("u1").await.unwrap());
        assert!(!store.delete_user("u1").await.unwrap());
    }
}
