use async_trait::async_trait;
use aws_sdk_dynamodb::{
    types::{AttributeValue, ReturnValue},
    Client as DynamoClient,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{Store, StoreError};
use crate::types::{Problem, Query, Role, User};

type Item = HashMap<String, AttributeValue>;

const USER: &str = "USER";
const PROBLEM: &str = "PROBLEM";
const QUERY: &str = "QUERY";

/// Single-table layout: every record is its own item with
/// PK = SK = `<ENTITY>#<id>` and an `entity` attribute used by listing scans.
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn put(&self, item: Item) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, entity: &str, id: &str) -> Result<Option<Item>, StoreError> {
        let pk = key(entity, id);
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(backend)?;
        Ok(result.item().cloned())
    }

    /// Scan every item of one entity kind, optionally narrowed by a single
    /// attribute equality. Follows pagination to the end.
    async fn scan(
        &self,
        entity: &str,
        matching: Option<(&str, &str)>,
    ) -> Result<Vec<Item>, StoreError> {
        let filter = match matching {
            Some(_) => "#entity = :entity AND #attr = :value",
            None => "#entity = :entity",
        };

        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(filter)
                .expression_attribute_names("#entity", "entity")
                .expression_attribute_values(":entity", AttributeValue::S(entity.to_string()))
                .set_exclusive_start_key(start_key.take());

            if let Some((attr, value)) = matching {
                request = request
                    .expression_attribute_names("#attr", attr)
                    .expression_attribute_values(":value", AttributeValue::S(value.to_string()));
            }

            let output = request.send().await.map_err(backend)?;
            items.extend(output.items().iter().cloned());

            match output.last_evaluated_key() {
                Some(last) if !last.is_empty() => start_key = Some(last.clone()),
                _ => break,
            }
        }

        tracing::debug!("Scanned {} {} items", items.len(), entity);
        Ok(items)
    }

    async fn find_user_by(&self, attr: &str, value: &str) -> Result<Option<User>, StoreError> {
        self.scan(USER, Some((attr, value)))
            .await?
            .first()
            .map(user_from_item)
            .transpose()
    }
}

#[async_trait]
impl Store for DynamoStore {
    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.put(user_to_item(user)).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.get(USER, user_id)
            .await?
            .as_ref()
            .map(user_from_item)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_user_by("email", email).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_user_by("username", username).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users = self
            .scan(USER, None)
            .await?
            .iter()
            .map(user_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let pk = key(USER, user_id);
        let output = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(backend)?;
        Ok(output.attributes().is_some_and(|a| !a.is_empty()))
    }

    async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError> {
        self.put(problem_to_item(problem)).await
    }

    async fn get_problem(&self, problem_id: &str) -> Result<Option<Problem>, StoreError> {
        self.get(PROBLEM, problem_id)
            .await?
            .as_ref()
            .map(problem_from_item)
            .transpose()
    }

    async fn list_problems(&self, owner: Option<&str>) -> Result<Vec<Problem>, StoreError> {
        let mut problems = self
            .scan(PROBLEM, owner.map(|o| ("owner_id", o)))
            .await?
            .iter()
            .map(problem_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        problems.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(problems)
    }

    async fn put_query(&self, query: &Query) -> Result<(), StoreError> {
        self.put(query_to_item(query)).await
    }

    async fn get_query(&self, query_id: &str) -> Result<Option<Query>, StoreError> {
        self.get(QUERY, query_id)
            .await?
            .as_ref()
            .map(query_from_item)
            .transpose()
    }

    async fn list_queries(&self, collector: Option<&str>) -> Result<Vec<Query>, StoreError> {
        let mut queries = self
            .scan(QUERY, collector.map(|c| ("collected_by", c)))
            .await?
            .iter()
            .map(query_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        queries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(queries)
    }
}

// ========== ITEM MAPPING ==========

fn key(entity: &str, id: &str) -> String {
    format!("{}#{}", entity, id)
}

fn backend<E: std::fmt::Debug>(e: E) -> StoreError {
    StoreError::Backend(format!("{:?}", e))
}

fn base_item(entity: &str, id: &str) -> Item {
    let pk = key(entity, id);
    let mut item = Item::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk));
    item.insert("entity".to_string(), AttributeValue::S(entity.to_string()));
    item
}

fn put_s(item: &mut Item, name: &str, value: &str) {
    item.insert(name.to_string(), AttributeValue::S(value.to_string()));
}

fn put_opt_s(item: &mut Item, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        put_s(item, name, value);
    }
}

fn put_opt_n(item: &mut Item, name: &str, value: Option<f64>) {
    if let Some(value) = value {
        item.insert(name.to_string(), AttributeValue::N(value.to_string()));
    }
}

fn opt_string(item: &Item, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

fn string(item: &Item, name: &str) -> Result<String, StoreError> {
    opt_string(item, name).ok_or_else(|| StoreError::Corrupt(format!("missing attribute {}", name)))
}

fn opt_number(item: &Item, name: &str) -> Option<f64> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<f64>().ok())
}

fn opt_bool(item: &Item, name: &str) -> Option<bool> {
    item.get(name).and_then(|v| v.as_bool().ok()).copied()
}

fn timestamp(item: &Item, name: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw = string(item, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{} is not RFC 3339: {}", name, e)))
}

fn parsed<T: std::str::FromStr>(item: &Item, name: &str) -> Result<T, StoreError> {
    let raw = string(item, name)?;
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown {} value {}", name, raw)))
}

fn user_to_item(user: &User) -> Item {
    let mut item = base_item(USER, &user.id);
    put_s(&mut item, "user_id", &user.id);
    put_s(&mut item, "name", &user.name);
    put_s(&mut item, "email", &user.email);
    put_s(&mut item, "username", &user.username);
    put_s(&mut item, "password_hash", &user.password_hash);
    put_s(&mut item, "role", user.role.as_str());
    put_s(&mut item, "created_at", &user.created_at.to_rfc3339());
    put_s(&mut item, "updated_at", &user.updated_at.to_rfc3339());
    item
}

fn user_from_item(item: &Item) -> Result<User, StoreError> {
    let created_at = timestamp(item, "created_at")?;
    Ok(User {
        id: string(item, "user_id")?,
        name: opt_string(item, "name").unwrap_or_default(),
        email: string(item, "email")?,
        username: string(item, "username")?,
        password_hash: string(item, "password_hash")?,
        // Records written before the role attribute existed only carry is_admin
        role: Role::from_legacy(
            opt_string(item, "role").as_deref(),
            opt_bool(item, "is_admin"),
        ),
        created_at,
        updated_at: timestamp(item, "updated_at").unwrap_or(created_at),
    })
}

fn problem_to_item(problem: &Problem) -> Item {
    let mut item = base_item(PROBLEM, &problem.id);
    put_s(&mut item, "problem_id", &problem.id);
    put_s(&mut item, "title", &problem.title);
    put_s(&mut item, "description", &problem.description);
    put_s(&mut item, "email", &problem.email);
    item.insert("anonymous".to_string(), AttributeValue::Bool(problem.anonymous));
    put_opt_s(&mut item, "owner_id", problem.user.as_deref());
    put_s(&mut item, "status", problem.status.as_str());
    put_opt_s(&mut item, "admin_notes", problem.admin_notes.as_deref());
    put_opt_s(&mut item, "location", problem.location.as_deref());
    put_opt_n(&mut item, "latitude", problem.latitude);
    put_opt_n(&mut item, "longitude", problem.longitude);
    put_s(&mut item, "created_at", &problem.created_at.to_rfc3339());
    put_s(&mut item, "updated_at", &problem.updated_at.to_rfc3339());
    item
}

fn problem_from_item(item: &Item) -> Result<Problem, StoreError> {
    let created_at = timestamp(item, "created_at")?;
    Ok(Problem {
        id: string(item, "problem_id")?,
        title: string(item, "title")?,
        description: string(item, "description")?,
        email: opt_string(item, "email").unwrap_or_default(),
        anonymous: opt_bool(item, "anonymous").unwrap_or(false),
        user: opt_string(item, "owner_id"),
        status: parsed(item, "status")?,
        admin_notes: opt_string(item, "admin_notes"),
        location: opt_string(item, "location"),
        latitude: opt_number(item, "latitude"),
        longitude: opt_number(item, "longitude"),
        created_at,
        updated_at: timestamp(item, "updated_at").unwrap_or(created_at),
    })
}

fn query_to_item(query: &Query) -> Item {
    let mut item = base_item(QUERY, &query.id);
    put_s(&mut item, "query_id", &query.id);
    put_s(&mut item, "person_name", &query.person_name);
    put_s(&mut item, "contact_info", &query.contact_info);
    put_s(&mut item, "location", &query.location);
    put_opt_n(&mut item, "latitude", query.latitude);
    put_opt_n(&mut item, "longitude", query.longitude);
    put_s(&mut item, "category", query.category.as_str());
    put_s(&mut item, "problem_title", &query.problem_title);
    put_s(&mut item, "description", &query.description);
    put_s(&mut item, "urgency", query.urgency.as_str());
    put_s(&mut item, "admin_notes", &query.admin_notes);
    put_s(&mut item, "collected_by", &query.collected_by);
    put_s(&mut item, "status", query.status.as_str());
    put_s(&mut item, "created_at", &query.created_at.to_rfc3339());
    put_s(&mut item, "updated_at", &query.updated_at.to_rfc3339());
    item
}

fn query_from_item(item: &Item) -> Result<Query, StoreError> {
    let created_at = timestamp(item, "created_at")?;
    Ok(Query {
        id: string(item, "query_id")?,
        person_name: string(item, "person_name")?,
        contact_info: opt_string(item, "contact_info").unwrap_or_default(),
        location: string(item, "location")?,
        latitude: opt_number(item, "latitude"),
        longitude: opt_number(item, "longitude"),
        category: parsed(item, "category")?,
        problem_title: string(item, "problem_title")?,
        description: string(item, "description")?,
        urgency: parsed(item, "urgency")?,
        admin_notes: opt_string(item, "admin_notes").unwrap_or_default(),
        collected_by: string(item, "collected_by")?,
        status: parsed(item, "status")?,
        created_at,
        updated_at: timestamp(item, "updated_at").unwrap_or(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CreateQueryRequest, ProblemStatus};

    fn sample_user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: "u1".into(),
            name: "Asha".into(),
            email: "asha@example.org".into(),
            username: "asha".into(),
            password_hash: "$argon2id$v=19$hash".into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_item_layout() {
        let item = user_to_item(&sample_user(Role::Enumerator));
        assert_eq!(item.get("PK").unwrap().as_s().unwrap(), "USER#u1");
        assert_eq!(item.get("SK").unwrap().as_s().unwrap(), "USER#u1");
        assert_eq!(item.get("entity").unwrap().as_s().unwrap(), "USER");
        assert_eq!(item.get("role").unwrap().as_s().unwrap(), "enumerator");
        assert!(item.get("is_admin").is_none());

        let user = user_from_item(&item).unwrap();
        assert_eq!(user.role, Role::Enumerator);
        assert_eq!(user.username, "asha");
    }

    #[test]
    fn test_legacy_user_item_reads_is_admin() {
        let mut item = user_to_item(&sample_user(Role::User));
        item.remove("role");
        item.insert("is_admin".to_string(), AttributeValue::Bool(true));
        assert_eq!(user_from_item(&item).unwrap().role, Role::Admin);

        item.insert("is_admin".to_string(), AttributeValue::Bool(false));
        assert_eq!(user_from_item(&item).unwrap().role, Role::User);
    }

    #[test]
    fn test_query_item_keeps_enums_and_coordinates() {
        let query = CreateQueryRequest {
            person_name: Some("Ravi".into()),
            location: Some("Ward 4".into()),
            latitude: Some(serde_json::json!(12.97)),
            category: Some("Electricity".into()),
            problem_title: Some("Outage".into()),
            description: Some("Three days".into()),
            urgency: Some("Critical".into()),
            ..Default::default()
        }
        .into_query("enum-1", Utc::now())
        .unwrap();

        let item = query_to_item(&query);
        assert_eq!(item.get("latitude").unwrap().as_n().unwrap(), "12.97");
        assert!(item.get("longitude").is_none());

        let back = query_from_item(&item).unwrap();
        assert_eq!(back.urgency, query.urgency);
        assert_eq!(back.category, query.category);
        assert_eq!(back.latitude, Some(12.97));
        assert_eq!(back.collected_by, "enum-1");
    }

    #[test]
    fn test_corrupt_status_is_reported() {
        let now = Utc::now();
        let problem = Problem {
            id: "p1".into(),
            title: "t".into(),
            description: "d".into(),
            email: String::new(),
            anonymous: true,
            user: None,
            status: ProblemStatus::Closed,
            admin_notes: None,
            location: None,
            latitude: None,
            longitude: None,
            created_at: now,
            updated_at: now,
        };
        let mut item = problem_to_item(&problem);
        assert!(item.get("owner_id").is_none());
        assert_eq!(problem_from_item(&item).unwrap().status, ProblemStatus::Closed);

        item.insert("status".to_string(), AttributeValue::S("archived".into()));
        assert!(matches!(problem_from_item(&item), Err(StoreError::Corrupt(_))));
    }
}
