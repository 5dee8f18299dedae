use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use super::models::{UploadRecord, User};
use super::repository::{RepositoryError, UploadRepository, UserRepository};

type Item = HashMap<String, AttributeValue>;

#[derive(Clone)]
pub struct DynamoDbRepository {
    client: Client,
    users_table: String,
    uploads_table: String,
}

impl DynamoDbRepository {
    pub fn new(client: Client, users_table: String, uploads_table: String) -> Self {
        Self {
            client,
            users_table,
            uploads_table,
        }
    }

    /// Logs whether both tables are reachable. Does not fail startup.
    pub async fn check_tables(&self) {
        for table in [&self.users_table, &self.uploads_table] {
            match self.client.describe_table().table_name(table).send().await {
                Ok(response) => log::info!(
                    "DynamoDB table '{}' status: {:?}",
                    table,
                    response.table().and_then(|t| t.table_status())
                ),
                Err(e) => log::error!(
                    "DynamoDB table '{}' does not exist or is not accessible: {:?}",
                    table,
                    e
                ),
            }
        }
    }

    /// Scans `table` with `filter`, following pagination until exhausted.
    async fn scan_all(
        &self,
        table: &str,
        filter: &str,
        values: HashMap<String, AttributeValue>,
    ) -> Result<Vec<Item>, RepositoryError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(table)
                .filter_expression(filter)
                .set_expression_attribute_values(Some(values.clone()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            if let Some(page) = result.items {
                items.extend(page);
            }
            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    fn user_to_item(user: &User) -> Item {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(user.id.to_string()));
        item.insert(
            "cognito_sub".to_string(),
            AttributeValue::S(user.cognito_sub.clone()),
        );
        if let Some(token) = &user.cognito_access_token {
            item.insert(
                "cognito_access_token".to_string(),
                AttributeValue::S(token.clone()),
            );
        }
        if let Some(token) = &user.cognito_refresh_token {
            item.insert(
                "cognito_refresh_token".to_string(),
                AttributeValue::S(token.clone()),
            );
        }
        item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(user.created_at.to_rfc3339()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(user.updated_at.to_rfc3339()),
        );
        if let Some(last_login) = &user.last_login {
            item.insert(
                "last_login".to_string(),
                AttributeValue::S(last_login.to_rfc3339()),
            );
        }
        item.insert(
            "is_active".to_string(),
            AttributeValue::Bool(user.is_active),
        );
        item
    }

    fn upload_to_item(record: &UploadRecord) -> Item {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(record.id.to_string()));
        item.insert(
            "user_id".to_string(),
            AttributeValue::S(record.user_id.to_string()),
        );
        item.insert(
            "filename".to_string(),
            AttributeValue::S(record.filename.clone()),
        );
        item.insert(
            "disease_type".to_string(),
            AttributeValue::S(record.disease_type.clone()),
        );
        item.insert(
            "confidence".to_string(),
            AttributeValue::N(record.confidence.to_string()),
        );
        item.insert(
            "upload_date".to_string(),
            AttributeValue::S(record.upload_date.to_rfc3339()),
        );
        item
    }

    fn parse_user_from_item(item: &Item) -> Result<User, RepositoryError> {
        let id = parse_uuid(item, "id")?;
        let cognito_sub = parse_string(item, "cognito_sub")?;
        let cognito_access_token = optional_string(item, "cognito_access_token");
        let cognito_refresh_token = optional_string(item, "cognito_refresh_token");
        let email = parse_string(item, "email")?;
        let created_at = parse_timestamp(item, "created_at")?;
        let updated_at = parse_timestamp(item, "updated_at").unwrap_or(created_at);
        let last_login = parse_timestamp(item, "last_login").ok();
        let is_active = *item
            .get("is_active")
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(&true);

        Ok(User {
            id,
            cognito_sub,
            cognito_access_token,
            cognito_refresh_token,
            email,
            created_at,
            updated_at,
            last_login,
            is_active,
        })
    }

    fn parse_upload_from_item(item: &Item) -> Result<UploadRecord, RepositoryError> {
        let id = parse_uuid(item, "id")?;
        let user_id = parse_uuid(item, "user_id")?;
        let filename = parse_string(item, "filename")?;
        let disease_type = optional_string(item, "disease_type").unwrap_or_else(|| "Unknown".into());
        let confidence = item
            .get("confidence")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse::<f32>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid confidence".to_string()))?;
        let upload_date = parse_timestamp(item, "upload_date")?;

        Ok(UploadRecord {
            id,
            user_id,
            filename,
            disease_type,
            confidence,
            upload_date,
        })
    }
}

#[async_trait]
impl UploadRepository for DynamoDbRepository {
    async fn record_upload(&self, record: &UploadRecord) -> Result<(), RepositoryError> {
        self.client
            .put_item()
            .table_name(&self.uploads_table)
            .set_item(Some(Self::upload_to_item(record)))
            .send()
            .await
            .map_err(|e| {
                log::error!("DynamoDB put_item failed for upload {}: {:?}", record.id, e);
                RepositoryError::DynamoDb(e.to_string())
            })?;

        log::info!(
            "Recorded upload {} ({}) for user {}",
            record.id,
            record.disease_type,
            record.user_id
        );
        Ok(())
    }

    async fn list_uploads(&self, user_id: Uuid) -> Result<Vec<UploadRecord>, RepositoryError> {
        let mut values = HashMap::new();
        values.insert(
            ":user_id".to_string(),
            AttributeValue::S(user_id.to_string()),
        );
        let items = self
            .scan_all(&self.uploads_table, "user_id = :user_id", values)
            .await?;

        let mut records = items
            .iter()
            .map(Self::parse_upload_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(records)
    }
}

#[async_trait]
impl UserRepository for DynamoDbRepository {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        log::info!(
            "Creating user in DynamoDB table '{}': {}",
            self.users_table,
            user.email
        );

        match self
            .client
            .put_item()
            .table_name(&self.users_table)
            .set_item(Some(Self::user_to_item(user)))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
        {
            Ok(_) => {
                log::info!("Successfully created user in DynamoDB: {}", user.email);
                Ok(())
            }
            Err(e) => {
                log::error!("DynamoDB put_item failed for user {}: {:?}", user.email, e);
                Err(RepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.users_table)
            .key("id", AttributeValue::S(user_id.to_string()))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        match result.item {
            Some(item) => Ok(Some(Self::parse_user_from_item(&item)?)),
            None => Ok(None),
        }
    }

    async fn get_user_by_cognito_sub(
        &self,
        cognito_sub: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut values = HashMap::new();
        values.insert(
            ":cognito_sub".to_string(),
            AttributeValue::S(cognito_sub.to_string()),
        );
        let items = self
            .scan_all(&self.users_table, "cognito_sub = :cognito_sub", values)
            .await?;

        items
            .first()
            .map(Self::parse_user_from_item)
            .transpose()
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        log::info!("Updating user in DynamoDB: {}", user.email);

        let mut update_expression_parts = vec![
            "email = :email",
            "updated_at = :updated_at",
            "is_active = :is_active",
        ];
        let mut remove_parts = Vec::new();
        let mut values = HashMap::new();
        values.insert(":email".to_string(), AttributeValue::S(user.email.clone()));
        values.insert(
            ":updated_at".to_string(),
            AttributeValue::S(user.updated_at.to_rfc3339()),
        );
        values.insert(
            ":is_active".to_string(),
            AttributeValue::Bool(user.is_active),
        );

        match &user.cognito_access_token {
            Some(token) => {
                update_expression_parts.push("cognito_access_token = :cognito_access_token");
                values.insert(
                    ":cognito_access_token".to_string(),
                    AttributeValue::S(token.clone()),
                );
            }
            None => remove_parts.push("cognito_access_token"),
        }
        match &user.cognito_refresh_token {
            Some(token) => {
                update_expression_parts.push("cognito_refresh_token = :cognito_refresh_token");
                values.insert(
                    ":cognito_refresh_token".to_string(),
                    AttributeValue::S(token.clone()),
                );
            }
            None => remove_parts.push("cognito_refresh_token"),
        }
        if let Some(last_login) = &user.last_login {
            update_expression_parts.push("last_login = :last_login");
            values.insert(
                ":last_login".to_string(),
                AttributeValue::S(last_login.to_rfc3339()),
            );
        }

        let mut update_expression = format!("SET {}", update_expression_parts.join(", "));
        if !remove_parts.is_empty() {
            update_expression.push_str(&format!(" REMOVE {}", remove_parts.join(", ")));
        }
        log::debug!("Update expression: {}", update_expression);

        self.client
            .update_item()
            .table_name(&self.users_table)
            .key("id", AttributeValue::S(user.id.to_string()))
            .update_expression(update_expression)
            .set_expression_attribute_values(Some(values))
            .send()
            .await
            .map_err(|e| {
                log::error!(
                    "DynamoDB update_item failed for user {}: {:?}",
                    user.email,
                    e
                );
                let error_msg = if let Some(service_err) = e.as_service_error() {
                    format!("Service error: {:?}", service_err)
                } else {
                    format!("SDK error: {}", e)
                };
                RepositoryError::DynamoDb(error_msg)
            })?;

        log::info!("Successfully updated user: {}", user.email);
        Ok(())
    }
}

fn parse_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    optional_string(item, key).ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}

fn optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).cloned()
}

fn parse_uuid(item: &Item, key: &str) -> Result<Uuid, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}

fn parse_timestamp(item: &Item, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}
