//! SurrealDB-backed DocumentStore implementation
//!
//! One table per collection. Each row keeps the board-facing id in
//! `doc_id` and the document fields in a flexible `data` object, converting
//! to/from `storage_traits` types at the boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::config::StoreConfig;
use crate::error::StorageError;
use crate::storage_traits::{
    Document, DocumentData, DocumentId, DocumentPatch, DocumentRef, DocumentStore, FieldUpdate,
    StorageResult,
};

/// Row shape stored in every collection table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbDocument {
    doc_id: String,
    data: Value,
}

impl DbDocument {
    fn into_document(self, collection: &str) -> StorageResult<Document> {
        let data = match self.data {
            Value::Object(map) => map,
            Value::Null => DocumentData::new(),
            other => {
                return Err(StorageError::Serialization(format!(
                    "{collection}/{}: data is not an object: {other}",
                    self.doc_id
                )))
            }
        };
        Ok(Document::new(DocumentRef::new(collection, self.doc_id), data))
    }
}

/// SurrealDB-backed implementation of [`DocumentStore`].
#[derive(Clone)]
pub struct SurrealDocumentStore {
    db: Surreal<Any>,
}

impl SurrealDocumentStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        Self::connect(&StoreConfig::in_memory()).await
    }

    /// Create from environment variables (see [`StoreConfig::from_env`]).
    pub async fn from_env() -> StorageResult<Self> {
        Self::connect(&StoreConfig::from_env()).await
    }

    /// Connect, sign in when credentials are configured, and select the
    /// namespace/database.
    #[instrument(skip(config), fields(url = %config.url, namespace = %config.namespace, database = %config.database))]
    pub async fn connect(config: &StoreConfig) -> StorageResult<Self> {
        if let Some(path) = config.local_path() {
            std::fs::create_dir_all(path).map_err(|e| {
                StorageError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path, e
                ))
            })?;
        }

        let db = surrealdb::engine::any::connect(config.url.as_str())
            .await
            .map_err(|e| {
                StorageError::Connection(format!("Failed to connect to {}: {}", config.url, e))
            })?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if config.is_root {
                db.signin(Root {
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StorageError::Connection(format!("Root auth failed: {e}")))?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StorageError::Connection(format!("DB auth failed: {e}")))?;
            }
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StorageError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        info!("SurrealDocumentStore connected");
        Ok(Self { db })
    }

    /// Write a document under a caller-chosen id, replacing any previous
    /// version. Used for seeding pre-existing documents.
    #[instrument(skip(self, data))]
    pub async fn put_document(
        &self,
        collection: &str,
        id: &DocumentId,
        data: DocumentData,
    ) -> StorageResult<DocumentRef> {
        self.db
            .query("DELETE type::table($tb) WHERE doc_id = $id")
            .bind(("tb", collection.to_string()))
            .bind(("id", id.as_str().to_string()))
            .await?
            .check()?;
        self.insert_row(collection, id, data).await?;
        Ok(DocumentRef::new(collection, id.clone()))
    }

    // -- private helpers -----------------------------------------------------

    async fn insert_row(
        &self,
        collection: &str,
        id: &DocumentId,
        data: DocumentData,
    ) -> StorageResult<()> {
        let row = DbDocument {
            doc_id: id.as_str().to_string(),
            data: Value::Object(data),
        };
        self.db
            .query("CREATE type::table($tb) CONTENT $row RETURN NONE")
            .bind(("tb", collection.to_string()))
            .bind(("row", row))
            .await?
            .check()?;
        Ok(())
    }

    async fn fetch_row(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<Option<DbDocument>> {
        let mut res = self
            .db
            .query("SELECT doc_id, data FROM type::table($tb) WHERE doc_id = $id LIMIT 1")
            .bind(("tb", collection.to_string()))
            .bind(("id", id.as_str().to_string()))
            .await?;
        let rows: Vec<DbDocument> = res.take(0)?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl DocumentStore for SurrealDocumentStore {
    #[instrument(skip(self))]
    async fn get_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<Option<Document>> {
        self.fetch_row(collection, id)
            .await?
            .map(|row| row.into_document(collection))
            .transpose()
    }

    #[instrument(skip(self))]
    async fn list_documents(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let mut res = self
            .db
            .query("SELECT doc_id, data FROM type::table($tb)")
            .bind(("tb", collection.to_string()))
            .await?;
        let rows: Vec<DbDocument> = res.take(0)?;
        debug!(count = rows.len(), "listed documents");
        rows.into_iter()
            .map(|row| row.into_document(collection))
            .collect()
    }

    #[instrument(skip(self, data))]
    async fn add_document(
        &self,
        collection: &str,
        data: DocumentData,
    ) -> StorageResult<DocumentRef> {
        let id = DocumentId::generate();
        self.insert_row(collection, &id, data).await?;
        debug!(id = %id, "document added");
        Ok(DocumentRef::new(collection, id))
    }

    #[instrument(skip(self, patch))]
    async fn update_document(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: DocumentPatch,
    ) -> StorageResult<()> {
        let not_found = || StorageError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        if patch.is_empty() {
            return self
                .fetch_row(collection, id)
                .await?
                .map(|_| ())
                .ok_or_else(not_found);
        }

        let (sql, values) = compile_patch(&patch)?;
        let mut attempt = 0;
        let updated = loop {
            attempt += 1;
            let mut query = self
                .db
                .query(sql.clone())
                .bind(("tb", collection.to_string()))
                .bind(("id", id.as_str().to_string()));
            for (name, value) in &values {
                query = query.bind((name.clone(), value.clone()));
            }
            match run_update(query).await {
                Err(StorageError::Backend(msg))
                    if is_conflict(&msg) && attempt < MAX_UPDATE_ATTEMPTS =>
                {
                    debug!(attempt, "update conflicted, retrying");
                }
                other => break other?,
            }
        };
        if updated.is_empty() {
            return Err(not_found());
        }
        Ok(())
    }
}

const MAX_UPDATE_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct UpdatedRow {
    #[allow(dead_code)]
    doc_id: String,
}

async fn run_update(
    query: surrealdb::method::Query<'_, Any>,
) -> StorageResult<Vec<UpdatedRow>> {
    let mut res = query.await?.check()?;
    Ok(res.take(0)?)
}

fn is_conflict(msg: &str) -> bool {
    msg.contains("conflict")
}

/// Compile a patch into one `UPDATE` so unions are applied against the
/// row's current value on the server, never a copy read earlier.
fn compile_patch(patch: &DocumentPatch) -> StorageResult<(String, Vec<(String, Value)>)> {
    let mut clauses = Vec::with_capacity(patch.updates().len());
    let mut values = Vec::with_capacity(patch.updates().len());
    for (i, (field, update)) in patch.updates().iter().enumerate() {
        let path = field_path(field)?;
        let param = format!("v{i}");
        match update {
            FieldUpdate::Set(value) => {
                clauses.push(format!("{path} = ${param}"));
                values.push((param, value.clone()));
            }
            FieldUpdate::ArrayUnion(items) => {
                clauses.push(format!(
                    "{path} = array::union(IF type::is::array({path}) THEN {path} ELSE [] END, ${param})"
                ));
                values.push((param, Value::Array(items.clone())));
            }
        }
    }
    let sql = format!(
        "UPDATE type::table($tb) SET {} WHERE doc_id = $id RETURN doc_id",
        clauses.join(", ")
    );
    Ok((sql, values))
}

/// Field names are spliced into the statement, so only plain identifiers pass.
fn field_path(field: &str) -> StorageResult<String> {
    let plain = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !plain {
        return Err(StorageError::Serialization(format!(
            "unsupported field name: {field:?}"
        )));
    }
    Ok(format!("data.`{field}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn union_compiles_to_a_single_server_side_update() {
        let patch = DocumentPatch::new()
            .set("Title", "t")
            .array_union("Replies", vec![json!("r1")]);
        let (sql, values) = compile_patch(&patch).unwrap();

        assert_eq!(sql.matches("UPDATE").count(), 1);
        assert!(sql.contains("data.`Title` = $v0"));
        assert!(sql.contains("data.`Replies` = array::union("));
        assert_eq!(
            values,
            vec![
                ("v0".to_string(), json!("t")),
                ("v1".to_string(), json!(["r1"])),
            ]
        );
    }

    #[test]
    fn field_names_outside_plain_identifiers_are_rejected() {
        assert!(field_path("PhotoURL").is_ok());
        assert!(field_path("").is_err());
        assert!(field_path("a` = 1, x").is_err());
    }
}
