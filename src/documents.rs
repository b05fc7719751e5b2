use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tokio::sync::RwLock;

use crate::error::{Result, TaskError};
use crate::language::Language;
use crate::localized::{LocalizedMap, LocalizedValue};
use crate::task::DocumentType;

/// Accumulated write-back for one document: field name -> language -> value.
///
/// Applied key-by-key so concurrent edits to sibling languages or unrelated
/// fields are never clobbered by a whole-map replacement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationUpdate {
    entries: BTreeMap<String, BTreeMap<Language, LocalizedValue>>,
}

impl TranslationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &str, language: Language, value: LocalizedValue) {
        self.entries
            .entry(field.to_string())
            .or_default()
            .insert(language, value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &BTreeMap<Language, LocalizedValue>)> {
        self.entries.iter()
    }

    pub fn get(&self, field: &str, language: Language) -> Option<&LocalizedValue> {
        self.entries.get(field).and_then(|langs| langs.get(&language))
    }
}

/// Accessor contract over the domain document collections.
///
/// The worker only ever reads localized maps and writes individual
/// field/language keys; the documents themselves belong to the application's
/// own services, which substitute their implementation of this trait.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches the localized maps for the requested fields of one document.
    /// Fields absent on the document are omitted from the result; a missing
    /// document is an error.
    async fn localized_fields(
        &self,
        document_type: DocumentType,
        document_id: &str,
        fields: &[String],
    ) -> Result<HashMap<String, LocalizedMap>>;

    /// Writes the given field/language keys. Keys not named in `update` are
    /// left untouched.
    async fn apply_translations(
        &self,
        document_type: DocumentType,
        document_id: &str,
        update: &TranslationUpdate,
    ) -> Result<()>;
}

/// Process-local document store for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<(DocumentType, String), HashMap<String, LocalizedMap>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_document(
        &self,
        document_type: DocumentType,
        document_id: impl Into<String>,
        fields: HashMap<String, LocalizedMap>,
    ) {
        self.documents
            .write()
            .await
            .insert((document_type, document_id.into()), fields);
    }

    pub async fn document(
        &self,
        document_type: DocumentType,
        document_id: &str,
    ) -> Option<HashMap<String, LocalizedMap>> {
        self.documents
            .read()
            .await
            .get(&(document_type, document_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn localized_fields(
        &self,
        document_type: DocumentType,
        document_id: &str,
        fields: &[String],
    ) -> Result<HashMap<String, LocalizedMap>> {
        let documents = self.documents.read().await;
        let document = documents
            .get(&(document_type, document_id.to_string()))
            .ok_or_else(|| TaskError::DocumentNotFound {
                document_type,
                document_id: document_id.to_string(),
            })?;

        Ok(fields
            .iter()
            .filter_map(|field| document.get(field).map(|map| (field.clone(), map.clone())))
            .collect())
    }

    async fn apply_translations(
        &self,
        document_type: DocumentType,
        document_id: &str,
        update: &TranslationUpdate,
    ) -> Result<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&(document_type, document_id.to_string()))
            .ok_or_else(|| TaskError::DocumentNotFound {
                document_type,
                document_id: document_id.to_string(),
            })?;

        for (field, languages) in update.fields() {
            let map = document.entry(field.clone()).or_default();
            for (language, value) in languages {
                map.insert(language.code().to_string(), value.clone());
            }
        }
        Ok(())
    }
}

const DOCUMENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS localized_documents (
    document_type TEXT NOT NULL,
    document_id   TEXT NOT NULL,
    fields        JSONB NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (document_type, document_id)
)
"#;

/// Reference Postgres accessor: one JSONB column of localized fields per
/// document row, updated with `jsonb_set` per field/language key.
///
/// Deployments whose documents live elsewhere implement [`DocumentStore`]
/// over their own models instead.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn from_pool(pool: PgPool) -> Self {
        PgDocumentStore { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(DOCUMENT_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn localized_fields(
        &self,
        document_type: DocumentType,
        document_id: &str,
        fields: &[String],
    ) -> Result<HashMap<String, LocalizedMap>> {
        let row = sqlx::query(
            "SELECT fields FROM localized_documents WHERE document_type = $1 AND document_id = $2",
        )
        .bind(document_type.as_str())
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| TaskError::DocumentNotFound {
            document_type,
            document_id: document_id.to_string(),
        })?;

        let stored: serde_json::Value = row.try_get("fields")?;
        let mut all: HashMap<String, LocalizedMap> = serde_json::from_value(stored)?;
        Ok(fields
            .iter()
            .filter_map(|field| all.remove(field).map(|map| (field.clone(), map)))
            .collect())
    }

    async fn apply_translations(
        &self,
        document_type: DocumentType,
        document_id: &str,
        update: &TranslationUpdate,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (field, languages) in update.fields() {
            for (language, value) in languages {
                let path = vec![field.clone(), language.code().to_string()];
                let result = sqlx::query(
                    r#"
                    UPDATE localized_documents
                    SET fields = jsonb_set(fields, $3, $4, true)
                    WHERE document_type = $1 AND document_id = $2
                    "#,
                )
                .bind(document_type.as_str())
                .bind(document_id)
                .bind(&path)
                .bind(serde_json::to_value(value)?)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(TaskError::DocumentNotFound {
                        document_type,
                        document_id: document_id.to_string(),
                    });
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_field(entries: &[(&str, &str)]) -> LocalizedMap {
        entries
            .iter()
            .map(|(code, text)| (code.to_string(), LocalizedValue::text(*text)))
            .collect()
    }

    #[tokio::test]
    async fn missing_document_is_an_error() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .localized_fields(DocumentType::Program, "ghost", &["name".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn absent_fields_are_omitted_not_errors() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_document(
                DocumentType::Program,
                "p1",
                HashMap::from([("name".to_string(), name_field(&[("en", "Strength Builder")]))]),
            )
            .await;

        let fields = store
            .localized_fields(
                DocumentType::Program,
                "p1",
                &["name".to_string(), "description".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("name"));
    }

    #[tokio::test]
    async fn apply_translations_only_touches_named_keys() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_document(
                DocumentType::Program,
                "p1",
                HashMap::from([(
                    "name".to_string(),
                    name_field(&[("en", "Strength Builder"), ("fr", "Programme force")]),
                )]),
            )
            .await;

        let mut update = TranslationUpdate::new();
        update.set("name", Language::Es, LocalizedValue::text("Constructor de fuerza"));
        store
            .apply_translations(DocumentType::Program, "p1", &update)
            .await
            .unwrap();

        let document = store.document(DocumentType::Program, "p1").await.unwrap();
        let name = document.get("name").unwrap();
        // The concurrent-edit-sensitive keys survive untouched.
        assert_eq!(name.get("en"), Some(&LocalizedValue::text("Strength Builder")));
        assert_eq!(name.get("fr"), Some(&LocalizedValue::text("Programme force")));
        assert_eq!(
            name.get("es"),
            Some(&LocalizedValue::text("Constructor de fuerza"))
        );
    }
}
