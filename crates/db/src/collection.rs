use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::database::{Collections, Database, Documents};
use crate::document::{compare_fields, Document, FieldRef};
use crate::error::{DbError, DbResult, FieldError};
use crate::filter::{Filter, FindOptions, SortDirection};
use crate::schema::Schema;

/// One bucket of a `group_count` aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub value: Value,
    pub count: u64,
}

/// Handle to a named collection. Cheap to clone.
#[derive(Clone)]
pub struct Collection {
    db: Database,
    name: Arc<str>,
    schema: Arc<dyn Schema>,
}

impl Collection {
    pub(crate) fn new(db: Database, name: String, schema: Arc<dyn Schema>) -> Self {
        Self {
            db,
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert_one(&self, body: Map<String, Value>) -> DbResult<Document> {
        let fields = self.conform(body).map_err(|errors| self.validation(errors))?;
        let mut inserted = self.commit_inserts(vec![Document::new(fields)]).await?;
        Ok(inserted.remove(0))
    }

    /// Insert several documents; nothing is stored unless every one conforms.
    pub async fn insert_many(&self, bodies: Vec<Map<String, Value>>) -> DbResult<Vec<Document>> {
        let mut documents = Vec::with_capacity(bodies.len());
        let mut errors = Vec::new();

        for (index, body) in bodies.into_iter().enumerate() {
            match self.conform(body) {
                Ok(fields) => documents.push(Document::new(fields)),
                Err(found) => errors.extend(found.into_iter().map(|error| error.at_index(index))),
            }
        }

        if !errors.is_empty() {
            return Err(self.validation(errors));
        }

        self.commit_inserts(documents).await
    }

    pub async fn find(&self, filter: &Filter, options: &FindOptions) -> DbResult<Vec<Document>> {
        let collections = self.db.state().read().await;
        let mut matched: Vec<&Document> = self
            .documents(&collections)
            .map(|documents| documents.values().filter(|doc| filter.matches(doc)).collect())
            .unwrap_or_default();

        if let Some(sort) = &options.sort {
            // Stable, so ties keep insertion order.
            matched.sort_by(|a, b| sort.compare(a, b));
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Document>> {
        let id = parse_id(id)?;
        let collections = self.db.state().read().await;
        Ok(self
            .documents(&collections)
            .and_then(|documents| documents.get(&id))
            .cloned())
    }

    /// Merge `patch` into the stored document and re-check the result against
    /// the schema. Returns the updated document, or `None` for an unknown id.
    pub async fn update_by_id(&self, id: &str, mut patch: Map<String, Value>) -> DbResult<Option<Document>> {
        let id = parse_id(id)?;
        Document::strip_reserved(&mut patch);

        let mut collections = self.db.state().write().await;
        let Some(current) = collections
            .get(self.name())
            .and_then(|documents| documents.get(&id))
            .cloned()
        else {
            return Ok(None);
        };

        let mut merged = current.fields.clone();
        merged.extend(patch);
        let fields = self.conform(merged).map_err(|errors| self.validation(errors))?;

        let updated = Document {
            fields,
            updated_at: OffsetDateTime::now_utc().max(current.created_at),
            ..current.clone()
        };

        let documents = collections.entry(self.name().to_string()).or_default();
        documents.insert(id, updated.clone());

        if let Err(err) = self.db.persist(&collections).await {
            collections
                .entry(self.name().to_string())
                .or_default()
                .insert(id, current);
            return Err(err);
        }

        tracing::debug!(target: "libris-db", collection = self.name(), %id, "document updated");
        Ok(Some(updated))
    }

    pub async fn delete_by_id(&self, id: &str) -> DbResult<Option<Document>> {
        let id = parse_id(id)?;

        let mut collections = self.db.state().write().await;
        let Some(removed) = collections
            .get_mut(self.name())
            .and_then(|documents| documents.remove(&id))
        else {
            return Ok(None);
        };

        if let Err(err) = self.db.persist(&collections).await {
            collections
                .entry(self.name().to_string())
                .or_default()
                .insert(id, removed);
            return Err(err);
        }

        tracing::debug!(target: "libris-db", collection = self.name(), %id, "document deleted");
        Ok(Some(removed))
    }

    pub async fn count(&self, filter: &Filter) -> DbResult<u64> {
        let collections = self.db.state().read().await;
        let count = self
            .documents(&collections)
            .map_or(0, |documents| documents.values().filter(|doc| filter.matches(doc)).count());
        Ok(count as u64)
    }

    /// Count documents per distinct value of `field`, ordered by that value.
    /// Documents without the field are counted under `null`.
    pub async fn group_count(&self, field: &str, direction: SortDirection) -> DbResult<Vec<Group>> {
        let collections = self.db.state().read().await;
        let mut buckets: HashMap<String, Group> = HashMap::new();

        for doc in self.documents(&collections).into_iter().flat_map(|documents| documents.values()) {
            let value = doc.get(field).to_value();
            buckets
                .entry(value.to_string())
                .or_insert_with(|| Group { value, count: 0 })
                .count += 1;
        }

        let mut groups: Vec<Group> = buckets.into_values().collect();
        groups.sort_by(|a, b| {
            direction.apply(compare_fields(
                &FieldRef::Value(&a.value),
                &FieldRef::Value(&b.value),
            ))
        });
        Ok(groups)
    }

    fn documents<'a>(&self, collections: &'a Collections) -> Option<&'a Documents> {
        collections.get(self.name())
    }

    fn conform(&self, mut body: Map<String, Value>) -> Result<Map<String, Value>, Vec<FieldError>> {
        Document::strip_reserved(&mut body);
        self.schema.conform(body)
    }

    fn validation(&self, errors: Vec<FieldError>) -> DbError {
        DbError::Validation {
            schema: self.schema.name().to_string(),
            errors,
        }
    }

    async fn commit_inserts(&self, inserted: Vec<Document>) -> DbResult<Vec<Document>> {
        let mut collections = self.db.state().write().await;
        let documents = collections.entry(self.name().to_string()).or_default();
        for doc in &inserted {
            documents.insert(doc.id, doc.clone());
        }

        if let Err(err) = self.db.persist(&collections).await {
            if let Some(documents) = collections.get_mut(self.name()) {
                for doc in &inserted {
                    documents.remove(&doc.id);
                }
            }
            return Err(err);
        }

        tracing::debug!(
            target: "libris-db",
            collection = self.name(),
            count = inserted.len(),
            "documents inserted"
        );
        Ok(inserted)
    }
}

fn parse_id(id: &str) -> DbResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| DbError::InvalidId {
        field: "id",
        value: id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DeclaredSchema, FieldKind};
    use crate::filter::Sort;
    use serde_json::json;

    fn books() -> Collection {
        let schema = DeclaredSchema::new("Book")
            .required("title", FieldKind::Text)
            .required("author", FieldKind::Text)
            .required("publishedYear", FieldKind::Integer);
        Database::in_memory().collection("books", Arc::new(schema))
    }

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn seed(collection: &Collection) -> Vec<Document> {
        collection
            .insert_many(vec![
                body(json!({"title": "Dune", "author": "Frank Herbert", "publishedYear": 1965})),
                body(json!({"title": "Hyperion", "author": "Dan Simmons", "publishedYear": 1989})),
                body(json!({"title": "Children of Dune", "author": "Frank Herbert", "publishedYear": 1976})),
            ])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_identity_and_timestamps() {
        let books = books();
        let doc = books
            .insert_one(body(json!({
                "_id": "client-chosen",
                "title": "Dune",
                "author": "Frank Herbert",
                "publishedYear": 1965
            })))
            .await
            .unwrap();

        assert_ne!(doc.id.to_string(), "client-chosen");
        assert_eq!(doc.created_at, doc.updated_at);
        assert_eq!(doc.fields.len(), 3);
    }

    #[tokio::test]
    async fn insert_many_is_all_or_nothing() {
        let books = books();
        let err = books
            .insert_many(vec![
                body(json!({"title": "Dune", "author": "Frank Herbert", "publishedYear": 1965})),
                body(json!({"title": "Untitled", "publishedYear": 2001})),
            ])
            .await
            .unwrap_err();

        match err {
            DbError::Validation { schema, errors } => {
                assert_eq!(schema, "Book");
                assert_eq!(errors, vec![FieldError::new("1.author", "`author` is required")]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(books.count(&Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_keeps_insertion_order_without_sort() {
        let books = books();
        let seeded = seed(&books).await;

        let found = books.find(&Filter::All, &FindOptions::default()).await.unwrap();
        assert_eq!(found, seeded);
    }

    #[tokio::test]
    async fn find_sorts_then_pages() {
        let books = books();
        seed(&books).await;

        let options = FindOptions::default()
            .sort(Sort::new("publishedYear", SortDirection::Descending))
            .skip(1)
            .limit(1);
        let found = books.find(&Filter::All, &options).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fields["title"], json!("Children of Dune"));
    }

    #[tokio::test]
    async fn update_merges_and_revalidates() {
        let books = books();
        let seeded = seed(&books).await;
        let id = seeded[0].id.to_string();

        let updated = books
            .update_by_id(&id, body(json!({"publishedYear": "1966"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.fields["publishedYear"], json!(1966));
        assert_eq!(updated.fields["title"], json!("Dune"));
        assert_eq!(updated.created_at, seeded[0].created_at);
        assert!(updated.updated_at >= updated.created_at);

        let err = books
            .update_by_id(&id, body(json!({"title": null})))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));

        let stored = books.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids() {
        let books = books();
        seed(&books).await;
        let unknown = Uuid::now_v7().to_string();

        assert!(books.find_by_id(&unknown).await.unwrap().is_none());
        assert!(books
            .update_by_id(&unknown, body(json!({"title": "X"})))
            .await
            .unwrap()
            .is_none());
        assert!(books.delete_by_id(&unknown).await.unwrap().is_none());

        let err = books.find_by_id("42").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid id: 42.");
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let books = books();
        let seeded = seed(&books).await;
        let id = seeded[1].id.to_string();

        let removed = books.delete_by_id(&id).await.unwrap().unwrap();
        assert_eq!(removed, seeded[1]);
        assert!(books.find_by_id(&id).await.unwrap().is_none());
        assert_eq!(books.count(&Filter::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn group_count_orders_by_value() {
        let books = books();
        seed(&books).await;

        let authors = books.group_count("author", SortDirection::Ascending).await.unwrap();
        assert_eq!(
            authors,
            vec![
                Group { value: json!("Dan Simmons"), count: 1 },
                Group { value: json!("Frank Herbert"), count: 2 },
            ]
        );

        let years = books
            .group_count("publishedYear", SortDirection::Descending)
            .await
            .unwrap();
        let values: Vec<_> = years.iter().map(|group| group.value.clone()).collect();
        assert_eq!(values, vec![json!(1989), json!(1976), json!(1965)]);
    }

    #[tokio::test]
    async fn empty_collection_queries() {
        let books = books();
        assert!(books.find(&Filter::All, &FindOptions::default()).await.unwrap().is_empty());
        assert_eq!(books.count(&Filter::All).await.unwrap(), 0);
        assert!(books.group_count("author", SortDirection::Ascending).await.unwrap().is_empty());
    }
}
