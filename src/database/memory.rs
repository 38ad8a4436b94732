use super::{DocumentStore, ID_FIELD, SetChange, SortBy, StoreError, new_record_id};
use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

/// Store primitives that can be made to fail one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Query,
    Create,
    Upsert,
    Update,
    Delete,
    Increment,
    CountedSet,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::Get,
        Operation::Query,
        Operation::Create,
        Operation::Upsert,
        Operation::Update,
        Operation::Delete,
        Operation::Increment,
        Operation::CountedSet,
    ];
}

/// Embedded document store.
///
/// Records keep insertion order within a collection, so an unsorted query
/// returns them in the order they were created. Each primitive holds the
/// write lock for its whole read-modify-write, which makes it atomic.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    offline: AtomicBool,
    failing: Mutex<HashSet<Operation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Make one primitive fail while the others keep working.
    pub fn fail_operation(&self, operation: Operation, failing: bool) {
        if let Ok(mut set) = self.failing.lock() {
            if failing {
                set.insert(operation);
            } else {
                set.remove(&operation);
            }
        }
    }

    fn check_online(&self, operation: Operation) -> Result<(), StoreError> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Backend("store is offline".to_string()));
        }
        let failing = self
            .failing
            .lock()
            .map(|set| set.contains(&operation))
            .unwrap_or(false);
        if failing {
            return Err(StoreError::Backend(format!("{:?} is failing", operation)));
        }
        Ok(())
    }
}

fn has_id(record: &Document, id: &str) -> bool {
    record.get_str(ID_FIELD).is_ok_and(|record_id| record_id == id)
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

fn find_mut<'a>(
    records: &'a mut HashMap<String, Vec<Document>>,
    collection: &str,
    id: &str,
) -> Result<&'a mut Document, StoreError> {
    records
        .get_mut(collection)
        .and_then(|docs| docs.iter_mut().find(|record| has_id(record, id)))
        .ok_or_else(|| not_found(collection, id))
}

fn matches(record: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| record.get(field) == Some(expected))
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Bson::String(x)), Some(Bson::String(y))) => x.cmp(y),
        (Some(Bson::Boolean(x)), Some(Bson::Boolean(y))) => x.cmp(y),
        (Some(Bson::DateTime(x)), Some(Bson::DateTime(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (as_number(x), as_number(y)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn counter_value(record: &Document, field: &str) -> Result<i64, StoreError> {
    match record.get(field) {
        None | Some(Bson::Null) => Ok(0),
        Some(Bson::Int32(n)) => Ok(i64::from(*n)),
        Some(Bson::Int64(n)) => Ok(*n),
        Some(other) => Err(StoreError::Malformed(format!(
            "field {} is not a counter: {}",
            field, other
        ))),
    }
}

fn set_members<'a>(record: &'a mut Document, field: &str) -> Result<&'a mut Vec<Bson>, StoreError> {
    if !record.contains_key(field) {
        record.insert(field, Bson::Array(Vec::new()));
    }
    record
        .get_array_mut(field)
        .map_err(|_| StoreError::Malformed(format!("field {} is not an array", field)))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check_online(Operation::Get)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|record| has_id(record, id)))
            .cloned())
    }

    async fn query(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<SortBy>,
    ) -> Result<Vec<Document>, StoreError> {
        self.check_online(Operation::Query)?;
        let collections = self.collections.read().await;
        let mut records: Vec<Document> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|record| matches(record, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = sort {
            records.sort_by(|a, b| {
                let order = compare_values(a.get(&sort.field), b.get(&sort.field));
                if sort.descending { order.reverse() } else { order }
            });
        }
        Ok(records)
    }

    async fn create(&self, collection: &str, mut record: Document) -> Result<String, StoreError> {
        self.check_online(Operation::Create)?;
        let id = match record.get_str(ID_FIELD) {
            Ok(id) => id.to_string(),
            Err(_) => {
                let id = new_record_id();
                record.insert(ID_FIELD, id.clone());
                id
            }
        };

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|existing| has_id(existing, &id)) {
            return Err(StoreError::Backend(format!(
                "duplicate id {} in {}",
                id, collection
            )));
        }
        docs.push(record);
        Ok(id)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        mut record: Document,
    ) -> Result<(), StoreError> {
        self.check_online(Operation::Upsert)?;
        record.insert(ID_FIELD, id);

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter().position(|existing| has_id(existing, id)) {
            Some(position) => docs[position] = record,
            None => docs.push(record),
        }
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        self.check_online(Operation::Update)?;
        let mut collections = self.collections.write().await;
        let record = find_mut(&mut collections, collection, id)?;
        for (field, value) in fields {
            record.insert(field, value);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_online(Operation::Delete)?;
        let mut collections = self.collections.write().await;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection, id))?;
        let position = docs
            .iter()
            .position(|record| has_id(record, id))
            .ok_or_else(|| not_found(collection, id))?;
        docs.remove(position);
        Ok(())
    }

    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        self.check_online(Operation::Increment)?;
        let mut collections = self.collections.write().await;
        let record = find_mut(&mut collections, collection, id)?;
        let current = counter_value(record, field)?;
        let next = current + delta;
        if next >= 0 {
            record.insert(field, Bson::Int64(next));
        }
        Ok(())
    }

    async fn change_counted_set(
        &self,
        collection: &str,
        id: &str,
        set_field: &str,
        counter_field: &str,
        value: Bson,
        change: SetChange,
    ) -> Result<bool, StoreError> {
        self.check_online(Operation::CountedSet)?;
        let mut collections = self.collections.write().await;
        let record = find_mut(&mut collections, collection, id)?;
        let counter = counter_value(record, counter_field)?;
        let members = set_members(record, set_field)?;
        let present = members.contains(&value);

        let delta = match change {
            SetChange::Add if !present => {
                members.push(value);
                1
            }
            SetChange::Remove if present => {
                members.retain(|member| *member != value);
                -1
            }
            _ => return Ok(false),
        };
        record.insert(counter_field, Bson::Int64((counter + delta).max(0)));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn create_assigns_ids_and_get_reads_back() {
        let store = MemoryStore::new();
        let id = store
            .create("comments", doc! { "content": "hello" })
            .await
            .unwrap();

        let record = store.get("comments", &id).await.unwrap().unwrap();
        assert_eq!(record.get_str("content").unwrap(), "hello");
        assert_eq!(record.get_str("_id").unwrap(), id);
        assert!(store.get("comments", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_filters_and_sorts_stably() {
        let store = MemoryStore::new();
        store
            .create("votes", doc! { "_id": "a", "poll": "p1", "rank": 2 })
            .await
            .unwrap();
        store
            .create("votes", doc! { "_id": "b", "poll": "p2", "rank": 1 })
            .await
            .unwrap();
        store
            .create("votes", doc! { "_id": "c", "poll": "p1", "rank": 2 })
            .await
            .unwrap();
        store
            .create("votes", doc! { "_id": "d", "poll": "p1", "rank": 5 })
            .await
            .unwrap();

        let records = store
            .query("votes", doc! { "poll": "p1" }, Some(SortBy::descending("rank")))
            .await
            .unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.get_str("_id").unwrap()).collect();
        assert_eq!(ids, vec!["d", "a", "c"]);
    }

    #[tokio::test]
    async fn upsert_replaces_in_place() {
        let store = MemoryStore::new();
        store
            .upsert("poll_votes", "a1_u1", doc! { "option_index": 0 })
            .await
            .unwrap();
        store
            .upsert("poll_votes", "a1_u1", doc! { "option_index": 1 })
            .await
            .unwrap();

        let records = store.query("poll_votes", doc! {}, None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_i32("option_index").unwrap(), 1);
    }

    async fn likes(store: &MemoryStore, id: &str) -> (i64, usize) {
        let record = store.get("comments", id).await.unwrap().unwrap();
        (
            record.get_i64("likes").unwrap(),
            record.get_array("liked_by").unwrap().len(),
        )
    }

    async fn change(store: &MemoryStore, id: &str, user: &str, change: SetChange) -> bool {
        store
            .change_counted_set("comments", id, "liked_by", "likes", user.into(), change)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn counted_set_moves_the_counter_with_the_set() {
        let store = MemoryStore::new();
        let id = store.create("comments", doc! { "likes": 0_i64 }).await.unwrap();

        assert!(change(&store, &id, "u1", SetChange::Add).await);
        assert!(!change(&store, &id, "u1", SetChange::Add).await);
        assert!(change(&store, &id, "u2", SetChange::Add).await);
        assert_eq!(likes(&store, &id).await, (2, 2));

        assert!(change(&store, &id, "u1", SetChange::Remove).await);
        assert!(!change(&store, &id, "u1", SetChange::Remove).await);
        assert_eq!(likes(&store, &id).await, (1, 1));
    }

    #[tokio::test]
    async fn failed_counted_set_changes_nothing() {
        let store = MemoryStore::new();
        let id = store.create("comments", doc! { "likes": 0_i64 }).await.unwrap();

        store.fail_operation(Operation::CountedSet, true);
        let err = store
            .change_counted_set("comments", &id, "liked_by", "likes", "u1".into(), SetChange::Add)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        store.fail_operation(Operation::CountedSet, false);

        let record = store.get("comments", &id).await.unwrap().unwrap();
        assert_eq!(record.get_i64("likes").unwrap(), 0);
        assert!(record.get_array("liked_by").is_err());
    }

    #[tokio::test]
    async fn single_operations_can_be_failed() {
        let store = MemoryStore::new();
        let id = store.create("comments", doc! { "likes": 0_i64 }).await.unwrap();

        store.fail_operation(Operation::Increment, true);
        assert!(store.increment_field("comments", &id, "likes", 1).await.is_err());
        assert!(store.get("comments", &id).await.unwrap().is_some());

        store.fail_operation(Operation::Increment, false);
        store.increment_field("comments", &id, "likes", 1).await.unwrap();
        let record = store.get("comments", &id).await.unwrap().unwrap();
        assert_eq!(record.get_i64("likes").unwrap(), 1);
    }

    #[tokio::test]
    async fn counters_never_drop_below_zero() {
        let store = MemoryStore::new();
        let id = store.create("comments", doc! { "likes": 1_i64 }).await.unwrap();

        store.increment_field("comments", &id, "likes", -1).await.unwrap();
        store.increment_field("comments", &id, "likes", -1).await.unwrap();

        let record = store.get("comments", &id).await.unwrap().unwrap();
        assert_eq!(record.get_i64("likes").unwrap(), 0);
    }

    #[tokio::test]
    async fn mutations_on_missing_records_are_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("comments", "nope", doc! { "pinned": true })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let err = store.delete("comments", "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.get("comments", "x").await,
            Err(StoreError::Backend(_))
        ));
        store.set_offline(false);
        assert!(store.get("comments", "x").await.unwrap().is_none());
    }
}
