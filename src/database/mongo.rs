use super::{DocumentStore, ID_FIELD, SetChange, SortBy, StoreError, new_record_id};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{Bson, Document, doc};
use mongodb::{Client, Collection, Database, options::ClientOptions};

/// Document store backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database_name: &str) -> Result<Self, StoreError> {
        let mut client_options = ClientOptions::parse(uri).await?;
        client_options.app_name = Some("article_engagement".to_string());

        let client = Client::with_options(client_options)?;

        // Ping the server to see if you can connect to the cluster
        client.database("admin").run_command(doc! {"ping": 1}).await?;

        info!("Connected successfully to MongoDB, database {}", database_name);

        Ok(Self {
            db: client.database(database_name),
        })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    async fn ensure_exists(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        match self.get(collection, id).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }
}

fn single_field(field: &str, value: impl Into<Bson>) -> Document {
    let mut document = Document::new();
    document.insert(field, value);
    document
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collection(collection)
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn query(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<SortBy>,
    ) -> Result<Vec<Document>, StoreError> {
        let records = self.collection(collection);
        let mut find = records.find(filter);
        if let Some(sort) = sort {
            let direction = if sort.descending { -1 } else { 1 };
            find = find.sort(single_field(&sort.field, direction));
        }

        let records: Vec<Document> = find.await?.try_collect().await?;
        Ok(records)
    }

    async fn create(&self, collection: &str, mut record: Document) -> Result<String, StoreError> {
        let id = match record.get_str(ID_FIELD) {
            Ok(id) => id.to_string(),
            Err(_) => {
                let id = new_record_id();
                record.insert(ID_FIELD, id.clone());
                id
            }
        };

        self.collection(collection).insert_one(record).await?;
        Ok(id)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        mut record: Document,
    ) -> Result<(), StoreError> {
        record.insert(ID_FIELD, id);
        self.collection(collection)
            .replace_one(doc! { "_id": id }, record)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": fields })
            .await?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await?;

        if result.deleted_count == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        let mut filter = doc! { "_id": id };
        if delta < 0 {
            filter.insert(field, doc! { "$gte": -delta });
        }

        let result = self
            .collection(collection)
            .update_one(filter, doc! { "$inc": single_field(field, delta) })
            .await?;

        if result.matched_count == 0 {
            // Either the record is gone or the counter is already at its floor.
            self.ensure_exists(collection, id).await?;
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
        let mut filter = doc! { "_id": id };
        let update = match change {
            SetChange::Add => {
                filter.insert(set_field, doc! { "$ne": value.clone() });
                doc! {
                    "$addToSet": single_field(set_field, value),
                    "$inc": single_field(counter_field, 1_i64),
                }
            }
            SetChange::Remove => {
                filter.insert(set_field, value.clone());
                doc! {
                    "$pull": single_field(set_field, value),
                    "$inc": single_field(counter_field, -1_i64),
                }
            }
        };

        let result = self
            .collection(collection)
            .update_one(filter, update)
            .await?;

        if result.matched_count == 0 {
            // Either the record is gone or the membership already matched.
            self.ensure_exists(collection, id).await?;
            return Ok(false);
        }
        Ok(result.modified_count > 0)
    }
}
