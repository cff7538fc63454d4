use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Select, Set, TransactionTrait,
};

use super::{
    MetadataUpdate, ObjectDocument, ObjectFilter, ObjectKind, ObjectSelector, ObjectStore,
    StorageKey, StoredObject,
};
use crate::db::entities::{mail_object, mail_payload};
use crate::folder::Uid;
use crate::mail::MailHeaders;

/// Object store over a SQL database through sea-orm.
///
/// Metadata lives in `mail_objects`, payload bytes in `mail_payloads`; both
/// rows of an object are written in one transaction. The connection is a
/// pooled handle and may be shared by every folder of a repository.
pub struct SeaOrmObjectStore {
    db: DatabaseConnection,
}

impl SeaOrmObjectStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn filtered(filter: &ObjectFilter) -> Select<mail_object::Entity> {
        let mut query = mail_object::Entity::find()
            .filter(mail_object::Column::Namespace.eq(filter.namespace()))
            .filter(mail_object::Column::Kind.eq(filter.kind().as_str()));

        if let Some(path) = filter.path() {
            query = query.filter(mail_object::Column::Path.eq(path));
        }
        if let Some(uid) = filter.uid() {
            query = query.filter(mail_object::Column::Uid.eq(uid.value()));
        }

        query
    }
}

fn to_stored(model: mail_object::Model) -> Result<StoredObject> {
    // Headers only describe the message, a bad document must not hide it
    let headers = model
        .headers
        .and_then(|value| match serde_json::from_value::<MailHeaders>(value) {
            Ok(headers) => Some(headers),
            Err(err) => {
                tracing::warn!(
                    "Ignoring unreadable headers on object {}: {}",
                    model.id,
                    err
                );
                None
            }
        });

    Ok(StoredObject {
        key: StorageKey::from(model.id),
        document: ObjectDocument {
            namespace: model.namespace,
            account: model.account,
            path: model.path,
            kind: ObjectKind::parse(&model.kind)?,
            uid: model.uid.map(Uid::from),
            filename: model.filename,
            flags: model
                .flags
                .parse()
                .with_context(|| format!("Invalid flags on object {}", model.id))?,
            size: model.size.max(0) as u64,
            md5: model.md5,
            sha256: model.sha256,
            headers,
            created_at: model.created_at,
            modified_at: model.modified_at,
        },
    })
}

#[async_trait]
impl ObjectStore for SeaOrmObjectStore {
    async fn query(&self, filter: &ObjectFilter) -> Result<Vec<StoredObject>> {
        let models = Self::filtered(filter)
            .order_by_asc(mail_object::Column::Uid)
            .all(&self.db)
            .await
            .context("Failed to query mail objects")?;

        models.into_iter().map(to_stored).collect()
    }

    async fn put_object(&self, payload: &[u8], document: ObjectDocument) -> Result<StorageKey> {
        let key = StorageKey::generate();
        let headers = document
            .headers
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .context("Failed to serialize mail headers")?;

        let object = mail_object::ActiveModel {
            id: Set(key.as_uuid()),
            namespace: Set(document.namespace),
            account: Set(document.account),
            path: Set(document.path),
            kind: Set(document.kind.as_str().to_string()),
            uid: Set(document.uid.map(|uid| uid.value())),
            filename: Set(document.filename),
            flags: Set(document.flags.to_string()),
            size: Set(document.size as i64),
            md5: Set(document.md5),
            sha256: Set(document.sha256),
            headers: Set(headers),
            created_at: Set(document.created_at),
            modified_at: Set(document.modified_at),
        };
        let data = mail_payload::ActiveModel {
            object_id: Set(key.as_uuid()),
            data: Set(payload.to_vec()),
        };

        let txn = self.db.begin().await.context("Failed to open transaction")?;
        object
            .insert(&txn)
            .await
            .context("Failed to insert mail object record")?;
        data.insert(&txn)
            .await
            .context("Failed to insert mail payload")?;
        txn.commit().await.context("Failed to commit mail object")?;

        tracing::debug!("Stored object {} ({} bytes)", key, payload.len());
        Ok(key)
    }

    async fn get_object(
        &self,
        selector: &ObjectSelector,
    ) -> Result<Option<(Vec<u8>, StoredObject)>> {
        let model = match selector {
            ObjectSelector::Key(key) => mail_object::Entity::find_by_id(key.as_uuid())
                .one(&self.db)
                .await
                .context("Failed to look up mail object")?,
            ObjectSelector::Latest(filter) => Self::filtered(filter)
                .order_by_desc(mail_object::Column::ModifiedAt)
                .one(&self.db)
                .await
                .context("Failed to look up mail object")?,
        };

        let Some(model) = model else {
            return Ok(None);
        };

        let payload = mail_payload::Entity::find_by_id(model.id)
            .one(&self.db)
            .await
            .context("Failed to fetch mail payload")?
            .with_context(|| format!("Payload missing for object {}", model.id))?;

        Ok(Some((payload.data, to_stored(model)?)))
    }

    async fn update_metadata(&self, key: &StorageKey, update: MetadataUpdate) -> Result<()> {
        let mut object = mail_object::ActiveModel {
            id: Set(key.as_uuid()),
            modified_at: Set(update.modified_at),
            ..Default::default()
        };
        if let Some(flags) = update.flags {
            object.flags = Set(flags.to_string());
        }
        if let Some(uid) = update.uid {
            object.uid = Set(Some(uid.value()));
        }
        if let Some(filename) = update.filename {
            object.filename = Set(filename);
        }

        object
            .update(&self.db)
            .await
            .with_context(|| format!("Failed to update metadata of object {}", key))?;
        Ok(())
    }

    async fn delete_object(&self, key: &StorageKey) -> Result<()> {
        // mail_payloads rows go with the object through ON DELETE CASCADE
        mail_object::Entity::delete_by_id(key.as_uuid())
            .exec(&self.db)
            .await
            .with_context(|| format!("Failed to delete object {}", key))?;

        tracing::debug!("Deleted object {}", key);
        Ok(())
    }
}
