//! Policy-gated entry point used by hosts.
//!
//! Every read goes through the visibility check and every write through
//! the mutation check before the store is touched.

use crate::codec::FieldCodec;
use crate::db::Database;
use crate::error::{CharacterError, Result};
use crate::policy::{AccessPolicy, Action, Actor, RoleLookup};
use crate::schema::SchemaRegistry;
use crate::search::PaginatedSearch;
use crate::sheet::{Sheet, SheetRenderer};
use crate::store::{EntityStore, ListFilter};
use crate::types::{Column, ColumnType, FieldValue, Ownership, Record, RecordRole};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

#[derive(Clone)]
pub struct CharacterService {
    db: Arc<Database>,
    schema: SchemaRegistry,
    store: EntityStore,
    policy: AccessPolicy,
    codec: FieldCodec,
}

impl CharacterService {
    pub fn new(db: Arc<Database>, roles: Arc<dyn RoleLookup>) -> Self {
        let schema = SchemaRegistry::new(db.clone());
        Self {
            store: EntityStore::new(db.clone(), schema.clone()),
            codec: FieldCodec::new(schema.clone()),
            policy: AccessPolicy::new(roles),
            schema,
            db,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Resolve a user id into an actor
    pub fn actor(&self, user_id: i64) -> Result<Actor> {
        self.policy.actor(user_id)
    }

    /// Create a record owned by the actor
    pub fn create(
        &self,
        actor: &Actor,
        role: RecordRole,
        values: &HashMap<String, FieldValue>,
    ) -> Result<i64> {
        let ownership = Ownership {
            role,
            owner_user_id: Some(actor.user_id),
        };
        self.policy.enforce(actor, &ownership, Action::Create)?;
        self.store.create(role, actor.user_id, values)
    }

    /// Fetch a record. Records the actor may not see read as missing.
    pub fn get(&self, actor: &Actor, id: i64) -> Result<Record> {
        let record = self.store.get(id)?;
        if !self.policy.visible(actor, &record.ownership()) {
            return Err(CharacterError::record_not_found(id));
        }
        Ok(record)
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: i64,
        values: &HashMap<String, FieldValue>,
    ) -> Result<()> {
        let ownership = self.existing(id)?;
        self.policy.enforce(actor, &ownership, Action::Update)?;
        self.store.update(id, values)
    }

    /// Delete a record. Returns false when there was nothing to delete.
    pub fn delete(&self, actor: &Actor, id: i64) -> Result<bool> {
        let ownership = match self.store.ownership(id)? {
            Some(ownership) => ownership,
            None => return Ok(false),
        };
        self.policy.enforce(actor, &ownership, Action::Delete)?;
        self.store.delete(id)
    }

    /// Records matching `filter` that the actor may see, ascending by id
    pub fn list(&self, actor: &Actor, filter: &ListFilter) -> Result<Vec<Record>> {
        Ok(self
            .store
            .list(filter)?
            .into_iter()
            .filter(|record| self.policy.visible(actor, &record.ownership()))
            .collect())
    }

    /// Start a paged view over [`list`](Self::list)
    pub fn search(
        &self,
        actor: &Actor,
        filter: &ListFilter,
        page_size: NonZeroUsize,
    ) -> Result<PaginatedSearch<Record>> {
        Ok(PaginatedSearch::new(self.list(actor, filter)?, page_size))
    }

    /// The sheet for a record the actor may see
    pub fn sheet(&self, actor: &Actor, id: i64) -> Result<Sheet> {
        let record = self.get(actor, id)?;
        let columns = self.schema.list_columns()?;
        Ok(SheetRenderer::build(&columns, &record))
    }

    pub fn add_column(
        &self,
        actor: &Actor,
        name: &str,
        column_type: ColumnType,
        nullable: bool,
        default: Option<FieldValue>,
    ) -> Result<Column> {
        require_gm(actor, "add fields")?;
        self.schema.add_column(name, column_type, nullable, default)
    }

    pub fn remove_column(&self, actor: &Actor, name: &str) -> Result<()> {
        require_gm(actor, "remove fields")?;
        self.schema.remove_column(name)
    }

    fn existing(&self, id: i64) -> Result<Ownership> {
        self.store
            .ownership(id)?
            .ok_or_else(|| CharacterError::record_not_found(id))
    }
}

fn require_gm(actor: &Actor, what: &str) -> Result<()> {
    if actor.is_gm() {
        Ok(())
    } else {
        Err(CharacterError::denied(format!("only the GM may {what}")))
    }
}
