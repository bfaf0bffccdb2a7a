use log::*;

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use chrono::Utc;

use crate::error::*;

use super::store::*;

struct Collection<D> {
  next_id: i32,
  docs: BTreeMap<i32, D>,
}

/// Process-local `Store`, used for tests and the `memory` backend.
pub struct MemoryStore<D> {
  inner: Mutex<Collection<D>>,
}

impl<D: Document> MemoryStore<D> {
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Collection {
        next_id: 1,
        docs: BTreeMap::new(),
      }),
    }
  }

  pub fn len(&self) -> usize {
    self.lock().docs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn lock(&self) -> MutexGuard<'_, Collection<D>> {
    // a panicking writer can't leave a half-saved document behind.
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl<D: Document> Default for MemoryStore<D> {
  fn default() -> Self {
    Self::new()
  }
}

impl<D: Document> Collection<D> {
  fn check_unique(&self, doc: &D) -> Result<()> {
    for field in D::unique_fields() {
      let val = doc.field(*field);
      let taken = self.docs.values()
        .any(|other| other.id() != doc.id() && other.field(*field) == val);
      if taken {
        debug!("{}: unique field '{}' already taken", D::COLLECTION, field.name());
        return Err(Error::already_taken(field.name()));
      }
    }
    Ok(())
  }
}

#[async_trait]
impl<D: Document> Store<D> for MemoryStore<D> {
  async fn save(&self, doc: &mut D) -> Result<()> {
    let mut coll = self.lock();
    coll.check_unique(doc)?;

    let now = Utc::now();
    let id = match doc.id() {
      Some(id) => {
        if !coll.docs.contains_key(&id) {
          return Err(Error::not_found(D::COLLECTION));
        }
        doc.touch(now, false);
        id
      },
      None => {
        let id = coll.next_id;
        coll.next_id += 1;
        doc.set_id(id);
        doc.touch(now, true);
        id
      },
    };
    debug!("{}: saved id={}", D::COLLECTION, id);
    coll.docs.insert(id, doc.clone());
    Ok(())
  }

  async fn find_by_field(&self, field: D::Field, val: &FieldValue) -> Result<Option<D>> {
    let coll = self.lock();
    Ok(coll.docs.values().find(|doc| doc.field(field) == *val).cloned())
  }

  async fn update_field(&self, id: i32, field: D::Field, val: &FieldValue) -> Result<D> {
    let mut coll = self.lock();
    let mut doc = coll.docs.get(&id).cloned()
      .ok_or_else(|| Error::not_found(D::COLLECTION))?;
    doc.set_field(field, val.clone())?;
    coll.check_unique(&doc)?;
    doc.touch(Utc::now(), false);
    debug!("{}: updated id={}, field={}", D::COLLECTION, id, field.name());
    coll.docs.insert(id, doc.clone());
    Ok(doc)
  }

  async fn count_where(&self, filter: &Filter<D::Field>) -> Result<i64> {
    let coll = self.lock();
    Ok(coll.docs.values().filter(|doc| filter.matches(*doc)).count() as i64)
  }

  async fn delete(&self, id: i32) -> Result<u64> {
    let mut coll = self.lock();
    Ok(coll.docs.remove(&id).map_or(0, |_| 1))
  }
}
