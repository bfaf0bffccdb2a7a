use std::fmt;

use async_trait::async_trait;

use chrono::{DateTime, Utc};

use crate::error::*;

/// A queryable field of a stored document.
pub trait DocumentField: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
  /// Field (column) name in the backing store.
  fn name(self) -> &'static str;
}

/// A type that can be kept in a `Store`.
pub trait Document: Clone + Send + Sync + 'static {
  type Field: DocumentField;

  /// Collection (table) name.
  const COLLECTION: &'static str;

  /// Field holding the store-assigned id.
  const ID_FIELD: Self::Field;

  /// Fields whose values must be unique across the collection.
  fn unique_fields() -> &'static [Self::Field];

  fn id(&self) -> Option<i32>;

  fn set_id(&mut self, id: i32);

  fn field(&self, field: Self::Field) -> FieldValue;

  /// Set one field. Fails with `Error::BadRequest` for read-only fields or
  /// a value of the wrong kind.
  fn set_field(&mut self, field: Self::Field, val: FieldValue) -> Result<()>;

  /// Update timestamps for a save at `now`.
  fn touch(&mut self, now: DateTime<Utc>, is_new: bool);
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  /// Unset value; equal only to other `Null`s. Stored documents never hold
  /// a `Null` field, so lookups by `Null` match nothing.
  Null,
  Int(i32),
  BigInt(i64),
  Text(String),
  IntList(Vec<i32>),
  TextList(Vec<String>),
}

impl FieldValue {
  /// List membership for list values, equality otherwise.
  pub fn contains(&self, val: &FieldValue) -> bool {
    match (self, val) {
      (FieldValue::IntList(list), FieldValue::Int(v)) => list.contains(v),
      (FieldValue::TextList(list), FieldValue::Text(v)) => list.contains(v),
      (this, val) => this == val,
    }
  }
}

impl From<i32> for FieldValue {
  fn from(val: i32) -> Self {
    FieldValue::Int(val)
  }
}

impl From<&str> for FieldValue {
  fn from(val: &str) -> Self {
    FieldValue::Text(val.to_string())
  }
}

impl From<String> for FieldValue {
  fn from(val: String) -> Self {
    FieldValue::Text(val)
  }
}

/// Error for a `Document::set_field` call the document can't apply.
pub fn cannot_set<F: DocumentField>(collection: &str, field: F, val: &FieldValue) -> Error {
  Error::BadRequest(format!("can't set {}.{} to {:?}", collection, field.name(), val))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter<F> {
  /// Field equals value.
  Eq(F, FieldValue),
  /// List field contains value.
  Contains(F, FieldValue),
}

impl<F: DocumentField> Filter<F> {
  pub fn matches<D: Document<Field = F>>(&self, doc: &D) -> bool {
    match self {
      Filter::Eq(field, val) => doc.field(*field) == *val,
      Filter::Contains(field, val) => doc.field(*field).contains(val),
    }
  }
}

/// Persistence backend for one document type.
#[async_trait]
pub trait Store<D: Document>: Send + Sync {
  /// Insert (no id) or update (has id) `doc`, assigning id and timestamps.
  /// Unique field collisions fail with `Error::already_taken`.
  async fn save(&self, doc: &mut D) -> Result<()>;

  async fn find_by_field(&self, field: D::Field, val: &FieldValue) -> Result<Option<D>>;

  /// Write only `field` of the stored document `id` and bump its update time.
  /// Other fields keep their stored values. Returns the stored document.
  async fn update_field(&self, id: i32, field: D::Field, val: &FieldValue) -> Result<D>;

  async fn count_where(&self, filter: &Filter<D::Field>) -> Result<i64>;

  /// Returns number of deleted documents.
  async fn delete(&self, id: i32) -> Result<u64>;
}
