use log::*;

use std::marker::PhantomData;

use async_trait::async_trait;

use chrono::Utc;

use tokio_postgres::{
  Row,
  error::SqlState,
  types::ToSql,
};

use crate::error::*;

use super::client::SharedClient;
use super::store::*;
use super::util::ColumnMappers;

pub type SqlParam = Box<dyn ToSql + Sync + Send>;

/// Bind value for `val`. `Null` has no column type to bind as, so it has none.
fn sql_value(val: &FieldValue) -> Option<&(dyn ToSql + Sync)> {
  match val {
    FieldValue::Null => None,
    FieldValue::Int(v) => Some(v),
    FieldValue::BigInt(v) => Some(v),
    FieldValue::Text(v) => Some(v),
    FieldValue::IntList(v) => Some(v),
    FieldValue::TextList(v) => Some(v),
  }
}

pub fn param<T: ToSql + Sync + Send + 'static>(val: T) -> SqlParam {
  Box::new(val)
}

/// Table layout for the stores.
pub static SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id SERIAL PRIMARY KEY,
  username TEXT NOT NULL UNIQUE,
  email TEXT NOT NULL UNIQUE,
  bio TEXT,
  image TEXT,
  favorites INTEGER[] NOT NULL DEFAULT '{}',
  following INTEGER[] NOT NULL DEFAULT '{}',
  created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
  updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS articles (
  id SERIAL PRIMARY KEY,
  slug TEXT NOT NULL UNIQUE CHECK (slug = lower(slug)),
  title TEXT NOT NULL DEFAULT '',
  description TEXT NOT NULL DEFAULT '',
  body TEXT NOT NULL DEFAULT '',
  favorites_count BIGINT NOT NULL DEFAULT 0,
  comments INTEGER[] NOT NULL DEFAULT '{}',
  tag_list TEXT[] NOT NULL DEFAULT '{}',
  author_id INTEGER NOT NULL REFERENCES users(id),
  created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
  updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS users_favorites_idx ON users USING GIN (favorites);
"#;

/// Row mapping for a `Document` stored in postgres.
pub trait PgDocument: Document {
  fn columns() -> &'static ColumnMappers;

  fn from_row(row: &Row) -> Result<Self>;

  /// Values for `ColumnMappers::writable()` columns, in the same order.
  fn params(&self) -> Vec<SqlParam>;
}

/// Field named by a unique constraint, e.g. `articles_slug_key` -> `slug`.
/// Unknown constraints map to the id field.
pub fn unique_field_for_constraint<D: Document>(constraint: &str) -> &'static str {
  D::unique_fields().iter()
    .map(|field| field.name())
    .find(|name| constraint.contains(name))
    .unwrap_or_else(|| D::ID_FIELD.name())
}

/// Copy of `doc` with save timestamps applied; `doc` itself is only replaced
/// once the write succeeds.
fn stamped<D: Document>(doc: &D, is_new: bool) -> D {
  let mut saved = doc.clone();
  saved.touch(Utc::now(), is_new);
  saved
}

pub struct PgStore<D> {
  cl: SharedClient,
  select_by: Vec<(&'static str, String)>,
  insert: String,
  update: String,
  delete: String,
  _doc: PhantomData<fn() -> D>,
}

impl<D: PgDocument> PgStore<D> {
  pub fn new(cl: SharedClient) -> Self {
    let columns = D::columns();
    Self {
      cl,
      select_by: Vec::new(),
      insert: columns.build_insert_query(),
      update: columns.build_update_query(),
      delete: columns.build_delete(),
      _doc: PhantomData,
    }.with_select_by(D::unique_fields())
  }

  fn with_select_by(mut self, fields: &[D::Field]) -> Self {
    let columns = D::columns();
    self.select_by.push((D::ID_FIELD.name(), columns.build_select_where(D::ID_FIELD.name())));
    for field in fields {
      let name = field.name();
      self.select_by.push((name, columns.build_select_where(name)));
    }
    self
  }

  fn select_query(&self, field: D::Field) -> String {
    let name = field.name();
    match self.select_by.iter().find(|(col, _)| *col == name) {
      Some((_, query)) => query.clone(),
      None => D::columns().build_select_where(name),
    }
  }

  /// Map unique violations to the field they were raised for.
  fn map_save_error(&self, err: Error) -> Error {
    if let Error::PgError { ref source } = err {
      if source.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let constraint = source.as_db_error()
          .and_then(|db| db.constraint())
          .unwrap_or("");
        let field = unique_field_for_constraint::<D>(constraint);
        debug!("{}: unique constraint '{}' violated", D::COLLECTION, constraint);
        return Error::already_taken(field);
      }
    }
    err
  }

  async fn insert(&self, doc: &mut D) -> Result<()> {
    let mut saved = stamped(doc, true);
    let params = saved.params();
    let refs: Vec<&(dyn ToSql + Sync)> = params.iter()
      .map(|p| p.as_ref() as &(dyn ToSql + Sync))
      .collect();
    let row = self.cl.query_one(&self.insert, &refs).await
      .map_err(|err| self.map_save_error(err))?;
    let id: i32 = row.try_get(0)?;
    saved.set_id(id);
    *doc = saved;
    debug!("{}: inserted id={}", D::COLLECTION, id);
    Ok(())
  }

  async fn update(&self, doc: &mut D, id: i32) -> Result<()> {
    let saved = stamped(doc, false);
    let params = saved.params();
    let mut refs: Vec<&(dyn ToSql + Sync)> = D::columns().writable()
      .zip(params.iter())
      .filter(|(col, _)| col.note != super::util::ColumnNote::CreateOnly)
      .map(|(_, p)| p.as_ref() as &(dyn ToSql + Sync))
      .collect();
    refs.push(&id);
    let updated = self.cl.execute(&self.update, &refs).await
      .map_err(|err| self.map_save_error(err))?;
    if updated == 0 {
      return Err(Error::not_found(D::COLLECTION));
    }
    *doc = saved;
    debug!("{}: updated id={}", D::COLLECTION, id);
    Ok(())
  }
}

#[async_trait]
impl<D: PgDocument> Store<D> for PgStore<D> {
  async fn save(&self, doc: &mut D) -> Result<()> {
    match doc.id() {
      Some(id) => self.update(doc, id).await,
      None => self.insert(doc).await,
    }
  }

  async fn find_by_field(&self, field: D::Field, val: &FieldValue) -> Result<Option<D>> {
    let val = match sql_value(val) {
      Some(val) => val,
      None => return Ok(None),
    };
    let query = self.select_query(field);
    match self.cl.query_opt(&query, &[val]).await? {
      Some(row) => Ok(Some(D::from_row(&row)?)),
      None => Ok(None),
    }
  }

  async fn update_field(&self, id: i32, field: D::Field, val: &FieldValue) -> Result<D> {
    if field == D::ID_FIELD {
      return Err(cannot_set(D::COLLECTION, field, val));
    }
    let val = sql_value(val).ok_or_else(|| cannot_set(D::COLLECTION, field, val))?;
    let query = D::columns().build_update_field(field.name());
    let now = Utc::now();
    let row = self.cl.query_opt(&query, &[val, &now, &id]).await
      .map_err(|err| self.map_save_error(err))?
      .ok_or_else(|| Error::not_found(D::COLLECTION))?;
    debug!("{}: updated id={}, field={}", D::COLLECTION, id, field.name());
    D::from_row(&row)
  }

  async fn count_where(&self, filter: &Filter<D::Field>) -> Result<i64> {
    let columns = D::columns();
    let (query, val) = match filter {
      Filter::Eq(field, val) => (columns.build_count_eq(field.name()), val),
      Filter::Contains(field, val) => (columns.build_count_contains(field.name()), val),
    };
    let val = match sql_value(val) {
      Some(val) => val,
      None => return Ok(0),
    };
    let row = self.cl.query_one(&query, &[val]).await?;
    Ok(row.try_get(0)?)
  }

  async fn delete(&self, id: i32) -> Result<u64> {
    self.cl.execute(&self.delete, &[&id]).await
  }
}
