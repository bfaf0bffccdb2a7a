use chrono::{DateTime, Utc};

use tokio_postgres::Row;

use crate::error::*;
use crate::models::*;

use crate::db::store::*;
use crate::db::pg::*;
use crate::db::util::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
  Id,
  Username,
  Email,
  Favorites,
  Following,
}

impl DocumentField for UserField {
  fn name(self) -> &'static str {
    match self {
      UserField::Id => "id",
      UserField::Username => "username",
      UserField::Email => "email",
      UserField::Favorites => "favorites",
      UserField::Following => "following",
    }
  }
}

lazy_static! {
  static ref USER_COLUMNS: ColumnMappers = {
    ColumnMappers {
      table_name: "users",
      columns: vec![
        primary("id"),
        column("username"),
        column("email"),
        column("bio"),
        column("image"),
        column("favorites"),
        column("following"),
        create_only("created_at"),
        column("updated_at"),
      ],
    }
  };
}

impl Document for User {
  type Field = UserField;

  const COLLECTION: &'static str = "users";

  const ID_FIELD: UserField = UserField::Id;

  fn unique_fields() -> &'static [UserField] {
    &[UserField::Username, UserField::Email]
  }

  fn id(&self) -> Option<i32> {
    self.id
  }

  fn set_id(&mut self, id: i32) {
    self.id = Some(id);
  }

  fn field(&self, field: UserField) -> FieldValue {
    match field {
      UserField::Id => self.id.map_or(FieldValue::Null, FieldValue::Int),
      UserField::Username => FieldValue::Text(self.username.clone()),
      UserField::Email => FieldValue::Text(self.email.clone()),
      UserField::Favorites => FieldValue::IntList(self.favorites.clone()),
      UserField::Following => FieldValue::IntList(self.following.clone()),
    }
  }

  fn set_field(&mut self, field: UserField, val: FieldValue) -> Result<()> {
    match (field, val) {
      (UserField::Username, FieldValue::Text(v)) => self.username = v,
      (UserField::Email, FieldValue::Text(v)) => self.email = v,
      (UserField::Favorites, FieldValue::IntList(v)) => self.favorites = v,
      (UserField::Following, FieldValue::IntList(v)) => self.following = v,
      (field, val) => return Err(cannot_set(Self::COLLECTION, field, &val)),
    }
    Ok(())
  }

  fn touch(&mut self, now: DateTime<Utc>, is_new: bool) {
    if is_new {
      self.created_at = now;
    }
    self.updated_at = now;
  }
}

impl PgDocument for User {
  fn columns() -> &'static ColumnMappers {
    &USER_COLUMNS
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(User {
      id: Some(row.try_get(0)?),
      username: row.try_get(1)?,
      email: row.try_get(2)?,
      bio: row.try_get(3)?,
      image: row.try_get(4)?,
      favorites: row.try_get(5)?,
      following: row.try_get(6)?,
      created_at: row.try_get(7)?,
      updated_at: row.try_get(8)?,
    })
  }

  fn params(&self) -> Vec<SqlParam> {
    vec![
      param(self.username.clone()),
      param(self.email.clone()),
      param(self.bio.clone()),
      param(self.image.clone()),
      param(self.favorites.clone()),
      param(self.following.clone()),
      param(self.created_at),
      param(self.updated_at),
    ]
  }
}
