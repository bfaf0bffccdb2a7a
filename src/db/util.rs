#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnNote {
  /// Store-assigned key, never written.
  Primary,
  /// Written on insert only.
  CreateOnly,
  None,
}

#[derive(Debug, Clone)]
pub struct ColumnMapper {
  pub name: &'static str,
  pub note: ColumnNote,
}

pub fn column(name: &'static str) -> ColumnMapper {
  ColumnMapper {
    name,
    note: ColumnNote::None,
  }
}

pub fn primary(name: &'static str) -> ColumnMapper {
  ColumnMapper {
    name,
    note: ColumnNote::Primary,
  }
}

pub fn create_only(name: &'static str) -> ColumnMapper {
  ColumnMapper {
    name,
    note: ColumnNote::CreateOnly,
  }
}

/// Column bumped by every update.
pub const UPDATED_AT: &str = "updated_at";

#[derive(Debug, Default, Clone)]
pub struct ColumnMappers {
  pub table_name: &'static str,
  pub columns: Vec<ColumnMapper>,
}

impl ColumnMappers {
  pub fn primary_key(&self) -> &'static str {
    self.columns.iter()
      .find(|col| col.note == ColumnNote::Primary)
      .map_or("id", |col| col.name)
  }

  /// Columns written on insert, in the order `PgDocument::params` yields values.
  pub fn writable(&self) -> impl Iterator<Item = &ColumnMapper> {
    self.columns.iter().filter(|col| col.note != ColumnNote::Primary)
  }

  pub fn get_columns(&self) -> String {
    self.columns.iter()
      .map(|col| col.name)
      .collect::<Vec<_>>()
      .join(", ")
  }

  pub fn build_select_query(&self) -> String {
    format!("SELECT {} FROM {}", self.get_columns(), self.table_name)
  }

  pub fn build_select_where(&self, column: &str) -> String {
    format!("{} WHERE {} = $1 LIMIT 1", self.build_select_query(), column)
  }

  pub fn build_insert_query(&self) -> String {
    let mut names = Vec::new();
    let mut values = Vec::new();
    for (idx, col) in self.writable().enumerate() {
      names.push(col.name);
      values.push(format!("${}", idx + 1));
    }
    format!("INSERT INTO {}({}) VALUES({}) RETURNING {}",
      self.table_name, names.join(", "), values.join(", "), self.primary_key())
  }

  /// `UPDATE .. SET` of all non create-only columns; the key is the last parameter.
  pub fn build_update_query(&self) -> String {
    let mut sets = Vec::new();
    for col in self.writable().filter(|col| col.note != ColumnNote::CreateOnly) {
      sets.push(format!("{} = ${}", col.name, sets.len() + 1));
    }
    format!("UPDATE {} SET {} WHERE {} = ${}",
      self.table_name, sets.join(", "), self.primary_key(), sets.len() + 1)
  }

  /// `UPDATE .. SET column = $1, updated_at = $2 WHERE key = $3`, returning the row.
  pub fn build_update_field(&self, column: &str) -> String {
    format!("UPDATE {} SET {} = $1, {} = $2 WHERE {} = $3 RETURNING {}",
      self.table_name, column, UPDATED_AT, self.primary_key(), self.get_columns())
  }

  pub fn build_count_eq(&self, column: &str) -> String {
    format!("SELECT COUNT(*) FROM {} WHERE {} = $1", self.table_name, column)
  }

  pub fn build_count_contains(&self, column: &str) -> String {
    format!("SELECT COUNT(*) FROM {} WHERE $1 = ANY({})", self.table_name, column)
  }

  pub fn build_delete(&self) -> String {
    format!("DELETE FROM {} WHERE {} = $1", self.table_name, self.primary_key())
  }
}
