use log::*;

use crate::{
  error::*,
  db::DbService,
};

pub async fn execute(db: &DbService) -> Result<()> {
  info!("Migrate: backend={:?}", db.backend);
  db.migrate().await?;
  info!("Migrate: done.");
  Ok(())
}
