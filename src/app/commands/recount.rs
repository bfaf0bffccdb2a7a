use log::*;

use crate::{
  error::*,
  db::DbService,
};

/// Recompute the favorites count of the article at `slug`. Returns the new count.
pub async fn execute(db: &DbService, slug: &str) -> Result<i64> {
  let mut article = db.article.find_by_slug(slug).await?
    .ok_or_else(|| Error::not_found("article"))?;
  let old = article.favorites_count;
  db.article.update_favorite_count(&mut article).await?;
  info!("Recount: slug={}, favorites {} -> {}", article.slug, old, article.favorites_count);
  Ok(article.favorites_count)
}
