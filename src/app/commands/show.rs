use crate::{
  error::*,
  db::DbService,
  forms::ArticleOut,
};

/// JSON projection of the article at `slug`, as seen by the user named `viewer`.
pub async fn execute(db: &DbService, slug: &str, viewer: Option<&str>) -> Result<String> {
  let article = db.article.find_by_slug(slug).await?
    .ok_or_else(|| Error::not_found("article"))?;
  let viewer = match viewer {
    Some(username) => Some(db.find_user(username).await?
      .ok_or_else(|| Error::not_found("viewer"))?),
    None => None,
  };
  let details = db.article.to_json_for(&article, viewer.as_ref()).await?;
  Ok(serde_json::to_string_pretty(&ArticleOut { article: details })?)
}
