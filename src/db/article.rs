use log::*;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tokio_postgres::Row;

use crate::error::*;

use crate::models::*;
use crate::forms::article::*;

use crate::db::store::*;
use crate::db::pg::*;
use crate::db::user::UserField;
use crate::db::util::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleField {
  Id,
  Slug,
  Title,
  Author,
  TagList,
  FavoritesCount,
}

impl DocumentField for ArticleField {
  fn name(self) -> &'static str {
    match self {
      ArticleField::Id => "id",
      ArticleField::Slug => "slug",
      ArticleField::Title => "title",
      ArticleField::Author => "author_id",
      ArticleField::TagList => "tag_list",
      ArticleField::FavoritesCount => "favorites_count",
    }
  }
}

lazy_static! {
  static ref ARTICLE_COLUMNS: ColumnMappers = {
    ColumnMappers {
      table_name: "articles",
      columns: vec![
        primary("id"),
        column("slug"),
        column("title"),
        column("description"),
        column("body"),
        column("favorites_count"),
        column("comments"),
        column("tag_list"),
        column("author_id"),
        create_only("created_at"),
        column("updated_at"),
      ],
    }
  };
}

impl Document for Article {
  type Field = ArticleField;

  const COLLECTION: &'static str = "articles";

  const ID_FIELD: ArticleField = ArticleField::Id;

  fn unique_fields() -> &'static [ArticleField] {
    &[ArticleField::Slug]
  }

  fn id(&self) -> Option<i32> {
    self.id
  }

  fn set_id(&mut self, id: i32) {
    self.id = Some(id);
  }

  fn field(&self, field: ArticleField) -> FieldValue {
    match field {
      ArticleField::Id => self.id.map_or(FieldValue::Null, FieldValue::Int),
      ArticleField::Slug => FieldValue::Text(self.slug.clone()),
      ArticleField::Title => FieldValue::Text(self.title.clone()),
      ArticleField::Author => FieldValue::Int(self.author),
      ArticleField::TagList => FieldValue::TextList(self.tag_list.clone()),
      ArticleField::FavoritesCount => FieldValue::BigInt(self.favorites_count),
    }
  }

  fn set_field(&mut self, field: ArticleField, val: FieldValue) -> Result<()> {
    match (field, val) {
      (ArticleField::Slug, FieldValue::Text(v)) => self.slug = v,
      (ArticleField::Title, FieldValue::Text(v)) => self.title = v,
      (ArticleField::Author, FieldValue::Int(v)) => self.author = v,
      (ArticleField::TagList, FieldValue::TextList(v)) => self.tag_list = v,
      (ArticleField::FavoritesCount, FieldValue::BigInt(v)) => self.favorites_count = v,
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

impl PgDocument for Article {
  fn columns() -> &'static ColumnMappers {
    &ARTICLE_COLUMNS
  }

  fn from_row(row: &Row) -> Result<Self> {
    Ok(Article {
      id: Some(row.try_get(0)?),
      slug: row.try_get(1)?,
      title: row.try_get(2)?,
      description: row.try_get(3)?,
      body: row.try_get(4)?,
      favorites_count: row.try_get(5)?,
      comments: row.try_get(6)?,
      tag_list: row.try_get(7)?,
      author: row.try_get(8)?,
      created_at: row.try_get(9)?,
      updated_at: row.try_get(10)?,
    })
  }

  fn params(&self) -> Vec<SqlParam> {
    vec![
      param(self.slug.clone()),
      param(self.title.clone()),
      param(self.description.clone()),
      param(self.body.clone()),
      param(self.favorites_count),
      param(self.comments.clone()),
      param(self.tag_list.clone()),
      param(self.author),
      param(self.created_at),
      param(self.updated_at),
    ]
  }
}

fn saved_id(id: Option<i32>, what: &str) -> Result<i32> {
  id.ok_or_else(|| Error::BadRequest(format!("{} has not been saved", what)))
}

/// Article operations over injected article and user stores.
#[derive(Clone)]
pub struct ArticleRepository {
  articles: Arc<dyn Store<Article>>,
  users: Arc<dyn Store<User>>,
}

impl ArticleRepository {
  pub fn new(articles: Arc<dyn Store<Article>>, users: Arc<dyn Store<User>>) -> Self {
    Self {
      articles,
      users,
    }
  }

  /// Build and store a new article written by `author`.
  pub async fn create(&self, author: &User, req: &CreateArticle) -> Result<Article> {
    let author_id = saved_id(author.id, "author")?;
    let mut article = Article::new(author_id, &req.title, &req.description, &req.body,
      req.tag_list.clone());
    self.save(&mut article).await?;
    info!("Article - created: slug={}", article.slug);
    Ok(article)
  }

  /// Store `article`, generating its slug first if it has none.
  pub async fn save(&self, article: &mut Article) -> Result<()> {
    if article.ensure_slug() {
      debug!("Article - generated slug: {}", article.slug);
    } else {
      let slug = article.slug.clone();
      article.set_slug(&slug);
    }
    self.articles.save(article).await
  }

  pub async fn find_by_id(&self, id: i32) -> Result<Option<Article>> {
    self.articles.find_by_field(ArticleField::Id, &id.into()).await
  }

  pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>> {
    self.articles.find_by_field(ArticleField::Slug, &slug.to_lowercase().into()).await
  }

  /// Apply an edit. The slug is kept even when the title changes.
  pub async fn update(&self, article: &mut Article, req: &UpdateArticle) -> Result<()> {
    if let Some(title) = &req.title {
      article.title = title.clone();
    }
    if let Some(desc) = &req.description {
      article.description = desc.clone();
    }
    if let Some(body) = &req.body {
      article.body = body.clone();
    }
    if let Some(tag_list) = &req.tag_list {
      article.tag_list = tag_list.clone();
    }
    self.save(article).await
  }

  /// Derive a new slug from the current title and store it.
  pub async fn regenerate_slug(&self, article: &mut Article) -> Result<()> {
    article.slugify();
    debug!("Article - regenerated slug: {}", article.slug);
    self.articles.save(article).await
  }

  pub async fn delete(&self, article: &Article) -> Result<u64> {
    let id = saved_id(article.id, "article")?;
    let deleted = self.articles.delete(id).await?;
    info!("Article - deleted: slug={}, count={}", article.slug, deleted);
    Ok(deleted)
  }

  /// Recount the users favoriting `article` and store the count.
  /// Only the count is written; other stored fields are left as they are.
  pub async fn update_favorite_count(&self, article: &mut Article) -> Result<()> {
    let id = saved_id(article.id, "article")?;
    let count = self.users
      .count_where(&Filter::Contains(UserField::Favorites, id.into()))
      .await?;
    debug!("Article - favorites count: slug={}, {} -> {}", article.slug, article.favorites_count, count);
    let stored = self.articles
      .update_field(id, ArticleField::FavoritesCount, &FieldValue::BigInt(count))
      .await?;
    article.favorites_count = stored.favorites_count;
    article.updated_at = stored.updated_at;
    Ok(())
  }

  pub async fn favorite(&self, user: &mut User, article: &mut Article) -> Result<()> {
    let id = saved_id(article.id, "article")?;
    if user.favorite(id) {
      self.save_favorites(user).await?;
    }
    self.update_favorite_count(article).await
  }

  pub async fn unfavorite(&self, user: &mut User, article: &mut Article) -> Result<()> {
    let id = saved_id(article.id, "article")?;
    if user.unfavorite(id) {
      self.save_favorites(user).await?;
    }
    self.update_favorite_count(article).await
  }

  async fn save_favorites(&self, user: &mut User) -> Result<()> {
    let user_id = saved_id(user.id, "user")?;
    let stored = self.users
      .update_field(user_id, UserField::Favorites, &FieldValue::IntList(user.favorites.clone()))
      .await?;
    user.updated_at = stored.updated_at;
    Ok(())
  }

  /// Load the author of `article` and project it for `viewer`.
  pub async fn to_json_for(&self, article: &Article, viewer: Option<&User>) -> Result<ArticleDetails> {
    let author = self.users
      .find_by_field(UserField::Id, &article.author.into())
      .await?
      .ok_or_else(|| Error::not_found("author"))?;
    Ok(article.to_json_for(&author, viewer))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use futures::executor::block_on;

  use crate::db::MemoryStore;
  use crate::util::{is_base36_token, SLUG_SUFFIX_LEN};

  struct Fixture {
    repo: ArticleRepository,
    articles: Arc<MemoryStore<Article>>,
    users: Arc<MemoryStore<User>>,
  }

  fn fixture() -> Fixture {
    let articles = Arc::new(MemoryStore::<Article>::new());
    let users = Arc::new(MemoryStore::<User>::new());
    let repo = ArticleRepository::new(articles.clone(), users.clone());
    Fixture { repo, articles, users }
  }

  impl Fixture {
    fn user(&self, name: &str) -> User {
      let mut user = User::new(name, &format!("{}@example.com", name));
      block_on(self.users.save(&mut user)).unwrap();
      user
    }

    fn article(&self, author: &User, title: &str) -> Article {
      let req = CreateArticle {
        title: title.to_string(),
        description: "Ever wonder how?".to_string(),
        body: "You have to believe".to_string(),
        tag_list: vec!["dragons".to_string(), "training".to_string()],
      };
      block_on(self.repo.create(author, &req)).unwrap()
    }
  }

  fn has_slug_for(slug: &str, title: &str) -> bool {
    let prefix = format!("{}-", slug::slugify(title));
    slug.starts_with(&prefix) && is_base36_token(&slug[prefix.len()..], SLUG_SUFFIX_LEN)
  }

  #[test]
  fn create_stores_article_with_slug() {
    let f = fixture();
    let jake = f.user("jake");
    let article = f.article(&jake, "How to train your dragon");

    assert!(article.id.is_some());
    assert_eq!(article.author, jake.id.unwrap());
    assert_eq!(article.favorites_count, 0);
    assert!(has_slug_for(&article.slug, "How to train your dragon"));

    let found = block_on(f.repo.find_by_slug(&article.slug)).unwrap();
    assert_eq!(found.as_ref(), Some(&article));
  }

  #[test]
  fn create_requires_saved_author() {
    let f = fixture();
    let ghost = User::new("ghost", "ghost@example.com");
    let req = CreateArticle { title: "Boo".into(), ..Default::default() };
    match block_on(f.repo.create(&ghost, &req)) {
      Err(Error::BadRequest(_)) => (),
      res => panic!("unexpected result: {:?}", res),
    }
    assert!(f.articles.is_empty());
  }

  #[test]
  fn save_without_slug_slugifies_once() {
    let f = fixture();
    let jake = f.user("jake");
    let mut article = Article::new(jake.id.unwrap(), "Dragons", "", "", vec![]);
    article.slug.clear();

    block_on(f.repo.save(&mut article)).unwrap();
    assert!(has_slug_for(&article.slug, "Dragons"));
    let slug = article.slug.clone();

    article.title = "Something else".to_string();
    block_on(f.repo.save(&mut article)).unwrap();
    assert_eq!(article.slug, slug);
  }

  #[test]
  fn explicit_slugs_are_lowercased() {
    let f = fixture();
    let jake = f.user("jake");
    let mut article = Article::new(jake.id.unwrap(), "Dragons", "", "", vec![]);
    article.slug = "Dragons-ABC123".to_string();
    block_on(f.repo.save(&mut article)).unwrap();
    assert_eq!(article.slug, "dragons-abc123");

    let found = block_on(f.repo.find_by_slug("DRAGONS-abc123")).unwrap();
    assert_eq!(found.and_then(|a| a.id), article.id);
  }

  #[test]
  fn same_title_gets_distinct_slugs() {
    let f = fixture();
    let jake = f.user("jake");
    let first = f.article(&jake, "Dragons");
    let second = f.article(&jake, "Dragons");

    assert_ne!(first.slug, second.slug);
    assert_ne!(first.id, second.id);
    assert_eq!(f.articles.len(), 2);
  }

  #[test]
  fn duplicate_slug_is_already_taken() {
    let f = fixture();
    let jake = f.user("jake");
    let first = f.article(&jake, "Dragons");

    let mut copy = Article::new(jake.id.unwrap(), "Dragons", "", "", vec![]);
    copy.slug = first.slug.clone();
    let err = block_on(f.repo.save(&mut copy)).unwrap_err();
    assert!(err.is_already_taken("slug"), "unexpected error: {:?}", err);
    assert_eq!(f.articles.len(), 1);
  }

  #[test]
  fn update_keeps_slug() {
    let f = fixture();
    let jake = f.user("jake");
    let mut article = f.article(&jake, "Dragons");
    let slug = article.slug.clone();

    let req = UpdateArticle {
      title: Some("Did you train your dragon?".into()),
      tag_list: Some(vec!["dragons".into()]),
      ..Default::default()
    };
    block_on(f.repo.update(&mut article, &req)).unwrap();
    assert_eq!(article.slug, slug);

    let found = block_on(f.repo.find_by_slug(&slug)).unwrap().unwrap();
    assert_eq!(found.title, "Did you train your dragon?");
    assert_eq!(found.description, "Ever wonder how?");
    assert_eq!(found.tag_list, vec!["dragons".to_string()]);
  }

  #[test]
  fn regenerate_slug_follows_new_title() {
    let f = fixture();
    let jake = f.user("jake");
    let mut article = f.article(&jake, "Dragons");
    let old = article.slug.clone();

    article.title = "Wyverns".into();
    block_on(f.repo.regenerate_slug(&mut article)).unwrap();
    assert!(has_slug_for(&article.slug, "Wyverns"));
    assert!(block_on(f.repo.find_by_slug(&old)).unwrap().is_none());
    assert!(block_on(f.repo.find_by_slug(&article.slug)).unwrap().is_some());
  }

  #[test]
  fn favorite_count_matches_favoriting_users() {
    for n in 0..5 {
      let f = fixture();
      let jake = f.user("jake");
      let mut article = f.article(&jake, "Dragons");
      let other = f.article(&jake, "Wyverns");

      for idx in 0..n {
        let mut fan = f.user(&format!("fan{}", idx));
        fan.favorite(article.id.unwrap());
        fan.favorite(other.id.unwrap());
        block_on(f.users.save(&mut fan)).unwrap();
      }
      // a user favoriting only the other article.
      let mut bystander = f.user("bystander");
      bystander.favorite(other.id.unwrap());
      block_on(f.users.save(&mut bystander)).unwrap();

      block_on(f.repo.update_favorite_count(&mut article)).unwrap();
      assert_eq!(article.favorites_count, n);

      let stored = block_on(f.repo.find_by_id(article.id.unwrap())).unwrap().unwrap();
      assert_eq!(stored.favorites_count, n);
    }
  }

  #[test]
  fn recount_keeps_concurrent_edits() {
    let f = fixture();
    let jake = f.user("jake");
    let mut jane = f.user("jane");
    let article = f.article(&jake, "Dragons");
    let id = article.id.unwrap();

    let mut reader = block_on(f.repo.find_by_id(id)).unwrap().unwrap();
    let mut editor = block_on(f.repo.find_by_id(id)).unwrap().unwrap();
    let req = UpdateArticle {
      body: Some("new body".into()),
      tag_list: Some(vec!["wyverns".into()]),
      ..Default::default()
    };
    block_on(f.repo.update(&mut editor, &req)).unwrap();

    block_on(f.repo.favorite(&mut jane, &mut reader)).unwrap();
    assert_eq!(reader.favorites_count, 1);

    let stored = block_on(f.repo.find_by_id(id)).unwrap().unwrap();
    assert_eq!(stored.favorites_count, 1);
    assert_eq!(stored.body, "new body");
    assert_eq!(stored.tag_list, vec!["wyverns".to_string()]);
  }

  #[test]
  fn favorite_keeps_other_user_fields() {
    let f = fixture();
    let jake = f.user("jake");
    let mut jane = f.user("jane");
    let mut article = f.article(&jake, "Dragons");

    let mut profile = jane.clone();
    profile.bio = Some("I like dragons".into());
    block_on(f.users.save(&mut profile)).unwrap();

    block_on(f.repo.favorite(&mut jane, &mut article)).unwrap();
    let stored = block_on(f.users.find_by_field(UserField::Id, &jane.id.unwrap().into()))
      .unwrap().unwrap();
    assert_eq!(stored.bio, Some("I like dragons".to_string()));
    assert!(stored.is_favorite(article.id.unwrap()));
  }

  #[test]
  fn favorite_and_unfavorite_recount() {
    let f = fixture();
    let jake = f.user("jake");
    let mut jane = f.user("jane");
    let mut article = f.article(&jake, "Dragons");

    block_on(f.repo.favorite(&mut jane, &mut article)).unwrap();
    block_on(f.repo.favorite(&mut jane, &mut article)).unwrap();
    assert_eq!(article.favorites_count, 1);
    assert!(jane.is_favorite(article.id.unwrap()));

    block_on(f.repo.unfavorite(&mut jane, &mut article)).unwrap();
    assert_eq!(article.favorites_count, 0);
    assert!(!jane.is_favorite(article.id.unwrap()));
  }

  #[test]
  fn update_favorite_count_needs_saved_article() {
    let f = fixture();
    let mut article = Article::new(1, "Dragons", "", "", vec![]);
    match block_on(f.repo.update_favorite_count(&mut article)) {
      Err(Error::BadRequest(_)) => (),
      res => panic!("unexpected result: {:?}", res),
    }
  }

  #[test]
  fn projection_for_viewers() {
    let f = fixture();
    let jake = f.user("jake");
    let mut jane = f.user("jane");
    let mut article = f.article(&jake, "Dragons");

    let anonymous = block_on(f.repo.to_json_for(&article, None)).unwrap();
    assert!(!anonymous.favorited);
    assert_eq!(anonymous.author.username, "jake");

    block_on(f.repo.favorite(&mut jane, &mut article)).unwrap();
    let details = block_on(f.repo.to_json_for(&article, Some(&jane))).unwrap();
    assert!(details.favorited);
    assert_eq!(details.favorites_count, 1);
    assert_eq!(details.slug, article.slug);
    assert_eq!(details.tag_list, article.tag_list);

    // anonymous viewers never see favorited, whatever the favorites state.
    let anonymous = block_on(f.repo.to_json_for(&article, None)).unwrap();
    assert!(!anonymous.favorited);
    assert_eq!(anonymous.favorites_count, 1);
  }

  #[test]
  fn projection_without_author_is_not_found() {
    let f = fixture();
    let mut article = Article::new(99, "Orphan", "", "", vec![]);
    block_on(f.repo.save(&mut article)).unwrap();
    match block_on(f.repo.to_json_for(&article, None)) {
      Err(Error::NotFound(_)) => (),
      res => panic!("unexpected result: {:?}", res),
    }
  }

  #[test]
  fn delete_removes_article() {
    let f = fixture();
    let jake = f.user("jake");
    let article = f.article(&jake, "Dragons");
    assert_eq!(block_on(f.repo.delete(&article)).unwrap(), 1);
    assert!(block_on(f.repo.find_by_slug(&article.slug)).unwrap().is_none());
  }

  #[test]
  fn params_match_writable_columns() {
    let article = Article::new(1, "Dragons", "", "", vec![]);
    assert_eq!(article.params().len(), ARTICLE_COLUMNS.writable().count());
  }
}
