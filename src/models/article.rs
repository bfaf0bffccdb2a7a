use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

use crate::models::*;
use crate::util::random_slug_suffix;

/// Stored article document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<i32>,
  pub slug: String,
  pub title: String,
  pub description: String,
  pub body: String,
  #[serde(default)]
  pub favorites_count: i64,
  #[serde(default)]
  pub comments: Vec<i32>,
  #[serde(default)]
  pub tag_list: Vec<String>,
  /// Id of the authoring `User`.
  pub author: i32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Article as presented to a particular viewer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetails {
  pub slug: String,
  pub title: String,
  pub description: String,
  pub body: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub tag_list: Vec<String>,
  pub favorited: bool,
  pub favorites_count: i64,
  pub author: user::Profile,
}

/// `slug::slugify(title)` followed by '-' and a random base-36 token.
pub fn slug_for_title(title: &str) -> String {
  format!("{}-{}", slug::slugify(title), random_slug_suffix())
}

impl Article {
  /// New unsaved article with a freshly generated slug.
  pub fn new(author: i32, title: &str, description: &str, body: &str, tag_list: Vec<String>) -> Self {
    let now = Utc::now();
    let mut article = Self {
      id: None,
      slug: String::new(),
      title: title.to_string(),
      description: description.to_string(),
      body: body.to_string(),
      favorites_count: 0,
      comments: Vec::new(),
      tag_list,
      author,
      created_at: now,
      updated_at: now,
    };
    article.slugify();
    article
  }

  /// Replace the slug with one derived from the current title.
  pub fn slugify(&mut self) {
    self.slug = slug_for_title(&self.title);
  }

  /// Slugify only if no slug has been set. Returns true if a slug was generated.
  pub fn ensure_slug(&mut self) -> bool {
    if self.slug.is_empty() {
      self.slugify();
      true
    } else {
      false
    }
  }

  /// Explicit slug; stored slugs are always lowercase.
  pub fn set_slug(&mut self, slug: &str) {
    self.slug = slug.to_lowercase();
  }

  pub fn add_comment(&mut self, comment_id: i32) {
    if !self.comments.contains(&comment_id) {
      self.comments.push(comment_id);
    }
  }

  pub fn remove_comment(&mut self, comment_id: i32) -> bool {
    let len = self.comments.len();
    self.comments.retain(|id| *id != comment_id);
    self.comments.len() != len
  }

  /// Project this article for `viewer`. `author` must be the user referenced by `self.author`.
  pub fn to_json_for(&self, author: &User, viewer: Option<&User>) -> ArticleDetails {
    let favorited = match (viewer, self.id) {
      (Some(viewer), Some(id)) => viewer.is_favorite(id),
      _ => false,
    };
    ArticleDetails {
      slug: self.slug.clone(),
      title: self.title.clone(),
      description: self.description.clone(),
      body: self.body.clone(),
      created_at: self.created_at,
      updated_at: self.updated_at,
      tag_list: self.tag_list.clone(),
      favorited,
      favorites_count: self.favorites_count,
      author: author.to_profile_json_for(viewer),
    }
  }
}
