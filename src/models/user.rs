use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<i32>,
  pub username: String,
  pub email: String,
  pub bio: Option<String>,
  pub image: Option<String>,
  /// Ids of favorited articles.
  pub favorites: Vec<i32>,
  /// Ids of followed users.
  pub following: Vec<i32>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
  #[serde(skip)]
  pub user_id: i32,
  pub username: String,
  pub bio: Option<String>,
  pub image: Option<String>,
  pub following: bool,
}

impl User {
  pub fn new(username: &str, email: &str) -> Self {
    let now = Utc::now();
    Self {
      id: None,
      username: username.to_string(),
      email: email.to_lowercase(),
      bio: None,
      image: None,
      favorites: Vec::new(),
      following: Vec::new(),
      created_at: now,
      updated_at: now,
    }
  }

  pub fn is_favorite(&self, article_id: i32) -> bool {
    self.favorites.contains(&article_id)
  }

  /// Returns false if the article was already a favorite.
  pub fn favorite(&mut self, article_id: i32) -> bool {
    if self.is_favorite(article_id) {
      return false;
    }
    self.favorites.push(article_id);
    true
  }

  /// Returns false if the article was not a favorite.
  pub fn unfavorite(&mut self, article_id: i32) -> bool {
    let len = self.favorites.len();
    self.favorites.retain(|id| *id != article_id);
    self.favorites.len() != len
  }

  pub fn is_following(&self, user_id: i32) -> bool {
    self.following.contains(&user_id)
  }

  pub fn follow(&mut self, user_id: i32) -> bool {
    if self.is_following(user_id) {
      return false;
    }
    self.following.push(user_id);
    true
  }

  pub fn unfollow(&mut self, user_id: i32) -> bool {
    let len = self.following.len();
    self.following.retain(|id| *id != user_id);
    self.following.len() != len
  }

  /// Public profile of this user as seen by `viewer`.
  pub fn to_profile_json_for(&self, viewer: Option<&User>) -> Profile {
    let following = match (viewer, self.id) {
      (Some(viewer), Some(id)) => viewer.is_following(id),
      _ => false,
    };
    Profile {
      user_id: self.id.unwrap_or_default(),
      username: self.username.clone(),
      bio: self.bio.clone(),
      image: self.image.clone(),
      following,
    }
  }
}
