use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleOut<T> {
  pub article: T,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticle {
  pub title: String,
  pub description: String,
  pub body: String,
  #[serde(default)]
  pub tag_list: Vec<String>,
}

/// Partial edit. `None` leaves a field unchanged.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticle {
  pub title: Option<String>,
  pub description: Option<String>,
  pub body: Option<String>,
  pub tag_list: Option<Vec<String>>,
}
