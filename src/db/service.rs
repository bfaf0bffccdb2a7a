use log::*;

use std::sync::Arc;

use crate::error::*;
use crate::app::AppConfig;
use crate::models::*;

use super::{
  client::SharedClient,
  pg::{PgStore, SCHEMA},
  store::*,
  ArticleRepository,
  MemoryStore,
  UserField,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
  Memory,
  Postgres,
}

impl DbBackend {
  pub fn from_config(config: &AppConfig) -> Result<Self> {
    match config.get_str("db.backend")?.as_deref() {
      None | Some("memory") => Ok(DbBackend::Memory),
      Some("postgres") => Ok(DbBackend::Postgres),
      Some(other) => Err(Error::BadRequest(format!("unknown db.backend: {}", other))),
    }
  }
}

/// Stores and repositories, wired for one backend.
#[derive(Clone)]
pub struct DbService {
  pub backend: DbBackend,
  pub users: Arc<dyn Store<User>>,
  pub article: ArticleRepository,
  shared_cl: Option<SharedClient>,
  migrate: bool,
}

impl DbService {
  /// Build the stores selected by `db.backend`. The postgres backend needs a tokio runtime.
  pub fn new(config: &AppConfig) -> Result<DbService> {
    let backend = DbBackend::from_config(config)?;
    let migrate = config.get_bool("db.migrate")?.unwrap_or(false);
    let mut db = match backend {
      DbBackend::Memory => Self::memory(),
      DbBackend::Postgres => {
        let url = config.get_str("db.url")?
          .ok_or_else(|| Error::BadRequest("db.url must be set".to_string()))?;
        Self::postgres(&url)
      },
    };
    db.migrate = migrate;
    Ok(db)
  }

  pub fn memory() -> DbService {
    let users: Arc<dyn Store<User>> = Arc::new(MemoryStore::<User>::new());
    let articles: Arc<dyn Store<Article>> = Arc::new(MemoryStore::<Article>::new());
    DbService {
      backend: DbBackend::Memory,
      article: ArticleRepository::new(articles, users.clone()),
      users,
      shared_cl: None,
      migrate: false,
    }
  }

  pub fn postgres(url: &str) -> DbService {
    let shared_cl = SharedClient::connect(url);
    let users: Arc<dyn Store<User>> = Arc::new(PgStore::<User>::new(shared_cl.clone()));
    let articles: Arc<dyn Store<Article>> = Arc::new(PgStore::<Article>::new(shared_cl.clone()));
    DbService {
      backend: DbBackend::Postgres,
      article: ArticleRepository::new(articles, users.clone()),
      users,
      shared_cl: Some(shared_cl),
      migrate: false,
    }
  }

  /// Create the postgres tables. No-op for the memory backend.
  pub async fn migrate(&self) -> Result<()> {
    match self.shared_cl {
      Some(ref cl) => {
        info!("DBService: apply schema.");
        cl.batch_execute(SCHEMA).await
      },
      None => {
        debug!("DBService: memory backend, no schema to apply.");
        Ok(())
      },
    }
  }

  /// Wait for the backend, applying the schema when `db.migrate` is set.
  pub async fn prepare(&self) -> Result<()> {
    if let Some(ref cl) = self.shared_cl {
      info!("DBService: waiting for postgres.");
      cl.get_client().await?;
    }
    if self.migrate {
      self.migrate().await?;
    }
    info!("DBService: finished.");
    Ok(())
  }

  /// Commands that read existing articles need a backend that outlives the
  /// process; the memory backend starts empty every time.
  pub fn require_persistent(&self, command: &str) -> Result<()> {
    match self.backend {
      DbBackend::Postgres => Ok(()),
      DbBackend::Memory => Err(Error::BadRequest(format!(
        "'{}' needs db.backend = \"postgres\"; the memory backend holds no articles", command))),
    }
  }

  pub async fn find_user(&self, username: &str) -> Result<Option<User>> {
    self.users.find_by_field(UserField::Username, &username.into()).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use futures::executor::block_on;

  #[test]
  fn backend_from_config() {
    let config = AppConfig::from_pairs(&[]).unwrap();
    assert_eq!(DbBackend::from_config(&config).unwrap(), DbBackend::Memory);

    let config = AppConfig::from_pairs(&[("db.backend", "postgres")]).unwrap();
    assert_eq!(DbBackend::from_config(&config).unwrap(), DbBackend::Postgres);

    let config = AppConfig::from_pairs(&[("db.backend", "mongo")]).unwrap();
    assert!(DbBackend::from_config(&config).is_err());
  }

  #[test]
  fn postgres_backend_requires_url() {
    let config = AppConfig::from_pairs(&[("db.backend", "postgres")]).unwrap();
    match DbService::new(&config) {
      Err(Error::BadRequest(msg)) => assert!(msg.contains("db.url")),
      Err(err) => panic!("unexpected error: {:?}", err),
      Ok(_) => panic!("expected an error"),
    }
  }

  #[test]
  fn memory_backend_is_not_persistent() {
    let config = AppConfig::from_pairs(&[("db.backend", "memory")]).unwrap();
    let db = DbService::new(&config).unwrap();
    match db.require_persistent("show") {
      Err(Error::BadRequest(msg)) => {
        assert!(msg.contains("'show'"));
        assert!(msg.contains("postgres"));
      },
      res => panic!("unexpected result: {:?}", res),
    }
  }

  #[test]
  fn shipped_config_uses_postgres() {
    let mut conf = config::Config::default();
    conf.merge(config::File::with_name("conf/default")).unwrap();
    let config = AppConfig { conf };
    assert_eq!(DbBackend::from_config(&config).unwrap(), DbBackend::Postgres);
    assert!(config.get_str("db.url").unwrap().is_some());
  }

  #[test]
  fn memory_service_shares_user_store() {
    let config = AppConfig::from_pairs(&[("db.backend", "memory"), ("db.migrate", "true")]).unwrap();
    let db = DbService::new(&config).unwrap();
    assert_eq!(db.backend, DbBackend::Memory);
    block_on(db.prepare()).unwrap();

    let mut jake = User::new("jake", "jake@example.com");
    block_on(db.users.save(&mut jake)).unwrap();
    let req = crate::forms::CreateArticle {
      title: "Dragons".into(),
      ..Default::default()
    };
    let article = block_on(db.article.create(&jake, &req)).unwrap();
    let details = block_on(db.article.to_json_for(&article, None)).unwrap();
    assert_eq!(details.author.username, "jake");

    let found = block_on(db.find_user("jake")).unwrap();
    assert_eq!(found.and_then(|u| u.id), jake.id);
  }
}
