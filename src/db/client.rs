use log::*;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::sleep;

use tokio_postgres::{
  connect, Client, Statement, Row, NoTls,
  types::ToSql,
};

use crate::error::*;

const MAX_RETRIES: u32 = 10;

pub type RefClient = Arc<(u64, Client)>;

/// Client connected state
#[derive(Clone)]
pub enum ClientState {
  Disconnected(u64),
  Connecting(u64),
  Connected(RefClient),
}

/// Statements prepared on one client version.
#[derive(Default)]
struct StatementCache {
  version: u64,
  prepared: HashMap<String, Statement>,
}

/// A postgres client shared by every `PgStore`.
///
/// A background task owns the connection and reconnects when it drops; each
/// reconnect bumps the client version, which invalidates prepared statements.
#[derive(Clone)]
pub struct SharedClient {
  state: Arc<Mutex<ClientState>>,
  statements: Arc<Mutex<StatementCache>>,
}

macro_rules! impl_client_method {
  ($method:ident, $res_ty:ty) => {
    pub async fn $method(&self, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<$res_ty> {
      let mut retries = 0;
      loop {
        let cl = self.get_client().await?;
        let statement = self.prepare(&cl, query).await?;

        match cl.1.$method(&statement, params).await {
          Ok(res) => return Ok(res),
          Err(err) if err.is_closed() => {
            retries += 1;
            if retries >= MAX_RETRIES {
              return Err(Error::DisconnectedError(
                "Failed to connect to database".to_string()));
            }
            // connection to the DB was closed, try again.
            info!("DB connection closed, retry query.");
            sleep(Duration::from_millis(100)).await;
          },
          Err(err) => {
            match err.code() {
              Some(code) => debug!("Postgres DB error: {:?}: {}, query=[[{}]]", code, err, query),
              None => error!("Postgres error: {}, query=[[{}]]", err, query),
            }
            return Err(err.into());
          },
        }
      }
    }
  };
}

impl SharedClient {
  /// Start connecting to `url` in the background. Must be called within a tokio runtime.
  pub fn connect(url: &str) -> Self {
    let shared_cl = Self {
      state: Arc::new(Mutex::new(ClientState::Disconnected(0))),
      statements: Arc::new(Mutex::new(StatementCache::default())),
    };
    let task_cl = shared_cl.clone();
    let url = url.to_string();
    tokio::spawn(async move {
      task_cl.run_client(url).await;
      debug!("client background task stopped.");
    });
    shared_cl
  }

  async fn run_client(&self, url: String) {
    let mut version = 0;
    loop {
      version += 1;
      debug!("client task: Connecting: ver={}", version);
      self.set_state(ClientState::Connecting(version));
      let (cl, conn) = loop {
        match connect(&url, NoTls).await {
          Ok(res) => break res,
          Err(e) => {
            debug!("client task: ver={}: connect error: {}", version, e);
            sleep(Duration::from_millis(500)).await;
          },
        }
      };
      debug!("client task: ver={}: Connecting -> Connected", version);
      self.set_state(ClientState::Connected(Arc::new((version, cl))));

      match conn.await {
        Err(e) => {
          info!("tokio-postgres connection error: {}", e);
        },
        Ok(()) => {
          debug!("tokio-postgres connection closed.");
          self.set_state(ClientState::Disconnected(version));
          return;
        },
      }
      self.set_state(ClientState::Disconnected(version));
      // wait a little bit before trying to connect.
      sleep(Duration::from_millis(500)).await;
    }
  }

  pub async fn get_client(&self) -> Result<RefClient> {
    let mut retries = 0u32;
    loop {
      match self.get_state() {
        ClientState::Connected(cl) => return Ok(cl),
        ClientState::Connecting(version) | ClientState::Disconnected(version) => {
          debug!("get_client: ver={}: waiting for connection", version);
          sleep(Duration::from_millis(100)).await;
        },
      }
      retries += 1;
      if retries >= MAX_RETRIES {
        return Err(Error::DisconnectedError("Failed to connect to database".to_string()));
      }
    }
  }

  /// Prepared statement for `query` on client `cl`, cached per client version.
  async fn prepare(&self, cl: &RefClient, query: &str) -> Result<Statement> {
    let version = cl.0;
    if let Some(statement) = self.cached_statement(version, query) {
      return Ok(statement);
    }
    debug!("prepare: ver={}: query=[[{}]]", version, query);
    let statement = cl.1.prepare(query).await.map_err(|err| {
      error!("Postgres prepare error: {}, query=[[{}]]", err, query);
      Error::from(err)
    })?;
    let mut cache = self.lock_statements();
    if cache.version == version {
      cache.prepared.insert(query.to_string(), statement.clone());
    }
    Ok(statement)
  }

  fn cached_statement(&self, version: u64, query: &str) -> Option<Statement> {
    let mut cache = self.lock_statements();
    if cache.version != version {
      // new connection, old statements are gone.
      cache.version = version;
      cache.prepared.clear();
      return None;
    }
    cache.prepared.get(query).cloned()
  }

  /// Run one or more statements without parameters (schema setup).
  pub async fn batch_execute(&self, sql: &str) -> Result<()> {
    let cl = self.get_client().await?;
    cl.1.batch_execute(sql).await.map_err(|err| {
      error!("Postgres batch error: {}", err);
      Error::from(err)
    })
  }

  pub fn get_state(&self) -> ClientState {
    self.lock_state().clone()
  }

  fn set_state(&self, state: ClientState) {
    *self.lock_state() = state;
  }

  fn lock_state(&self) -> MutexGuard<'_, ClientState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn lock_statements(&self) -> MutexGuard<'_, StatementCache> {
    self.statements.lock().unwrap_or_else(|e| e.into_inner())
  }

  impl_client_method!(query_one, Row);
  impl_client_method!(query_opt, Option<Row>);
  impl_client_method!(execute, u64);
}
