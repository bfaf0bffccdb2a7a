pub mod util;

mod store;
pub use store::*;

mod memory;
pub use memory::MemoryStore;

pub mod client;
pub mod pg;
pub use pg::{PgDocument, PgStore};

mod user;
mod article;
pub use self::{
  user::*,
  article::*,
};

mod service;
pub use service::*;
