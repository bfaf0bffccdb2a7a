pub mod user;
pub mod article;
pub use self::{
  user::*,
  article::*,
};
