pub mod migrate;
pub mod recount;
pub mod show;
