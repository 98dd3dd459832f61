//! User directory implementations.

pub mod entity;
pub mod memory;
pub mod migrations;
pub mod sea_orm_repo;

pub use memory::InMemoryUserDirectory;
pub use sea_orm_repo::SeaOrmUserDirectory;
