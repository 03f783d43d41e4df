pub mod gateway;
pub mod models;

pub use gateway::PersistenceGateway;
