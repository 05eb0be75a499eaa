pub mod handlers;
pub mod models;
pub mod repository;
pub mod resolver;

pub use repository::TransactionRepository;
