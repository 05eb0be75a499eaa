pub mod conversion;
pub mod handlers;
pub mod models;
pub mod numbering;
pub mod repository;

pub use repository::BillingRepository;
