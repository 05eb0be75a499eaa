pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod provider;
pub mod repository;
pub mod webhook;

pub use lifecycle::PaymentLifecycle;
pub use repository::PaymentRepository;
