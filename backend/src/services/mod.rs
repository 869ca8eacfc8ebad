//! Business logic services for the replenishment server

pub mod approval;
pub mod offers;
pub mod orders;
pub mod products;

pub use approval::ApprovalService;
pub use offers::{OfferSource, PgOfferSource, StaticOfferSource};
pub use orders::OrderService;
pub use products::ProductService;
