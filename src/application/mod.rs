// Application layer: the ledger service and its result types.

mod credentials;
pub mod error;
pub mod reporting;
pub mod service;

pub use credentials::{hash_password, verify_password};
pub use error::*;
pub use reporting::*;
pub use service::*;
