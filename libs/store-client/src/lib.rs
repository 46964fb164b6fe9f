//! HTTP-facing collaborators of the rule engine: the reqwest-backed
//! transport used by the `rest_*` built-ins, the constant-store client with
//! its TTL cache, and the persisted rule artifact models.

pub mod constants;
pub mod error;
pub mod models;
pub mod transport;

pub use constants::{CachedConstantStore, HttpConstantStore};
pub use error::{Error, Result};
pub use models::RuleRecord;
pub use transport::ReqwestTransport;
