//! The transaction/ACID layer (spec §4.7–§4.9).

pub mod manager;
pub mod operations;
pub mod scope;
pub mod scope_pool;

pub use manager::{Transaction, TransactionManager};
pub use operations::{Operation, OperationContext};
pub use scope::TransactionScope;
pub use scope_pool::{PooledScope, ScopePool};
