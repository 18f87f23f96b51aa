pub mod fake;
pub mod inventory;
pub mod mailbox;
pub mod pricing;
pub mod role;
pub mod trader;

pub use fake::*;
pub use inventory::*;
pub use mailbox::*;
pub use pricing::*;
pub use role::*;
pub use trader::*;
