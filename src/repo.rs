mod memory;
mod postgres;
mod subscriptions;

pub use memory::*;
pub use postgres::*;
pub use subscriptions::*;
