mod providers;
mod vault_events;

pub use providers::*;
pub use vault_events::*;
