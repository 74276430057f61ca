pub mod decoder;
mod event;

pub use decoder::VaultEventKind;
pub use event::{Event, UnsavedEvent};
