pub mod commands;
pub mod events;

pub use commands::*;
pub use events::*;

pub use commands::ProductError;
