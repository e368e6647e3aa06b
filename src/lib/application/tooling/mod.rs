mod error;
mod interface;
mod process;

pub use error::BackendError;
pub use interface::{BackendLauncher, BackendSession};
pub use process::{StdioBackend, StdioLauncher};
