//! CLI command handlers, one per file.

mod checksum;
mod forget;
mod status;
mod sync;
mod verify;

pub use checksum::run_checksum;
pub use forget::run_forget;
pub use status::run_status;
pub use sync::{run_sync, SyncArgs};
pub use verify::run_verify;
