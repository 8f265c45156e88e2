//! Implementations of the CLI subcommands.

mod download_all;
mod hash_dir;
mod verify;

pub use download_all::run_download_all;
pub use hash_dir::run_hash_dir;
pub use verify::run_verify;
