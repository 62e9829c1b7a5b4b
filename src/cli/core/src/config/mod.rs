/* src/cli/core/src/config/mod.rs */

mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use loader::{find_stitch_config, load_stitch_config};
pub use types::StitchConfig;
