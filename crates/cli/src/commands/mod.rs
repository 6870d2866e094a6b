//! cockpitctl subcommands

mod run;
mod settings;

pub use run::{RunArgs, run};
pub use settings::{SettingsCommands, settings};

use std::path::PathBuf;

/// Resolve the console's data directory: explicit flag first, then the
/// platform-local data directory, falling back to the working directory.
pub(crate) fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("opencockpit")
    })
}
