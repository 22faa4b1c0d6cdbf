//! The system administrator (spec §6): CLI/config resolution, the policy
//! rules file reader, and the playback timer that submits staged rules into
//! a running [`ratectl_core::CoreControlApplication`].

mod administrator;
mod config;
mod housekeeping_file;
mod policy_file;

pub use administrator::SystemAdmin;
pub use config::{CliConfig, ConfigError, ControlTypeArg, ControllerRole, RuntimeConfig};
pub use housekeeping_file::{load as load_housekeeping_file, HousekeepingFileError};
pub use policy_file::{load as load_policy_file, PolicyEntry, PolicyFileError};
