//! Process-wide helpers shared by the workspace binaries: logging bootstrap
//! and build version information.

pub mod logging;
pub mod version;
