//! TeamSpeak 3 server updater library.
//!
//! This crate provides the update pipeline behind the `ts3-updater` binary:
//! it asks the vendor which server release is current, compares it with the
//! installed one, and when they differ downloads, verifies and installs the
//! new release and restarts the server. It can also be driven
//! programmatically with injected collaborators for testing.
//!
//! # Modules
//!
//! - [`archive`] - Release archive inspection and strip-components extraction
//! - [`checksum`] - SHA-256 verification with system tools or `sha2`
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Layered run configuration
//! - [`deps`] - External executable detection
//! - [`digest`] - Validated SHA-256 digest type
//! - [`download`] - Metadata and mirror downloads over HTTP
//! - [`error`] - Error types and the failure taxonomy
//! - [`install`] - Install directory preparation and release placement
//! - [`license`] - First-run license acceptance
//! - [`lock`] - Advisory lock against concurrent runs
//! - [`logging`] - Logger initialisation
//! - [`metadata`] - Vendor metadata parsing
//! - [`output`] - Operator-facing progress messages
//! - [`pipeline`] - Update pipeline orchestration
//! - [`platform`] - Host to metadata key resolution
//! - [`service`] - Server control through the vendor script
//! - [`state`] - Marker files and the updater manifest
//! - [`version`] - Installed-version detection and the version gate
//! - [`workdir`] - Scoped working directory with signal cleanup

pub mod archive;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod deps;
pub mod digest;
pub mod download;
pub mod error;
pub mod install;
pub mod license;
pub mod lock;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod service;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod version;
pub mod workdir;
