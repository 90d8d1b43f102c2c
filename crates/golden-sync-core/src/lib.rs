//! Golden repository metadata sync.
//!
//! A linear pipeline: authenticate against the platform, resolve the
//! application named by the inbound event, mint an installation token for
//! the repository's organization, clone the repository, stamp its metadata
//! file, push, and report the outcome to the callback URL.
//!
//! ```text
//! Inbound ──► Pipeline::run ──► RunReport
//!               │
//!               ├── Platform       (token exchange, application reads)
//!               ├── SecretStore    (per-org app credentials)
//!               ├── HostingClient  (signed assertion → installation token)
//!               ├── WorkingCopy    (clone guard, removed on drop)
//!               └── Notifier       (progress pings, status report)
//! ```

pub mod clone_url;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod git;
pub mod hosting;
pub mod io;
pub mod metadata;
pub mod notify;
pub mod pipeline;
pub mod platform;
pub mod publish;
pub mod secrets;
pub mod tool_runner;
pub mod workspace;

pub use config::Settings;
pub use context::{AppAttributes, ExecutionContext};
pub use error::{Result, SyncError};
pub use pipeline::{Inbound, Pipeline, RunReport, Stage};
