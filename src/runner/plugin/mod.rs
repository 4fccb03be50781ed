//! Native API plumbing between scripts and the host.
//!
//! - [`types`]: the evaluation context and the native object model
//!   (bindings, methods, properties, capabilities).
//! - [`registry`]: the named singletons installed into every compiled script.
//! - [`config`]: engine configuration loaded from TOML.
//!
//! API classes are plain globals of the realm. They are declared with the
//! `ApiClass` binding kind, so a script can read but never reassign them.

pub mod config;
pub mod registry;
pub mod types;

pub use config::{ConfigError, EngineConfig};
pub use registry::ApiRegistry;
pub use types::{EvalContext, NativeObject, NativeObjectBinding};
