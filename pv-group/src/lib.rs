//! Groups of process variables with emulated remote function calls.
//!
//! A [`GroupBuilder`] collects variables and [`Function`]s into a
//! [`Registry`]. Each function is expanded into parameter variables plus
//! `Status`, `Retval` and `Process`; writing `Process` runs the function.
//! The finished group becomes a [`Database`] for a server loop, and its
//! schema drives [`pv_codegen`] to produce client bindings built on
//! [`client`].

pub mod client;
pub mod config;
mod database;
pub mod demo;
mod endpoint;
mod error;
mod function;
mod group;
mod registry;

pub use config::{ClientConfig, ServerConfig};
pub use database::{Database, Hook};
pub use endpoint::{Descriptor, Endpoint, GetHandler, LockGroup, PutHandler};
pub use error::{DatabaseError, RegistryError};
pub use function::{expand, Function, FunctionBody, FunctionCluster};
pub use group::GroupBuilder;
pub use registry::Registry;
