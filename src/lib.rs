//! servicetree - hierarchical service resolution
//!
//! Objects link into a parent/child chain of nodes. Named services registered
//! on a node resolve from every descendant, and can be raised toward the top
//! of the chain without knowing its depth up front.

// Lets `#[derive(Participant)]` expand to `::servicetree::...` inside this crate too.
extern crate self as servicetree;

pub mod cli;
pub mod config;
pub mod context;
pub mod di;
pub mod error;
pub mod node;

pub use di::{Participant, Resolve, ResolverHandle, Service};
pub use error::{AppError, InjectError};
pub use node::{Node, Role};
