//! Capability interface for taking part in a service tree.
//!
//! Any host object can be handed to [`Node::link_from`] or [`Node::link_to`].
//! Whether it actually participates is decided by its [`Participant`] impl:
//!
//! - `as_node()` exposes a full node (lookup, registration, promotion). Such a
//!   host can be linked as a child and can serve as a parent.
//! - `as_resolver()` exposes only lookup. Such a host can cap a chain as its
//!   parent but is never linked itself, and promotion stops below it.
//! - Neither: the host is not part of the protocol. `link_from` rejects it and
//!   `link_to` leaves it alone.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use servicetree::{Node, Participant};
//!
//! #[derive(Participant)]
//! pub struct Worker {
//!     #[node]
//!     node: Arc<Node>,
//! }
//!
//! let app = Node::named("app");
//! app.set_service("logger", Arc::new(String::from("stderr")));
//!
//! let worker = app.link_to(Worker { node: Node::named("worker") });
//! let logger = worker.node.get_as::<String>("logger")?;
//! ```

use std::any::Any;
use std::sync::Arc;

use crate::error::InjectError;
use crate::node::Node;

/// Opaque service reference stored under a key.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Minimum capability required to act as a parent: resolving a key.
pub trait Resolve: Send + Sync {
    fn get_service(&self, key: &str) -> Result<Service, InjectError>;
}

/// Explicit probe for the protocol capabilities a host object supports.
///
/// Both methods default to `None`, so a host that does not take part writes
/// an empty impl.
pub trait Participant {
    /// The node this object exposes, if it supports the full protocol.
    fn as_node(&self) -> Option<Arc<Node>> {
        None
    }

    /// The lookup capability this object exposes.
    ///
    /// Defaults to the node from [`as_node`](Participant::as_node).
    fn as_resolver(&self) -> Option<Arc<dyn Resolve>> {
        self.as_node().map(|node| node as Arc<dyn Resolve>)
    }
}

impl<T: Participant + ?Sized> Participant for Arc<T> {
    fn as_node(&self) -> Option<Arc<Node>> {
        (**self).as_node()
    }

    fn as_resolver(&self) -> Option<Arc<dyn Resolve>> {
        (**self).as_resolver()
    }
}

impl<T: Participant + ?Sized> Participant for &T {
    fn as_node(&self) -> Option<Arc<Node>> {
        (**self).as_node()
    }

    fn as_resolver(&self) -> Option<Arc<dyn Resolve>> {
        (**self).as_resolver()
    }
}

/// Wraps a lookup-only container so it can cap a chain.
///
/// Children hold a weak reference to the wrapped resolver. Keep the `Arc`
/// alive for as long as the children should resolve through it.
#[derive(Clone)]
pub struct ResolverHandle(pub Arc<dyn Resolve>);

impl ResolverHandle {
    pub fn new(resolver: Arc<dyn Resolve>) -> Self {
        Self(resolver)
    }
}

impl Participant for ResolverHandle {
    fn as_resolver(&self) -> Option<Arc<dyn Resolve>> {
        Some(Arc::clone(&self.0))
    }
}

// Re-export derive macro
pub use di_macros::Participant;
