//! Derive macros for servicetree.
//!
//! This crate provides `#[derive(Participant)]`, which lets a host struct take
//! part in a service tree through a node it embeds.
//!
//! Generated code references `::servicetree::Participant` and
//! `::servicetree::Node`; the `servicetree` crate aliases itself so the macro
//! also works inside it.

use proc_macro::TokenStream;

mod participant;

/// Derive macro for host objects that embed a service node.
///
/// Exactly one field must be marked `#[node]` and hold an `Arc<Node>`. The
/// generated `Participant` impl hands out that node, so the host can be passed
/// to `Node::link_from` and `Node::link_to`.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use servicetree::{Node, Participant};
///
/// #[derive(Participant)]
/// pub struct Worker {
///     #[node]
///     node: Arc<Node>,
///     name: String,
/// }
///
/// // Generated implementation:
/// // impl Participant for Worker {
/// //     fn as_node(&self) -> Option<Arc<Node>> {
/// //         Some(Arc::clone(&self.node))
/// //     }
/// // }
/// ```
#[proc_macro_derive(Participant, attributes(node))]
pub fn derive_participant(input: TokenStream) -> TokenStream {
    participant::derive_participant_impl(input)
}
