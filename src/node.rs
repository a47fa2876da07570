//! Service nodes: a local registry plus a non-owning link to a parent.
//!
//! Nodes form a tree. Every node has at most one parent and any number of
//! children. Lookup and promotion walk upward from the requesting node:
//!
//! - [`Node::get_service`] resolves locally, then delegates to the parent.
//! - [`Node::raise`] moves a locally owned service one level up per hop until
//!   it reaches the effective root of the chain.
//!
//! A node never owns its parent. Dropping the last strong reference to a
//! parent leaves its children unbound.
//!
//! The chain must be acyclic. Linking a node below one of its own descendants
//! makes lookups on that chain recurse without end.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::di::{Participant, Resolve, Service};
use crate::error::InjectError;

/// Role of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Regular node with a registry.
    Container,
    /// Non-resolving placeholder that caps a chain. Children linked from a
    /// sentinel treat themselves as the effective root when raising.
    Sentinel,
}

/// Upward link as stored on the child.
enum Link {
    Unbound,
    Linked(Weak<Node>),
    Sentinel(Weak<Node>),
    Lookup(Weak<dyn Resolve>),
}

/// Upgraded view of the link for the duration of one operation.
enum Upstream {
    Detached,
    Container(Arc<Node>),
    Root(Arc<dyn Resolve>),
}

type LinkHook = dyn Fn(&Node) + Send + Sync;

/// A participant in the service tree.
///
/// Always handled through `Arc<Node>`; constructors return one.
pub struct Node {
    label: String,
    role: Role,
    me: Weak<Node>,
    services: RwLock<HashMap<String, Service>>,
    link: RwLock<Link>,
    hooks: RwLock<Vec<Arc<LinkHook>>>,
}

impl Node {
    /// Creates an unbound container node.
    pub fn new() -> Arc<Self> {
        Self::named("node")
    }

    /// Creates an unbound container node with a label used in logs.
    pub fn named(label: impl Into<String>) -> Arc<Self> {
        Self::with_role(label, Role::Container)
    }

    /// Creates a sentinel that caps a chain without resolving anything.
    pub fn sentinel() -> Arc<Self> {
        Self::with_role("sentinel", Role::Sentinel)
    }

    /// Creates an unbound node with an explicit role.
    pub fn with_role(label: impl Into<String>, role: Role) -> Arc<Self> {
        let label = label.into();
        Arc::new_cyclic(|me| Self {
            label,
            role,
            me: me.clone(),
            services: RwLock::new(HashMap::new()),
            link: RwLock::new(Link::Unbound),
            hooks: RwLock::new(Vec::new()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_sentinel(&self) -> bool {
        self.role == Role::Sentinel
    }

    // ------------------------------------------------------------------
    // Linking
    // ------------------------------------------------------------------

    /// Binds this node's parent to `caller`.
    ///
    /// The caller must expose at least a lookup capability. A sentinel node or
    /// a lookup-only host becomes the effective root above this node. Linking
    /// again replaces the previous parent.
    pub fn link_from(&self, caller: &dyn Participant) -> Result<&Self, InjectError> {
        let link = if let Some(node) = caller.as_node() {
            match node.role {
                Role::Container => Link::Linked(Arc::downgrade(&node)),
                Role::Sentinel => Link::Sentinel(Arc::downgrade(&node)),
            }
        } else if let Some(resolver) = caller.as_resolver() {
            Link::Lookup(Arc::downgrade(&resolver))
        } else {
            tracing::debug!(node = %self.label, "Rejected link from caller without lookup capability");
            return Err(InjectError::IncompatibleCaller);
        };

        *self.link.write() = link;
        tracing::debug!(
            node = %self.label,
            parent = %self.parent().map(|p| p.label.clone()).unwrap_or_else(|| "<lookup>".to_string()),
            "Linked to parent"
        );

        self.notify_linked();
        Ok(self)
    }

    /// Links `target` below this node when it supports the protocol.
    ///
    /// Targets without a node are left untouched. The target is returned
    /// either way.
    pub fn link_to<T: Participant>(&self, target: T) -> T {
        if let Some(node) = target.as_node() {
            if let Err(err) = node.link_from(self) {
                tracing::warn!(node = %self.label, error = %err, "Could not link target");
            }
        } else {
            tracing::trace!(node = %self.label, "Target does not participate, link skipped");
        }
        target
    }

    /// Whether this node has a live parent.
    pub fn is_bound(&self) -> bool {
        !matches!(self.upstream(), Upstream::Detached)
    }

    /// The parent node, if the link points at a live node.
    ///
    /// Lookup-only parents are not nodes and yield `None`.
    pub fn parent(&self) -> Option<Arc<Node>> {
        match &*self.link.read() {
            Link::Linked(parent) | Link::Sentinel(parent) => parent.upgrade(),
            Link::Unbound | Link::Lookup(_) => None,
        }
    }

    /// Registers a hook called after every successful [`link_from`](Node::link_from).
    pub fn on_link<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Node) + Send + Sync + 'static,
    {
        self.hooks.write().push(Arc::new(hook));
        self
    }

    fn notify_linked(&self) {
        // Hooks may touch this node again, so run them outside the lock.
        let hooks: Vec<Arc<LinkHook>> = self.hooks.read().iter().cloned().collect();
        for hook in hooks {
            hook(self);
        }
    }

    fn upstream(&self) -> Upstream {
        match &*self.link.read() {
            Link::Unbound => Upstream::Detached,
            Link::Linked(parent) => parent
                .upgrade()
                .map_or(Upstream::Detached, Upstream::Container),
            Link::Sentinel(parent) => parent
                .upgrade()
                .map_or(Upstream::Detached, |node| Upstream::Root(node as Arc<dyn Resolve>)),
            Link::Lookup(resolver) => resolver
                .upgrade()
                .map_or(Upstream::Detached, Upstream::Root),
        }
    }

    // ------------------------------------------------------------------
    // Registration and lookup
    // ------------------------------------------------------------------

    /// Registers `service` under `key`, replacing any local entry.
    ///
    /// The entry shadows the same key anywhere up the chain.
    pub fn set_service(&self, key: impl Into<String>, service: Service) -> &Self {
        let key = key.into();
        tracing::trace!(node = %self.label, key = %key, "Registered service");
        self.services.write().insert(key, service);
        self
    }

    /// Resolves `key` locally, then through the parent chain.
    ///
    /// Sentinels resolve nothing.
    pub fn get_service(&self, key: &str) -> Result<Service, InjectError> {
        if self.is_sentinel() {
            return Err(InjectError::Unbound {
                key: key.to_string(),
            });
        }

        if let Some(service) = self.local(key) {
            return Ok(service);
        }

        match self.upstream() {
            Upstream::Container(parent) => parent.get_service(key),
            Upstream::Root(resolver) => resolver.get_service(key),
            Upstream::Detached => {
                tracing::trace!(node = %self.label, key = %key, "Lookup reached an unbound node");
                Err(InjectError::Unbound {
                    key: key.to_string(),
                })
            }
        }
    }

    /// Resolves `key` and downcasts the service to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, InjectError> {
        self.get_service(key)?
            .downcast::<T>()
            .map_err(|_| InjectError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Whether `key` resolves from this node.
    pub fn has_service(&self, key: &str) -> bool {
        self.get_service(key).is_ok()
    }

    /// Whether `key` is registered on this node itself.
    pub fn owns(&self, key: &str) -> bool {
        self.services.read().contains_key(key)
    }

    /// Keys registered on this node, sorted.
    pub fn local_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.services.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn local(&self, key: &str) -> Option<Service> {
        self.services.read().get(key).cloned()
    }

    // ------------------------------------------------------------------
    // Promotion
    // ------------------------------------------------------------------

    /// Raises `key` toward the effective root of the chain.
    ///
    /// A node owning `key` hands it to its parent and the call continues
    /// upward; a node that does not own it forwards the call unchanged. With
    /// `safe`, the walk stops as soon as the parent already resolves `key`,
    /// leaving the local entry in place.
    ///
    /// Returns the number of hops walked by this call.
    ///
    /// # Errors
    ///
    /// [`InjectError::UnknownService`] when the effective root is reached and
    /// nothing on the way owned `key`.
    pub fn raise(&self, key: &str, safe: bool) -> Result<usize, InjectError> {
        let mine = self.local(key);

        let parent = match self.upstream() {
            Upstream::Container(parent) => parent,
            Upstream::Root(_) | Upstream::Detached => {
                return match mine {
                    Some(_) => Ok(0),
                    None => {
                        tracing::debug!(node = %self.label, key = %key, "Raise reached the root without finding service");
                        Err(InjectError::UnknownService {
                            key: key.to_string(),
                        })
                    }
                };
            }
        };

        if let Some(service) = mine {
            if safe && parent.has_service(key) {
                tracing::debug!(
                    node = %self.label,
                    parent = %parent.label,
                    key = %key,
                    "Parent already provides service, raise stopped"
                );
                return Ok(0);
            }

            parent.set_service(key, service);
            self.services.write().remove(key);
            tracing::debug!(node = %self.label, parent = %parent.label, key = %key, "Promoted service");
        }

        Ok(parent.raise(key, safe)? + 1)
    }

    /// [`raise`](Node::raise) without overriding services an ancestor already
    /// provides.
    pub fn raise_safe(&self, key: &str) -> Result<usize, InjectError> {
        self.raise(key, true)
    }
}

impl Resolve for Node {
    fn get_service(&self, key: &str) -> Result<Service, InjectError> {
        Node::get_service(self, key)
    }
}

impl Participant for Node {
    fn as_node(&self) -> Option<Arc<Node>> {
        self.me.upgrade()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("label", &self.label)
            .field("role", &self.role)
            .field("bound", &self.is_bound())
            .field("services", &self.local_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Plain;

    impl Participant for Plain {}

    struct MapResolver(HashMap<String, Service>);

    impl Resolve for MapResolver {
        fn get_service(&self, key: &str) -> Result<Service, InjectError> {
            self.0.get(key).cloned().ok_or_else(|| InjectError::Unbound {
                key: key.to_string(),
            })
        }
    }

    fn value(node: &Node, key: &str) -> i32 {
        *node.get_as::<i32>(key).unwrap()
    }

    /// root <- c1 <- c2
    fn chain() -> (Arc<Node>, Arc<Node>, Arc<Node>) {
        let root = Node::named("root");
        let c1 = Node::named("c1");
        let c2 = Node::named("c2");
        c1.link_from(&root).unwrap();
        c2.link_from(&c1).unwrap();
        (root, c1, c2)
    }

    #[test]
    fn test_new_node_is_unbound_and_empty() {
        let node = Node::new();
        assert!(!node.is_bound());
        assert!(node.local_keys().is_empty());
        assert!(node.parent().is_none());
        assert_eq!(node.role(), Role::Container);
    }

    #[test]
    fn test_local_service_resolves() {
        let node = Node::new();
        node.set_service("answer", Arc::new(42i32));
        assert_eq!(value(&node, "answer"), 42);
    }

    #[test]
    fn test_set_service_overwrites() {
        let node = Node::new();
        node.set_service("answer", Arc::new(1i32))
            .set_service("answer", Arc::new(2i32));
        assert_eq!(value(&node, "answer"), 2);
        assert_eq!(node.local_keys(), vec!["answer"]);
    }

    #[test]
    fn test_lookup_delegates_to_parent() {
        let parent = Node::named("parent");
        let child = Node::named("child");
        child.link_from(&parent).unwrap();
        parent.set_service("k", Arc::new(7i32));

        assert_eq!(value(&child, "k"), 7);
        assert!(!child.owns("k"));
    }

    #[test]
    fn test_local_entry_shadows_ancestor() {
        let (root, _c1, c2) = chain();
        root.set_service("k", Arc::new(1i32));
        c2.set_service("k", Arc::new(2i32));

        assert_eq!(value(&c2, "k"), 2);
        assert_eq!(value(&root, "k"), 1);
    }

    #[test]
    fn test_unbound_lookup_fails() {
        let node = Node::named("lonely");
        let err = node.get_service("missing").unwrap_err();
        assert_eq!(
            err,
            InjectError::Unbound {
                key: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_lookup_missing_everywhere_fails_at_root() {
        let (_root, _c1, c2) = chain();
        assert!(matches!(
            c2.get_service("missing"),
            Err(InjectError::Unbound { .. })
        ));
    }

    #[test]
    fn test_link_from_returns_self_and_binds() {
        let parent = Node::named("parent");
        let child = Node::named("child");
        let linked = child.link_from(&parent).unwrap();

        assert!(std::ptr::eq(linked, child.as_ref()));
        assert!(child.is_bound());
        assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent));
    }

    #[test]
    fn test_link_from_incompatible_caller_leaves_link() {
        let parent = Node::named("parent");
        let child = Node::named("child");
        child.link_from(&parent).unwrap();

        let err = child.link_from(&Plain).unwrap_err();
        assert_eq!(err, InjectError::IncompatibleCaller);
        assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent));
    }

    #[test]
    fn test_relink_replaces_parent() {
        let first = Node::named("first");
        let second = Node::named("second");
        let child = Node::named("child");
        first.set_service("k", Arc::new(1i32));
        second.set_service("k", Arc::new(2i32));

        child.link_from(&first).unwrap();
        child.link_from(&second).unwrap();

        assert_eq!(value(&child, "k"), 2);
        assert!(Arc::ptr_eq(&child.parent().unwrap(), &second));
    }

    #[test]
    fn test_link_to_binds_target() {
        let parent = Node::named("parent");
        let child = parent.link_to(Node::named("child"));

        assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent));
        assert!(!parent.is_bound());
    }

    #[test]
    fn test_link_to_non_participant_is_noop() {
        let node = Node::named("node");
        let target = node.link_to(Plain);

        let _: Plain = target;
        assert!(!node.is_bound());
    }

    #[test]
    fn test_dropped_parent_unbinds_child() {
        let child = Node::named("child");
        {
            let parent = Node::named("parent");
            parent.set_service("k", Arc::new(1i32));
            child.link_from(&parent).unwrap();
            assert!(child.is_bound());
        }

        assert!(!child.is_bound());
        assert!(matches!(
            child.get_service("k"),
            Err(InjectError::Unbound { .. })
        ));
    }

    #[test]
    fn test_get_as_type_mismatch() {
        let node = Node::new();
        node.set_service("k", Arc::new("text".to_string()));

        let err = node.get_as::<i32>("k").unwrap_err();
        assert!(matches!(err, InjectError::TypeMismatch { ref key, .. } if key == "k"));
        assert_eq!(node.get_as::<String>("k").unwrap().as_str(), "text");
    }

    #[test]
    fn test_raise_scenario_three_levels() {
        let (root, c1, c2) = chain();
        c2.set_service("x", Arc::new(1i32));

        assert_eq!(c2.raise_safe("x").unwrap(), 2);
        assert!(root.owns("x"));
        assert!(!c1.owns("x"));
        assert!(!c2.owns("x"));
        assert_eq!(value(&root, "x"), 1);
        assert_eq!(value(&c2, "x"), 1);
    }

    #[test]
    fn test_raise_is_idempotent_at_root() {
        let (root, _c1, c2) = chain();
        c2.set_service("x", Arc::new(1i32));
        c2.raise_safe("x").unwrap();

        assert_eq!(root.raise_safe("x").unwrap(), 0);
        assert_eq!(root.local_keys(), vec!["x"]);
    }

    #[test]
    fn test_raise_from_non_owner_forwards_upward() {
        let (root, c1, c2) = chain();
        c1.set_service("x", Arc::new(1i32));

        // c2 does not own x; it forwards, c1 promotes to root.
        assert_eq!(c2.raise_safe("x").unwrap(), 2);
        assert!(root.owns("x"));
        assert!(!c1.owns("x"));
    }

    #[test]
    fn test_raise_safe_keeps_ancestor_value() {
        let (root, _c1, c2) = chain();
        root.set_service("x", Arc::new(1i32));
        c2.set_service("x", Arc::new(2i32));

        assert_eq!(c2.raise("x", true).unwrap(), 0);
        assert!(c2.owns("x"));
        assert_eq!(value(&root, "x"), 1);
    }

    #[test]
    fn test_raise_unsafe_overrides_ancestor_value() {
        let (root, c1, c2) = chain();
        root.set_service("x", Arc::new(1i32));
        c2.set_service("x", Arc::new(2i32));

        assert_eq!(c2.raise("x", false).unwrap(), 2);
        assert!(!c2.owns("x"));
        assert!(!c1.owns("x"));
        assert_eq!(value(&root, "x"), 2);
    }

    #[test]
    fn test_raise_unknown_service_leaves_registries() {
        let (root, c1, c2) = chain();
        root.set_service("a", Arc::new(1i32));
        c1.set_service("b", Arc::new(2i32));

        let err = c2.raise_safe("missing").unwrap_err();
        assert_eq!(
            err,
            InjectError::UnknownService {
                key: "missing".to_string()
            }
        );
        assert_eq!(root.local_keys(), vec!["a"]);
        assert_eq!(c1.local_keys(), vec!["b"]);
        assert!(c2.local_keys().is_empty());
    }

    #[test]
    fn test_raise_on_unbound_node() {
        let node = Node::new();
        node.set_service("x", Arc::new(1i32));
        assert_eq!(node.raise_safe("x").unwrap(), 0);
        assert!(matches!(
            node.raise_safe("y"),
            Err(InjectError::UnknownService { .. })
        ));
    }

    #[test]
    fn test_sentinel_caps_raise() {
        let sentinel = Node::sentinel();
        let top = Node::named("top");
        let child = Node::named("child");
        top.link_from(&sentinel).unwrap();
        child.link_from(&top).unwrap();
        child.set_service("x", Arc::new(1i32));

        assert!(top.is_bound());
        assert_eq!(child.raise_safe("x").unwrap(), 1);
        assert!(top.owns("x"));
        assert!(!sentinel.owns("x"));
        assert!(matches!(
            top.raise_safe("missing"),
            Err(InjectError::UnknownService { .. })
        ));
    }

    #[test]
    fn test_sentinel_resolves_nothing() {
        let sentinel = Node::sentinel();
        sentinel.set_service("x", Arc::new(1i32));
        let child = Node::named("child");
        child.link_from(&sentinel).unwrap();

        assert!(sentinel.is_sentinel());
        assert!(matches!(
            child.get_service("x"),
            Err(InjectError::Unbound { .. })
        ));
    }

    #[test]
    fn test_lookup_only_parent() {
        let mut services: HashMap<String, Service> = HashMap::new();
        services.insert("config".to_string(), Arc::new(5i32));
        let resolver: Arc<dyn Resolve> = Arc::new(MapResolver(services));
        let handle = crate::di::ResolverHandle::new(Arc::clone(&resolver));

        let node = Node::named("node");
        node.link_from(&handle).unwrap();
        node.set_service("own", Arc::new(1i32));

        assert!(node.is_bound());
        assert!(node.parent().is_none());
        assert_eq!(value(&node, "config"), 5);
        // Lookup-only parents cannot receive services.
        assert_eq!(node.raise_safe("own").unwrap(), 0);
        assert!(node.owns("own"));
    }

    #[test]
    fn test_link_to_lookup_only_target_is_noop() {
        let resolver: Arc<dyn Resolve> = Arc::new(MapResolver(HashMap::new()));
        let node = Node::named("node");
        let handle = node.link_to(crate::di::ResolverHandle::new(resolver));

        assert!(handle.as_node().is_none());
        assert!(!node.is_bound());
    }

    #[test]
    fn test_on_link_hook_fires_per_link() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parent = Node::named("parent");
        parent.set_service("k", Arc::new(3i32));
        let child = Node::named("child");

        let seen = Arc::clone(&calls);
        child.on_link(move |node| {
            assert_eq!(*node.get_as::<i32>("k").unwrap(), 3);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        child.link_from(&parent).unwrap();
        parent.link_to(Arc::clone(&child));
        let _ = child.link_from(&Plain);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debug_lists_keys() {
        let node = Node::named("dbg");
        node.set_service("b", Arc::new(1i32));
        node.set_service("a", Arc::new(2i32));
        let out = format!("{:?}", node);
        assert!(out.contains("dbg"));
        assert!(out.contains("[\"a\", \"b\"]"));
    }
}
