//! Service tree and method resolution
//!
//! Methods live in a tree of namespaces. A dotted path such as
//! `users.admin.getUser` walks one namespace per segment and must end on a
//! method. The tree is built once and then shared read-only between
//! concurrent requests, so `Router` is an `Arc` and clones are cheap.
//!
//! # Resolution Rules
//!
//! Given `{ a: { b: { c: <method> } } }`:
//! - `a.b.c` resolves to the method
//! - `a.b.x` does not resolve (missing segment)
//! - `a.b` does not resolve (ends on a namespace)
//! - `a..c` and the empty path do not resolve (empty segment)
//!
//! # Examples
//!
//! ```rust
//! use tern_server::{accept_any, resolver_fn, Method, Router};
//! use tern_core::Value;
//!
//! let ping = Method::new(accept_any(), resolver_fn(|_, _, _| async { Ok(Value::from("pong")) }));
//!
//! let router = Router::from_fn(|service| {
//!     service
//!         .method("getStatus", ping.clone())
//!         .namespace("admin", |admin| admin.method("getStatus", ping.clone()))
//! });
//!
//! assert!(router.resolve("admin.getStatus").is_some());
//! assert!(router.resolve("admin").is_none());
//! assert_eq!(router.methods(), vec!["admin.getStatus", "getStatus"]);
//! ```

use crate::handler::Method;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A node of the service tree
#[derive(Debug, Clone)]
pub enum ServiceNode {
    Method(Arc<Method>),
    Namespace(BTreeMap<String, ServiceNode>),
}

/// Builder for one namespace level
#[derive(Debug, Default)]
pub struct ServiceBuilder {
    children: BTreeMap<String, ServiceNode>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method; a repeated name replaces the earlier entry
    pub fn method(mut self, name: impl Into<String>, method: Method) -> Self {
        self.children
            .insert(name.into(), ServiceNode::Method(Arc::new(method)));
        self
    }

    /// Register a nested namespace
    pub fn namespace<F>(mut self, name: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(ServiceBuilder) -> ServiceBuilder,
    {
        let nested = build(ServiceBuilder::new());
        self.children
            .insert(name.into(), ServiceNode::Namespace(nested.children));
        self
    }

    /// Mount an already built router as a namespace
    pub fn mount(mut self, name: impl Into<String>, router: &Router) -> Self {
        self.children
            .insert(name.into(), ServiceNode::Namespace(router.root.as_ref().clone()));
        self
    }

    pub fn build(self) -> Router {
        Router {
            root: Arc::new(self.children),
        }
    }
}

/// Read-only service tree
#[derive(Debug, Clone, Default)]
pub struct Router {
    root: Arc<BTreeMap<String, ServiceNode>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    /// Build a router by filling in the root namespace
    pub fn from_fn<F>(build: F) -> Self
    where
        F: FnOnce(ServiceBuilder) -> ServiceBuilder,
    {
        build(ServiceBuilder::new()).build()
    }

    /// Resolve a dotted path to a method
    pub fn resolve(&self, path: &str) -> Option<Arc<Method>> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut node = self.root.get(first)?;

        for segment in segments {
            match node {
                ServiceNode::Namespace(children) => node = children.get(segment)?,
                ServiceNode::Method(_) => return None,
            }
        }

        match node {
            ServiceNode::Method(method) => Some(Arc::clone(method)),
            ServiceNode::Namespace(_) => None,
        }
    }

    pub fn has_method(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    /// Every registered method path, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_paths(&self.root, "", &mut out);
        out
    }
}

fn collect_paths(children: &BTreeMap<String, ServiceNode>, prefix: &str, out: &mut Vec<String>) {
    for (name, node) in children {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match node {
            ServiceNode::Method(_) => out.push(path),
            ServiceNode::Namespace(nested) => collect_paths(nested, &path, out),
        }
    }
}
