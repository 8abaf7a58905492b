//! The method tree
//!
//! A [`Node`] is one element of the OSC address space. Nodes carrying
//! argument descriptors are *methods*; nodes without are *containers*.
//! Nodes own their children; every external operation is path-addressed
//! from the root, so FULL_PATH is computed during descent instead of being
//! stored.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{parse_type_tag, type_tag, Access, Argument, OscValue};
use crate::wire::SerializedNode;

/// Split an address into its non-empty segments
fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Canonical form of an address: `/seg1/seg2`, or `/` for the root
pub fn normalize_path(path: &str) -> String {
    let segs = split_path(path);
    if segs.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segs.join("/"))
    }
}

/// Declared attributes of a node, as passed to [`Node::set_opts`] and
/// [`Node::add_method`]. An empty option set clears the node back to a
/// pure container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeOptions {
    pub description: Option<String>,
    pub access: Option<Access>,
    pub tags: Option<Vec<String>>,
    pub critical: Option<bool>,
    pub arguments: Option<Vec<Argument>>,
}

impl NodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = Some(critical);
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Argument>) -> Self {
        self.arguments = Some(arguments);
        self
    }
}

/// One element of the OSC address space
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    name: String,
    description: Option<String>,
    access: Option<Access>,
    tags: Option<Vec<String>>,
    critical: Option<bool>,
    arguments: Option<Vec<Argument>>,
    children: HashMap<String, Node>,
}

impl Node {
    /// An empty container with the given segment name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            access: None,
            tags: None,
            critical: None,
            arguments: None,
            children: HashMap::new(),
        }
    }

    /// The tree root: empty name, no attributes
    pub fn root() -> Self {
        Self::new("")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn access(&self) -> Option<Access> {
        self.access
    }

    pub fn tags(&self) -> Option<&[String]> {
        self.tags.as_deref()
    }

    pub fn critical(&self) -> Option<bool> {
        self.critical
    }

    pub fn arguments(&self) -> Option<&[Argument]> {
        self.arguments.as_deref()
    }

    /// A method carries argument descriptors; a container does not
    pub fn is_method(&self) -> bool {
        self.arguments.is_some()
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.values()
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub fn get_child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    /// Returns the existing child or creates an empty container
    pub fn get_or_create_child(&mut self, name: &str) -> &mut Node {
        self.children
            .entry(name.to_string())
            .or_insert_with(|| Node::new(name))
    }

    /// Detach a child; silently does nothing when absent
    pub fn remove_child(&mut self, name: &str) {
        self.children.remove(name);
    }

    /// Replace the full set of declared attributes
    pub fn set_opts(&mut self, opts: NodeOptions) {
        self.description = opts.description;
        self.access = opts.access;
        self.tags = opts.tags;
        self.critical = opts.critical;
        self.arguments = opts.arguments;
    }

    fn clear_attributes(&mut self) {
        self.set_opts(NodeOptions::default());
    }

    /// Assign the value slot of the argument at `index`
    pub fn set_value(&mut self, index: usize, value: OscValue) -> Result<()> {
        let args = self
            .arguments
            .as_mut()
            .ok_or(Error::InvalidIndex { index, len: 0 })?;
        let len = args.len();
        let arg = args
            .get_mut(index)
            .ok_or(Error::InvalidIndex { index, len })?;
        arg.value = Some(value);
        Ok(())
    }

    /// Clear the value slot of the argument at `index`
    pub fn unset_value(&mut self, index: usize) -> Result<()> {
        let args = self
            .arguments
            .as_mut()
            .ok_or(Error::InvalidIndex { index, len: 0 })?;
        let len = args.len();
        let arg = args
            .get_mut(index)
            .ok_or(Error::InvalidIndex { index, len })?;
        arg.value = None;
        Ok(())
    }

    /// A node is empty when it declares nothing and contains nothing.
    /// `NoValue` access counts as undeclared.
    pub fn is_empty(&self) -> bool {
        matches!(self.access, None | Some(Access::NoValue))
            && self.arguments.is_none()
            && self.children.is_empty()
            && self.description.is_none()
            && self.tags.is_none()
            && self.critical.is_none()
    }

    /// Walk from this node along `path`
    pub fn resolve(&self, path: &str) -> Option<&Node> {
        let mut cur = self;
        for seg in split_path(path) {
            cur = cur.children.get(seg)?;
        }
        Some(cur)
    }

    /// Walk from this node along `path`, mutably
    pub fn resolve_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut cur = self;
        for seg in split_path(path) {
            cur = cur.children.get_mut(seg)?;
        }
        Some(cur)
    }

    /// Declare a method (or re-declare a container) at `path`, creating
    /// missing intermediate containers. Returns the canonical path.
    pub fn add_method(&mut self, path: &str, opts: NodeOptions) -> String {
        let mut cur = self;
        for seg in split_path(path) {
            cur = cur.get_or_create_child(seg);
        }
        cur.set_opts(opts);
        normalize_path(path)
    }

    /// Clear the node at `path` and prune every ancestor that becomes
    /// empty, stopping at the first non-empty one. Returns the canonical
    /// paths affected: the target first, then each pruned ancestor. Empty
    /// when no node exists at `path`.
    pub fn remove_method(&mut self, path: &str) -> Vec<String> {
        let segs = split_path(path);
        if segs.is_empty() {
            self.clear_attributes();
            return vec!["/".to_string()];
        }

        let mut pruned = Vec::new();
        if self.remove_rec(&segs, "", &mut pruned).is_none() {
            return Vec::new();
        }

        let target = normalize_path(path);
        let mut changed = vec![target.clone()];
        changed.extend(pruned.into_iter().filter(|p| *p != target));
        changed
    }

    /// Returns whether this node is empty after the removal below it, or
    /// `None` when the path does not exist. Pruned paths are recorded
    /// deepest-first.
    fn remove_rec(&mut self, segs: &[&str], prefix: &str, pruned: &mut Vec<String>) -> Option<bool> {
        let Some((seg, rest)) = segs.split_first() else {
            self.clear_attributes();
            return Some(self.is_empty());
        };

        let child_path = format!("{}/{}", prefix, seg);
        let child = self.children.get_mut(*seg)?;
        if child.remove_rec(rest, &child_path, pruned)? {
            self.children.remove(*seg);
            pruned.push(child_path);
        }
        Some(self.is_empty())
    }

    /// Serialize this node (and its subtree) to the wire shape, rooted at
    /// the given canonical path.
    pub fn serialize(&self, full_path: &str) -> SerializedNode {
        let mut out = SerializedNode {
            full_path: Some(full_path.to_string()),
            ..Default::default()
        };

        if !self.children.is_empty() {
            let base = if full_path == "/" { "" } else { full_path };
            out.contents = Some(
                self.children
                    .iter()
                    .map(|(name, child)| {
                        (name.clone(), child.serialize(&format!("{}/{}", base, name)))
                    })
                    .collect(),
            );
        }

        out.description = self.description.clone();
        out.access = self.access;
        out.tags = self.tags.clone();
        out.critical = self.critical;

        if let Some(args) = &self.arguments {
            let types: Vec<_> = args.iter().map(|a| a.osc_type.clone()).collect();
            out.type_tag = Some(type_tag(&types));

            if args.iter().any(|a| a.value.is_some()) {
                out.value = Some(
                    args.iter()
                        .map(|a| {
                            a.value
                                .as_ref()
                                .map(OscValue::to_json)
                                .unwrap_or(serde_json::Value::Null)
                        })
                        .collect(),
                );
            }
            if args.iter().any(|a| a.range.is_some()) {
                out.range = Some(args.iter().map(|a| a.range.clone()).collect());
            }
            if args.iter().any(|a| a.clip_mode.is_some()) {
                out.clip_mode = Some(args.iter().map(|a| a.clip_mode).collect());
            }
        }

        out
    }

    /// Rebuild a node from its wire shape; the inverse of [`serialize`].
    ///
    /// TYPE is parsed back into argument descriptors and the aligned
    /// `RANGE`/`CLIPMODE`/`VALUE` entries are attached where non-null.
    ///
    /// [`serialize`]: Node::serialize
    pub fn from_serialized(name: impl Into<String>, ser: &SerializedNode) -> Node {
        let mut node = Node::new(name);
        node.description = ser.description.clone();
        node.access = ser.access;
        node.tags = ser.tags.clone();
        node.critical = ser.critical;

        if let Some(tag) = &ser.type_tag {
            let mut args: Vec<Argument> =
                parse_type_tag(tag).into_iter().map(Argument::new).collect();
            for (i, arg) in args.iter_mut().enumerate() {
                if let Some(ranges) = &ser.range {
                    arg.range = ranges.get(i).cloned().flatten();
                }
                if let Some(clips) = &ser.clip_mode {
                    arg.clip_mode = clips.get(i).copied().flatten();
                }
                if let Some(values) = &ser.value {
                    if let Some(v) = values.get(i).filter(|v| !v.is_null()) {
                        arg.value = OscValue::from_json(&arg.osc_type, v);
                    }
                }
            }
            node.arguments = Some(args);
        }

        if let Some(contents) = &ser.contents {
            for (child_name, child_ser) in contents {
                node.children.insert(
                    child_name.clone(),
                    Node::from_serialized(child_name.clone(), child_ser),
                );
            }
        }

        node
    }

    /// Lazy pre-order walk over every descendant (including this node)
    /// that carries argument descriptors.
    pub fn methods(&self) -> Methods<'_> {
        Methods {
            stack: vec![("/".to_string(), self)],
        }
    }
}

/// Iterator returned by [`Node::methods`]; sibling order is unspecified.
pub struct Methods<'a> {
    stack: Vec<(String, &'a Node)>,
}

impl<'a> Iterator for Methods<'a> {
    type Item = (String, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            let base = if path == "/" { "" } else { path.as_str() };
            for (name, child) in &node.children {
                self.stack.push((format!("{}/{}", base, name), child));
            }
            if node.is_method() {
                return Some((path, node));
            }
        }
        None
    }
}
