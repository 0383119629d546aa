//! Render output.
//!
//! Skins render elements into [`Source`] nodes: a small retained tree standing in for whatever a
//! backend would display. Each node knows its children and (weakly) its parent; attaching a node
//! somewhere detaches it from wherever it was before.

use crate::rect::Rect;
use cgmath::Vector2;
use core::fmt;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

struct Node {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    html: String,
    hidden: bool,
    bounds: Rect,
    children: Vec<Source>,
    parent: Weak<RefCell<Node>>,
}

/// A render output node. Cloning is cheap; identity is by reference.
#[derive(Clone)]
pub struct Source(Rc<RefCell<Node>>);

impl Source {
    pub fn new(tag: &str) -> Source {
        Source(Rc::new(RefCell::new(Node {
            tag: tag.to_string(),
            id: None,
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            html: String::new(),
            hidden: false,
            bounds: Rect::zero(),
            children: Vec::new(),
            parent: Weak::new(),
        })))
    }

    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.0.borrow().id.clone()
    }

    pub fn set_id(&self, id: &str) {
        self.0.borrow_mut().id = Some(id.to_string());
    }

    /// Adds whitespace-separated class names, skipping ones already present.
    pub fn add_class(&self, classes: &str) {
        let mut node = self.0.borrow_mut();
        for class in classes.split_whitespace() {
            if !node.classes.iter().any(|c| c == class) {
                node.classes.push(class.to_string());
            }
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.borrow().classes.iter().any(|c| c == class)
    }

    pub fn classes(&self) -> Vec<String> {
        self.0.borrow().classes.clone()
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.0.borrow().attrs.get(name).cloned()
    }

    pub fn set_attr(&self, name: &str, value: &str) {
        self.0.borrow_mut().attrs.insert(name.to_string(), value.to_string());
    }

    pub fn html(&self) -> String {
        self.0.borrow().html.clone()
    }

    pub fn set_html(&self, html: &str) {
        self.0.borrow_mut().html = html.to_string();
    }

    pub fn is_hidden(&self) -> bool {
        self.0.borrow().hidden
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.0.borrow_mut().hidden = hidden;
    }

    pub fn bounds(&self) -> Rect {
        self.0.borrow().bounds
    }

    pub fn set_bounds(&self, bounds: Rect) {
        self.0.borrow_mut().bounds = bounds;
    }

    pub fn size(&self) -> Vector2<f64> {
        self.0.borrow().bounds.size
    }

    /// Sets the given dimensions, leaving unset ones unchanged.
    pub fn set_size(&self, width: Option<f64>, height: Option<f64>) {
        let mut node = self.0.borrow_mut();
        node.bounds = node.bounds.with_dimensions(width, height);
    }

    pub fn parent(&self) -> Option<Source> {
        self.0.borrow().parent.upgrade().map(Source)
    }

    pub fn children(&self) -> Vec<Source> {
        self.0.borrow().children.clone()
    }

    pub fn index_of(&self, child: &Source) -> Option<usize> {
        self.0.borrow().children.iter().position(|c| c.ptr_eq(child))
    }

    /// Appends a child, detaching it from its current parent.
    pub fn append(&self, child: &Source) {
        self.insert(None, child);
    }

    /// Inserts a child at the front, detaching it from its current parent.
    pub fn prepend(&self, child: &Source) {
        self.insert(Some(0), child);
    }

    /// Inserts a child right after `pivot`, or at the end if `pivot` is not a child.
    pub fn insert_after(&self, pivot: &Source, child: &Source) {
        if pivot.ptr_eq(child) {
            return;
        }
        child.detach();
        let position = self.index_of(pivot).map(|i| i + 1);
        self.insert(position, child);
    }

    fn insert(&self, position: Option<usize>, child: &Source) {
        child.detach();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        let mut node = self.0.borrow_mut();
        let position = position.unwrap_or(node.children.len()).min(node.children.len());
        node.children.insert(position, child.clone());
    }

    /// Removes this node from its parent, if any.
    pub fn detach(&self) {
        let parent = self.parent();
        self.0.borrow_mut().parent = Weak::new();
        if let Some(parent) = parent {
            parent.0.borrow_mut().children.retain(|c| !c.ptr_eq(self));
        }
    }

    pub fn ptr_eq(&self, other: &Source) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let node = self.0.borrow();
        f.debug_struct("Source")
            .field("tag", &node.tag)
            .field("id", &node.id)
            .field("classes", &node.classes)
            .field("hidden", &node.hidden)
            .field("children", &node.children)
            .finish()
    }
}
