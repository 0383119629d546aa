//! Containers: elements that own an ordered list of child elements.
//!
//! Ownership is exclusive. Adding an element that already has a parent removes it from that
//! parent first. After every structural change each child's [`index`](Instance::index) is its
//! position in the list.

use crate::class::{ClassSpec, CONSTRUCT};
use crate::element::{arg, ELEMENT, REMOVE, RENDER, RESIZE, SKIN};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::registry::Registry;
use crate::source::Source;
use crate::value::{Record, Value};
use tracing::debug;

pub const CONTAINER: &str = "t-container";
pub const CONTAINER_SKIN: &str = "t-container-skin";
pub const LAYOUT: &str = "t-layout";

pub const OWN: &str = "own";
pub const APPEND: &str = "append";
pub const INSERT: &str = "insert";
pub const PREPEND: &str = "prepend";
pub const EMPTY: &str = "empty";
pub const CLEAR: &str = "clear";
pub const GET_VALUE: &str = "get_value";
pub const SET_VALUE: &str = "set_value";
/// Container skin: places a child output after a sibling's output.
pub const AFTER: &str = "after";

fn container_spec() -> ClassSpec {
    ClassSpec::new()
        .option("items", Value::Null)
        .option("skin", CONTAINER_SKIN)
        .option("layout", LAYOUT)
        .method(CONSTRUCT, |this, args, sup| {
            sup.call_with(args)?;
            // the owned list is the only record of the children
            let items = this.get("items");
            this.set("items", Vec::<Value>::new());
            if let Value::List(items) = items {
                for item in items {
                    this.call(APPEND, &[item])?;
                }
            }
            Ok(Value::Null)
        })
        .method(OWN, |this, args, _| {
            let item = this.registry().manifest_value(&arg(args, 0))?;
            let mut ancestor = Some(this.clone());
            while let Some(current) = ancestor {
                if current.ptr_eq(&item) {
                    return Err(Error::invalid(format!("{} cannot own itself or an ancestor", this)));
                }
                ancestor = current.parent();
            }
            if let Some(parent) = item.parent() {
                parent.call(REMOVE, &[(&item).into()])?;
            }
            item.set_parent(Some(this));
            Ok(item.into())
        })
        .method(APPEND, |this, args, _| {
            let item = owned(this, &arg(args, 0))?;
            this.data_mut().items.push(item.clone());
            reindex(this);

            if this.is_rendered() {
                let output = item.render(None)?;
                call_skin(this, APPEND, &[output.into()])?;
                this.resize()?;
            }
            Ok(item.into())
        })
        .method(INSERT, |this, args, _| {
            let position = match arg(args, 0) {
                Value::Int(position) if position >= 0 => position as usize,
                other => {
                    return Err(Error::invalid(format!(
                        "insert position must be a non-negative integer, got {:?}",
                        other
                    )));
                }
            };
            if position >= this.len() {
                return this.call(APPEND, &[arg(args, 1)]);
            }

            let item = owned(this, &arg(args, 1))?;
            // owning may have shortened the list
            let position = position.min(this.len());
            this.data_mut().items.insert(position, item.clone());
            reindex(this);

            if this.is_rendered() {
                let output = item.render(None)?;
                // unrendered siblings have no output to place after
                let previous = this.items()[..position]
                    .iter()
                    .rev()
                    .find_map(Instance::source);
                match previous {
                    Some(previous) => call_skin(this, AFTER, &[previous.into(), output.into()])?,
                    None => call_skin(this, PREPEND, &[output.into()])?,
                };
                this.resize()?;
            }
            Ok(item.into())
        })
        .method(PREPEND, |this, args, _| this.call(INSERT, &[Value::Int(0), arg(args, 0)]))
        .method(REMOVE, |this, args, sup| {
            let item = match arg(args, 0) {
                Value::Null => return sup.call_with(&[]),
                Value::Instance(item) => item,
                other => {
                    return Err(Error::invalid(format!("can only remove instances, got {}", other.kind())));
                }
            };

            let position = this.items().iter().position(|i| i.ptr_eq(&item));
            let position = match position {
                Some(position) => position,
                None => return Ok(Value::Null),
            };
            this.data_mut().items.remove(position);
            reindex(this);

            {
                let mut data = item.data_mut();
                data.parent = None;
                data.index = None;
                data.detached_from = Some(this.downgrade());
            }
            debug!(container = %this, item = %item, position, "removed child");
            item.remove()?;
            Ok(Value::Null)
        })
        .method(EMPTY, |this, _, _| {
            loop {
                let last = this.data().items.last().cloned();
                match last {
                    Some(item) => this.remove_item(&item)?,
                    None => break,
                }
            }
            Ok(Value::Null)
        })
        .method(CLEAR, |this, _, _| this.call(EMPTY, &[]))
        .method(RESIZE, |this, _, sup| {
            sup.call()?;
            if this.is_rendered() {
                for item in this.items() {
                    item.resize()?;
                }
            }
            Ok(Value::Null)
        })
        .method(GET_VALUE, |this, _, _| {
            let mut values = Record::new();
            for item in this.items() {
                let name = match item.get("name") {
                    Value::Str(name) => name,
                    _ => continue,
                };
                if item.responds_to(GET_VALUE) {
                    values.insert(name, item.call(GET_VALUE, &[])?);
                }
            }
            Ok(values.into())
        })
        .method(SET_VALUE, |this, args, _| {
            let values = match arg(args, 0) {
                Value::Null => return Ok(Value::Null),
                Value::Record(record) => record,
                Value::Options(options) => options.into_record(),
                other => {
                    return Err(Error::invalid(format!("value must be a record, got {}", other.kind())));
                }
            };
            for item in this.items() {
                let value = match item.get("name").as_str().and_then(|name| values.get(name)) {
                    Some(value) => value.clone(),
                    None => continue,
                };
                if item.responds_to(SET_VALUE) {
                    item.call(SET_VALUE, &[value])?;
                }
            }
            Ok(Value::Null)
        })
}

fn owned(container: &Instance, item: &Value) -> Result<Instance> {
    let item = container.call(OWN, &[item.clone()])?;
    Ok(item.expect_instance("owned item")?.clone())
}

fn reindex(container: &Instance) {
    for (index, item) in container.items().iter().enumerate() {
        item.data_mut().index = Some(index);
    }
}

fn call_skin(container: &Instance, method: &str, args: &[Value]) -> Result<Value> {
    match container.skin() {
        Some(skin) => skin.call(method, args),
        None => Ok(Value::Null),
    }
}

fn skin_output(skin: &Instance) -> Result<Source> {
    skin.get("output")
        .as_source()
        .cloned()
        .ok_or_else(|| Error::InvariantViolation(format!("{} has not rendered", skin)))
}

fn container_skin_spec() -> ClassSpec {
    ClassSpec::new()
        .method(RENDER, |this, args, sup| {
            let output = sup.call_with(args)?;
            let source = output.expect_source("container output")?;
            let container = this
                .host()
                .ok_or_else(|| Error::InvariantViolation(format!("{} is not attached", this)))?;
            for item in container.items() {
                source.append(&item.render(None)?);
            }

            let layout = container.get("layout");
            if !layout.is_null() {
                let layout = container.registry().manifest_value(&layout)?;
                layout.set_host(&container);
                container.set("layout", layout);
            }
            Ok(output)
        })
        .method(APPEND, |this, args, _| {
            skin_output(this)?.append(arg(args, 0).expect_source("child output")?);
            Ok(Value::Null)
        })
        .method(PREPEND, |this, args, _| {
            skin_output(this)?.prepend(arg(args, 0).expect_source("child output")?);
            Ok(Value::Null)
        })
        .method(AFTER, |this, args, _| {
            let (previous, output) = (arg(args, 0), arg(args, 1));
            skin_output(this)?.insert_after(
                previous.expect_source("sibling output")?,
                output.expect_source("child output")?,
            );
            Ok(Value::Null)
        })
        .method(RESIZE, |this, _, _| {
            let container = match this.host() {
                Some(container) => container,
                None => return Ok(Value::Null),
            };
            match container.get("layout") {
                Value::Instance(layout) => layout.call(RESIZE, &[container.into()]),
                _ => Ok(Value::Null),
            }
        })
}

fn layout_spec() -> ClassSpec {
    ClassSpec::new().method(RESIZE, |_, _, _| Ok(Value::Null))
}

pub(crate) fn register(registry: &Registry) -> Result<()> {
    let element = registry.get(ELEMENT)?;
    let skin = registry.get(SKIN)?;
    registry.define(Some(&element), Some(CONTAINER), container_spec())?;
    registry.define(Some(&skin), Some(CONTAINER_SKIN), container_skin_spec())?;
    registry.define(Some(&registry.object()), Some(LAYOUT), layout_spec())?;
    Ok(())
}

impl Instance {
    /// Takes ownership of an instance-like value, detaching it from its previous parent.
    pub fn own(&self, item: impl Into<Value>) -> Result<Instance> {
        owned(self, &item.into())
    }

    /// Appends an instance-like value, returning the resolved child.
    pub fn append(&self, item: impl Into<Value>) -> Result<Instance> {
        let item = self.call(APPEND, &[item.into()])?;
        Ok(item.expect_instance("appended item")?.clone())
    }

    /// Inserts at `position`; positions past the end append.
    pub fn insert(&self, position: i64, item: impl Into<Value>) -> Result<Instance> {
        let item = self.call(INSERT, &[position.into(), item.into()])?;
        Ok(item.expect_instance("inserted item")?.clone())
    }

    pub fn prepend(&self, item: impl Into<Value>) -> Result<Instance> {
        let item = self.call(PREPEND, &[item.into()])?;
        Ok(item.expect_instance("prepended item")?.clone())
    }

    /// Removes a child. Does nothing if `item` is not a child.
    pub fn remove_item(&self, item: &Instance) -> Result<()> {
        self.call(REMOVE, &[item.into()])?;
        Ok(())
    }

    /// Removes children from the back until none are left.
    pub fn empty(&self) -> Result<()> {
        self.call(EMPTY, &[])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.call(CLEAR, &[])?;
        Ok(())
    }

    pub fn each<F: FnMut(usize, &Instance)>(&self, mut f: F) {
        for (index, item) in self.items().iter().enumerate() {
            f(index, item);
        }
    }

    /// A snapshot of the children.
    pub fn items(&self) -> Vec<Instance> {
        self.data().items.clone()
    }

    pub fn len(&self) -> usize {
        self.data().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().items.is_empty()
    }

    /// Position in the parent container.
    pub fn index(&self) -> Option<usize> {
        self.data().index
    }

    /// Child values keyed by child name.
    pub fn get_value(&self) -> Result<Value> {
        self.call(GET_VALUE, &[])
    }

    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.call(SET_VALUE, &[value.into()])?;
        Ok(())
    }
}
