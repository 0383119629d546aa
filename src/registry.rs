//! The class registry.

use crate::class::{Class, ClassSpec, CONSTRUCT, INIT};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::manifest::Manifest;
use crate::value::{Options, Value};
use crate::{container, element};
use core::fmt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Name of the root class.
pub const OBJECT: &str = "t-object";

/// What happens when a class name is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The new class replaces the old one; a warning is logged.
    #[default]
    Replace,
    /// Registration fails with [`Error::DuplicateClass`].
    Reject,
}

/// Registry configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryConfig {
    pub duplicates: DuplicatePolicy,
}

struct RegistryData {
    classes: HashMap<String, Class>,
    config: RegistryConfig,
    root: Class,
}

/// Name → class table. Cloning is cheap and yields a handle to the same registry.
///
/// A new registry already contains the core classes: `t-object`, `t-element`, `t-skin`,
/// `t-container`, `t-container-skin` and `t-layout`. Entries are never removed.
#[derive(Clone)]
pub struct Registry(Rc<RefCell<RegistryData>>);

impl Registry {
    pub fn new() -> Registry {
        Registry::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Registry {
        let root = object_class();
        let mut classes = HashMap::new();
        classes.insert(OBJECT.to_string(), root.clone());
        let registry = Registry(Rc::new(RefCell::new(RegistryData {
            classes,
            config,
            root,
        })));

        // the core classes have no conflicting options and their names are fresh
        element::register(&registry).expect("failed to define element classes");
        container::register(&registry).expect("failed to define container classes");
        registry
    }

    pub fn config(&self) -> RegistryConfig {
        self.0.borrow().config
    }

    /// The root class, `t-object`.
    pub fn object(&self) -> Class {
        self.0.borrow().root.clone()
    }

    /// Registers `class` under `name`.
    pub fn register(&self, name: &str, class: Class) -> Result<()> {
        let mut data = self.0.borrow_mut();
        if data.classes.contains_key(name) {
            match data.config.duplicates {
                DuplicatePolicy::Replace => warn!(class = name, "replacing registered class"),
                DuplicatePolicy::Reject => return Err(Error::DuplicateClass(name.to_string())),
            }
        }
        debug!(class = name, "registered class");
        data.classes.insert(name.to_string(), class);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Class> {
        self.0.borrow().classes.get(name).cloned()
    }

    /// Like [`lookup`](Registry::lookup), but fails with [`Error::Lookup`].
    pub fn get(&self, name: &str) -> Result<Class> {
        self.lookup(name).ok_or_else(|| Error::Lookup(name.to_string()))
    }

    /// Names of all registered classes, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.0.borrow().classes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Defines a class from `base` (or as a new root) and `spec`, registering it if named.
    ///
    /// Fails if `spec` replaces a nested options record of the base with a scalar, or if the name
    /// is taken and duplicates are rejected. Nothing is registered in either case.
    pub fn define(&self, base: Option<&Class>, name: Option<&str>, spec: ClassSpec) -> Result<Class> {
        let class = Class::build(base, name, spec)?;
        if let Some(name) = name {
            self.register(name, class.clone())?;
        }
        Ok(class)
    }

    /// Creates an instance of `class`. See [`Class::instantiate`].
    pub fn instantiate(&self, class: &Class, options: Option<Options>) -> Result<Instance> {
        class.instantiate(self, options)
    }

    /// Resolves anything instance-like to an instance.
    pub fn manifest(&self, manifest: impl Into<Manifest>) -> Result<Instance> {
        manifest.into().resolve(self)
    }

    /// Resolves a dynamic value to an instance. Values that are not instance-like fail with
    /// [`Error::InvalidArgument`].
    pub fn manifest_value(&self, value: &Value) -> Result<Instance> {
        Manifest::try_from(value.clone())?.resolve(self)
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.class_names())
            .finish()
    }
}

fn object_class() -> Class {
    let spec = ClassSpec::new()
        .method(CONSTRUCT, |this, args, _| {
            this.materialize(args.first().and_then(Value::as_options))?;
            Ok(Value::Null)
        })
        .method(INIT, |_, _, _| Ok(Value::Null));
    // a root with no options cannot fail to merge
    Class::build(None, Some(OBJECT), spec).expect("failed to define root class")
}
