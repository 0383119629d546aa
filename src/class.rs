//! Class descriptors.
//!
//! A class is an immutable blueprint: merged default options plus a merged method table. Classes
//! are created by [`Registry::define`] (or [`Class::extend`]) and live as long as anything
//! references them.

use crate::error::Result;
use crate::instance::Instance;
use crate::method::{Method, Super};
use crate::registry::Registry;
use crate::value::{Options, Value};
use core::fmt;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Internal construction phase; materializes options onto the instance.
pub const CONSTRUCT: &str = "construct";
/// User extension phase, run after [`CONSTRUCT`].
pub const INIT: &str = "init";
/// Optional last phase, run on the fully initialized instance.
pub const POST_INIT: &str = "post_init";

/// Overrides for a new class: default options and methods.
#[derive(Debug, Default, Clone)]
pub struct ClassSpec {
    options: Options,
    methods: BTreeMap<String, Method>,
}

impl ClassSpec {
    pub fn new() -> ClassSpec {
        ClassSpec::default()
    }

    /// Adds one default option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> ClassSpec {
        self.options.insert(key, value);
        self
    }

    /// Adds all entries of `options` as default options.
    pub fn options(mut self, options: Options) -> ClassSpec {
        for (key, value) in options {
            self.options.insert(key, value);
        }
        self
    }

    /// Adds a method. If the base class has a method of the same name, it becomes reachable
    /// through [`Super`].
    pub fn method<F>(self, name: impl Into<String>, body: F) -> ClassSpec
    where
        F: Fn(&Instance, &[Value], &Super<'_>) -> Result<Value> + 'static,
    {
        self.method_value(name, Method::new(body))
    }

    pub fn method_value(mut self, name: impl Into<String>, method: Method) -> ClassSpec {
        self.methods.insert(name.into(), method);
        self
    }
}

struct ClassData {
    name: Option<String>,
    base: Option<Class>,
    options: Options,
    methods: BTreeMap<String, Method>,
}

/// A class descriptor. Cloning is cheap; identity is by reference.
#[derive(Clone)]
pub struct Class(Rc<ClassData>);

impl Class {
    /// Builds a class from a base and overrides. Does not register it.
    pub(crate) fn build(base: Option<&Class>, name: Option<&str>, spec: ClassSpec) -> Result<Class> {
        let (options, mut methods) = match base {
            Some(base) => (base.0.options.merged(&spec.options)?, base.0.methods.clone()),
            None => (spec.options, BTreeMap::new()),
        };

        for (method_name, method) in spec.methods {
            let method = match methods.get(&method_name) {
                Some(overridden) => method.overriding(overridden),
                None => method,
            };
            methods.insert(method_name, method);
        }

        debug!(
            class = name.unwrap_or("<anonymous>"),
            base = base.and_then(Class::name).unwrap_or("<none>"),
            "defined class"
        );

        Ok(Class(Rc::new(ClassData {
            name: name.map(str::to_string),
            base: base.cloned(),
            options,
            methods,
        })))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn base(&self) -> Option<&Class> {
        self.0.base.as_ref()
    }

    /// Merged default options.
    pub fn options(&self) -> &Options {
        &self.0.options
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.0.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.0.methods.keys().map(String::as_str)
    }

    pub fn ptr_eq(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether `other` is this class or one of its bases.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if c.ptr_eq(other) {
                return true;
            }
            class = c.base();
        }
        false
    }

    /// Defines a subclass in `registry`.
    pub fn extend(&self, registry: &Registry, name: Option<&str>, spec: ClassSpec) -> Result<Class> {
        registry.define(Some(self), name, spec)
    }

    /// Creates an instance.
    ///
    /// Runs [`CONSTRUCT`] (or the default materialization if no class in the chain defines it),
    /// then [`INIT`] and [`POST_INIT`] if they exist. The first error aborts construction.
    pub fn instantiate(&self, registry: &Registry, options: Option<Options>) -> Result<Instance> {
        let instance = Instance::allocate(self.clone(), registry.clone());
        let args = [Value::from(options)];

        match self.method(CONSTRUCT) {
            Some(construct) => {
                construct.invoke(&instance, &args)?;
            }
            None => instance.materialize(args[0].as_options())?,
        }
        if instance.responds_to(INIT) {
            instance.call(INIT, &args)?;
        }
        if instance.responds_to(POST_INIT) {
            instance.call(POST_INIT, &[])?;
        }

        Ok(instance)
    }
}

/// Whether `instance` is an instance of `class` or of one of its subclasses.
pub fn is_instance(instance: &Instance, class: &Class) -> bool {
    instance.class().is_subclass_of(class)
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name().unwrap_or("object"))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Class({:?})", name),
            None => write!(f, "Class(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::options;
    use std::cell::RefCell;

    #[test]
    fn subclass_options_merge() {
        let registry = Registry::new();
        let base = registry
            .define(None, Some("b"), ClassSpec::new().options(options! { "a" => 1, "b" => 2 }))
            .unwrap();
        let derived = registry
            .define(Some(&base), Some("d"), ClassSpec::new().option("b", 3))
            .unwrap();

        let instance = registry.instantiate(&derived, None).unwrap();
        assert_eq!(instance.options(), options! { "a" => 1, "b" => 3 });
        assert_eq!(instance.get("a"), Value::Int(1));
        assert_eq!(base.options(), &options! { "a" => 1, "b" => 2 });
    }

    #[test]
    fn nested_override_keeps_inherited_siblings() {
        let registry = Registry::new();
        let base = registry
            .define(
                None,
                None,
                ClassSpec::new().option("style", options! { "color" => "red", "size" => 12 }),
            )
            .unwrap();
        let derived = base
            .extend(&registry, None, ClassSpec::new().option("style", options! { "size" => 14 }))
            .unwrap();

        let style = derived.options().get("style").and_then(Value::as_options).unwrap().clone();
        assert_eq!(style, options! { "color" => "red", "size" => 14 });
    }

    #[test]
    fn definition_rejects_conflicting_option_types() {
        let registry = Registry::new();
        let base = registry
            .define(None, None, ClassSpec::new().option("style", options! { "a" => 1 }))
            .unwrap();
        let err = base
            .extend(&registry, Some("bad"), ClassSpec::new().option("style", "bold"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(registry.lookup("bad").is_none());
    }

    #[test]
    fn construction_phases_run_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = Registry::new();
        let (l1, l2, l3) = (Rc::clone(&log), Rc::clone(&log), Rc::clone(&log));
        let class = registry
            .object()
            .extend(
                &registry,
                Some("phased"),
                ClassSpec::new()
                    .option("greeting", "hi")
                    .method(CONSTRUCT, move |_, _, sup| {
                        l1.borrow_mut().push("construct".to_string());
                        sup.call()
                    })
                    .method(INIT, move |this, _, _| {
                        // fields from the internal phase already exist
                        l2.borrow_mut().push(format!("init:{}", this.get("greeting").as_str().unwrap_or("")));
                        Ok(Value::Null)
                    })
                    .method(POST_INIT, move |_, _, _| {
                        l3.borrow_mut().push("post_init".to_string());
                        Ok(Value::Null)
                    }),
            )
            .unwrap();

        registry.instantiate(&class, Some(options! { "greeting" => "hello" })).unwrap();
        assert_eq!(*log.borrow(), vec!["construct", "init:hello", "post_init"]);
    }

    #[test]
    fn init_error_aborts_construction() {
        let ran_post_init = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&ran_post_init);
        let registry = Registry::new();
        let class = registry
            .object()
            .extend(
                &registry,
                None,
                ClassSpec::new()
                    .method(INIT, |_, _, _| Err(Error::handler("no")))
                    .method(POST_INIT, move |_, _, _| {
                        *flag.borrow_mut() = true;
                        Ok(Value::Null)
                    }),
            )
            .unwrap();

        assert!(matches!(registry.instantiate(&class, None), Err(Error::Handler(_))));
        assert!(!*ran_post_init.borrow());
    }

    #[test]
    fn constructor_option_type_conflict_aborts() {
        let registry = Registry::new();
        let class = registry
            .object()
            .extend(&registry, None, ClassSpec::new().option("style", options! { "a" => 1 }))
            .unwrap();
        let result = registry.instantiate(&class, Some(options! { "style" => 3 }));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn identity_walks_the_class_chain() {
        let registry = Registry::new();
        let a = registry.define(None, Some("a"), ClassSpec::new()).unwrap();
        let b = a.extend(&registry, Some("b"), ClassSpec::new()).unwrap();
        let c = b.extend(&registry, Some("c"), ClassSpec::new()).unwrap();
        // same shape, different identity
        let other = registry.define(None, Some("a2"), ClassSpec::new()).unwrap();

        let instance = registry.instantiate(&c, None).unwrap();
        assert!(is_instance(&instance, &a));
        assert!(is_instance(&instance, &b));
        assert!(is_instance(&instance, &c));
        assert!(!is_instance(&instance, &other));

        let instance = registry.instantiate(&a, None).unwrap();
        assert!(!is_instance(&instance, &b));
    }

    #[test]
    fn overridden_method_reaches_base() {
        let registry = Registry::new();
        let base = registry
            .define(
                None,
                None,
                ClassSpec::new().method("describe", |this, _, _| {
                    Ok(Value::from(format!("base of {}", this.get("n").as_int().unwrap_or(0))))
                }),
            )
            .unwrap();
        let derived = base
            .extend(
                &registry,
                None,
                ClassSpec::new().option("n", 7).method("describe", |_, _, sup| {
                    let inner = sup.call()?;
                    Ok(Value::from(format!("derived({})", inner.as_str().unwrap_or(""))))
                }),
            )
            .unwrap();

        let instance = registry.instantiate(&derived, None).unwrap();
        assert_eq!(instance.call("describe", &[]).unwrap(), Value::from("derived(base of 7)"));
    }

    #[test]
    fn display_uses_class_name() {
        let registry = Registry::new();
        let named = registry.define(None, Some("t-thing"), ClassSpec::new()).unwrap();
        let anonymous = registry.define(None, None, ClassSpec::new()).unwrap();
        assert_eq!(named.to_string(), "t-thing");
        assert_eq!(anonymous.to_string(), "object");
    }
}
