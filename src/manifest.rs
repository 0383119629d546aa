//! Resolution of instance-like values.
//!
//! Wherever the toolkit accepts "something that becomes an instance" (a skin, a layout, a
//! container item, a behavior), it accepts a [`Manifest`]: an existing instance, a registered
//! class name, a factory, or a descriptor record naming its class in a `type` field.

use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::registry::Registry;
use crate::value::{Options, Record, Value};
use core::fmt;
use std::rc::Rc;
use tracing::trace;

/// The descriptor field naming the class.
pub const TYPE: &str = "type";

/// A zero-argument instance factory.
#[derive(Clone)]
pub struct Factory(Rc<dyn Fn() -> Result<Instance>>);

impl Factory {
    pub fn new<F: 'static + Fn() -> Result<Instance>>(factory: F) -> Factory {
        Factory(Rc::new(factory))
    }

    pub fn create(&self) -> Result<Instance> {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &Factory) -> bool {
        Rc::as_ptr(&self.0) as *const () == Rc::as_ptr(&other.0) as *const ()
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Factory({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Something that resolves to an instance.
#[derive(Debug, Clone)]
pub enum Manifest {
    /// Used as is.
    Instance(Instance),
    /// A registered class, instantiated without options.
    Name(String),
    /// Invoked.
    Factory(Factory),
    /// A record whose `type` names a registered class; the rest are constructor options.
    Descriptor(Record),
}

impl Manifest {
    /// Resolves to an instance using `registry` for class names.
    pub fn resolve(self, registry: &Registry) -> Result<Instance> {
        match self {
            Manifest::Instance(instance) => Ok(instance),
            Manifest::Name(name) => {
                trace!(class = %name, "manifest by name");
                let class = registry.get(&name)?;
                registry.instantiate(&class, None)
            }
            Manifest::Factory(factory) => factory.create(),
            Manifest::Descriptor(mut record) => {
                let name = match record.remove(TYPE) {
                    Some(Value::Str(name)) => name,
                    Some(other) => {
                        return Err(Error::invalid(format!(
                            "descriptor `{}` must be a string, got {}",
                            TYPE,
                            other.kind()
                        )));
                    }
                    None => return Err(Error::invalid(format!("descriptor has no `{}`", TYPE))),
                };
                trace!(class = %name, "manifest by descriptor");
                let class = registry.get(&name)?;
                registry.instantiate(&class, Some(Options::from(record)))
            }
        }
    }
}

impl TryFrom<Value> for Manifest {
    type Error = Error;

    fn try_from(value: Value) -> Result<Manifest> {
        match value {
            Value::Instance(instance) => Ok(Manifest::Instance(instance)),
            Value::Str(name) => Ok(Manifest::Name(name)),
            Value::Factory(factory) => Ok(Manifest::Factory(factory)),
            Value::Record(record) => Ok(Manifest::Descriptor(record)),
            Value::Options(options) => Ok(Manifest::Descriptor(options.into_record())),
            other => Err(Error::invalid(format!("cannot make an instance from {}", other.kind()))),
        }
    }
}

impl From<Instance> for Manifest {
    fn from(instance: Instance) -> Manifest {
        Manifest::Instance(instance)
    }
}

impl From<&Instance> for Manifest {
    fn from(instance: &Instance) -> Manifest {
        Manifest::Instance(instance.clone())
    }
}

impl From<&str> for Manifest {
    fn from(name: &str) -> Manifest {
        Manifest::Name(name.to_string())
    }
}

impl From<String> for Manifest {
    fn from(name: String) -> Manifest {
        Manifest::Name(name)
    }
}

impl From<Factory> for Manifest {
    fn from(factory: Factory) -> Manifest {
        Manifest::Factory(factory)
    }
}

impl From<Record> for Manifest {
    fn from(record: Record) -> Manifest {
        Manifest::Descriptor(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{is_instance, ClassSpec};
    use crate::options;

    fn registry_with_button() -> Registry {
        let registry = Registry::new();
        registry
            .object()
            .extend(
                &registry,
                Some("t-button"),
                ClassSpec::new().options(options! { "label" => "", "size" => 1 }),
            )
            .unwrap();
        registry
    }

    #[test]
    fn instances_pass_through() {
        let registry = registry_with_button();
        let button = registry.manifest("t-button").unwrap();
        let same = registry.manifest(&button).unwrap();
        assert!(same.ptr_eq(&button));
    }

    #[test]
    fn names_instantiate_with_defaults() {
        let registry = registry_with_button();
        let button = registry.manifest("t-button").unwrap();
        assert!(is_instance(&button, &registry.get("t-button").unwrap()));
        assert_eq!(button.get("size"), Value::Int(1));

        assert!(matches!(registry.manifest("t-missing"), Err(Error::Lookup(_))));
    }

    #[test]
    fn descriptors_pass_their_fields_as_options() {
        let registry = registry_with_button();
        let descriptor = options! { "type" => "t-button", "label" => "OK" }.into_record();
        let button = registry.manifest(descriptor).unwrap();
        assert!(is_instance(&button, &registry.get("t-button").unwrap()));
        assert_eq!(button.get("label"), Value::from("OK"));
        assert!(!button.has("type"));
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        let registry = registry_with_button();
        let untyped = options! { "label" => "OK" }.into_record();
        assert!(matches!(registry.manifest(untyped), Err(Error::InvalidArgument(_))));

        let numeric = options! { "type" => 3 }.into_record();
        assert!(matches!(registry.manifest(numeric), Err(Error::InvalidArgument(_))));

        let unknown = options! { "type" => "t-ghost" }.into_record();
        assert!(matches!(registry.manifest(unknown), Err(Error::Lookup(_))));
    }

    #[test]
    fn factories_are_invoked() {
        let registry = registry_with_button();
        let r = registry.clone();
        let factory = Factory::new(move || {
            let class = r.get("t-button")?;
            r.instantiate(&class, Some(options! { "label" => "made" }))
        });
        let button = registry.manifest(factory).unwrap();
        assert_eq!(button.get("label"), Value::from("made"));
    }

    #[test]
    fn other_values_are_not_instance_like() {
        let registry = registry_with_button();
        assert!(matches!(registry.manifest_value(&Value::Int(42)), Err(Error::InvalidArgument(_))));
        assert!(matches!(registry.manifest_value(&Value::Null), Err(Error::InvalidArgument(_))));
        let button = registry.manifest_value(&Value::from("t-button")).unwrap();
        assert_eq!(button.class().name(), Some("t-button"));
    }

    #[test]
    fn json_descriptors_resolve() {
        let registry = registry_with_button();
        let options = Options::from_json(r#"{"ok": {"type": "t-button", "label": "Go", "size": 3}}"#)
            .unwrap();
        let button = registry.manifest_value(options.get("ok").unwrap()).unwrap();
        assert_eq!(button.get("label"), Value::from("Go"));
        assert_eq!(button.get("size"), Value::Int(3));
    }
}
