//! Instances.

use crate::class::Class;
use crate::error::{Error, Result};
use crate::events::{EventTable, Hook};
use crate::registry::Registry;
use crate::value::{Options, Record, Value};
use core::fmt;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// A unique identifier for an instance.
///
/// (this is just a UUID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u32, u16, u16, [u8; 8]);

impl ObjectId {
    pub(crate) fn new() -> ObjectId {
        let uuid = Uuid::new_v4();
        let (a, b, c, d) = uuid.as_fields();
        ObjectId(a, b, c, *d)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x}-{:04x}-{:04x}-", self.0, self.1, self.2)?;
        for byte in &self.3 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

pub(crate) struct InstanceData {
    pub(crate) id: ObjectId,
    pub(crate) class: Class,
    pub(crate) registry: Registry,
    /// The materialized options record.
    pub(crate) options: Options,
    /// Direct fields; seeded from `options`.
    pub(crate) fields: Record,
    pub(crate) events: EventTable,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) rendered: bool,
    pub(crate) parent: Option<WeakInstance>,
    /// The container this instance was last removed from, until its `remove` event fires.
    pub(crate) detached_from: Option<WeakInstance>,
    /// The element a skin or behavior is attached to.
    pub(crate) host: Option<WeakInstance>,
    pub(crate) items: Vec<Instance>,
    pub(crate) index: Option<usize>,
}

/// A handle to an instance. Cloning is cheap; identity is by reference.
#[derive(Clone)]
pub struct Instance(Rc<RefCell<InstanceData>>);

/// A non-owning reference to an instance.
#[derive(Clone)]
pub struct WeakInstance(Weak<RefCell<InstanceData>>);

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.0.upgrade().map(Instance)
    }

    /// Whether this refers to `instance`. Works even after the referent is gone.
    pub fn refers_to(&self, instance: &Instance) -> bool {
        Weak::as_ptr(&self.0) == Rc::as_ptr(&instance.0)
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.upgrade() {
            Some(instance) => write!(f, "Weak({:?})", instance),
            None => write!(f, "Weak(<dropped>)"),
        }
    }
}

impl Instance {
    /// Creates a bare instance with no fields. Construction phases are run by
    /// [`Class::instantiate`].
    pub(crate) fn allocate(class: Class, registry: Registry) -> Instance {
        Instance(Rc::new(RefCell::new(InstanceData {
            id: ObjectId::new(),
            class,
            registry,
            options: Options::new(),
            fields: Record::new(),
            events: EventTable::default(),
            hooks: Vec::new(),
            rendered: false,
            parent: None,
            detached_from: None,
            host: None,
            items: Vec::new(),
            index: None,
        })))
    }

    pub(crate) fn data(&self) -> Ref<'_, InstanceData> {
        self.0.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, InstanceData> {
        self.0.borrow_mut()
    }

    /// Materializes the class defaults merged with `overrides` onto this instance.
    ///
    /// This is the default internal construction phase. A method given in `overrides` for a name
    /// the class defines as a method overrides that method.
    pub fn materialize(&self, overrides: Option<&Options>) -> Result<()> {
        let class = self.class();
        let mut options = class.options().clone();
        if let Some(overrides) = overrides {
            let overrides: Options = overrides
                .iter()
                .map(|(key, value)| {
                    let value = match (value, class.method(key)) {
                        (Value::Method(method), Some(base)) if !options.contains_key(key) => {
                            Value::Method(method.overriding(base))
                        }
                        _ => value.clone(),
                    };
                    (key.clone(), value)
                })
                .collect();
            options.merge(&overrides)?;
        }

        let mut data = self.data_mut();
        data.fields = options.clone().into_record();
        data.options = options;
        Ok(())
    }

    pub fn id(&self) -> ObjectId {
        self.data().id
    }

    pub fn class(&self) -> Class {
        self.data().class.clone()
    }

    /// The registry this instance was created from; used to resolve skins, behaviors and items.
    pub fn registry(&self) -> Registry {
        self.data().registry.clone()
    }

    /// The options record materialized at construction.
    pub fn options(&self) -> Options {
        self.data().options.clone()
    }

    /// Returns a field, or null if it is not set.
    pub fn get(&self, key: &str) -> Value {
        self.data().fields.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data().fields.contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.data_mut().fields.insert(key.into(), value.into());
    }

    /// Whether a method of this name can be called on the instance.
    pub fn responds_to(&self, name: &str) -> bool {
        let data = self.data();
        matches!(data.fields.get(name), Some(Value::Method(_))) || data.class.method(name).is_some()
    }

    /// Calls a method. Methods stored in fields take precedence over class methods.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method = {
            let data = self.data();
            match data.fields.get(name) {
                Some(Value::Method(method)) => Some(method.clone()),
                _ => data.class.method(name).cloned(),
            }
        };
        match method {
            Some(method) => method.invoke(self, args),
            None => Err(Error::NoSuchMethod {
                class: self.class().to_string(),
                method: name.to_string(),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The owning container, if any.
    pub fn parent(&self) -> Option<Instance> {
        self.data().parent.as_ref().and_then(WeakInstance::upgrade)
    }

    pub(crate) fn set_parent(&self, parent: Option<&Instance>) {
        self.data_mut().parent = parent.map(Instance::downgrade);
    }

    /// The element this skin or behavior is attached to.
    pub fn host(&self) -> Option<Instance> {
        self.data().host.as_ref().and_then(WeakInstance::upgrade)
    }

    /// Records the element this skin or behavior is attached to. Held weakly.
    pub fn set_host(&self, host: &Instance) {
        self.data_mut().host = Some(host.downgrade());
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.data().class)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => write!(f, "Instance({}, {})", data.class, data.id),
            Err(_) => write!(f, "Instance(<borrowed>)"),
        }
    }
}
