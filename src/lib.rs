//! Widget toolkit runtime.
//!
//! # Conceptual overview
//! Brew is a dynamic class runtime for building widgets out of loosely typed configuration.
//!
//! ## Classes
//! A class is a set of default options plus a table of methods, optionally derived from a base
//! class. Defining a subclass merges its options into the base's: nested options records are
//! merged key by key, so a subclass can change one nested key and keep the rest. A method that
//! replaces a base method receives a [`Super`] handle on every call, through which it can run the
//! base implementation on the same instance with the same arguments.
//!
//! Classes live in a [`Registry`], which is also how string names in configuration are resolved.
//! Anything that accepts "something that becomes an instance" accepts a [`Manifest`]: an
//! instance, a class name, a factory, or a descriptor record with a `type` field.
//!
//! ## Construction
//! Instantiating a class runs three phases in order: `construct` copies the merged options (with
//! any constructor overrides applied) onto the instance as fields; `init` is for subclass setup;
//! `post_init` runs last on the finished instance, e.g. to render it right away. An error in any
//! phase aborts construction.
//!
//! ## Events and hooks
//! Every instance can publish events. Subscribing to another instance's events through
//! [`Instance::hook`] records the subscription on the *subscriber*, so it can drop all of its
//! subscriptions at once ([`Instance::unhook_all`]) without the publisher knowing about it.
//!
//! ## Elements
//! Elements are either unrendered or rendered. Rendering asks the element's skin for a [`Source`]
//! node; removing tears it down, detaches the element from its container and releases its
//! hooks. Containers own an ordered list of elements, with each element owned by at most one
//! container at a time.
//!
//! ## Threads
//! Everything is single-threaded: handles are reference-counted and not `Send`.

mod class;
mod container;
mod element;
mod error;
mod events;
mod instance;
mod manifest;
mod method;
mod rect;
mod registry;
mod source;
mod value;

pub use class::{is_instance, Class, ClassSpec, CONSTRUCT, INIT, POST_INIT};
pub use container::{CONTAINER, CONTAINER_SKIN, LAYOUT};
pub use element::{ELEMENT, SKIN};
pub use error::{Error, Result};
pub use events::Handler;
pub use instance::{Instance, ObjectId, WeakInstance};
pub use manifest::{Factory, Manifest};
pub use method::{Method, MethodFn, Super};
pub use rect::Rect;
pub use registry::{DuplicatePolicy, Registry, RegistryConfig, OBJECT};
pub use source::Source;
pub use value::{Options, Record, Value};

/// Method and event names used by the element and container classes.
pub mod names {
    pub use crate::container::{
        AFTER, APPEND, CLEAR, EMPTY, GET_VALUE, INSERT, OWN, PREPEND, SET_VALUE,
    };
    pub use crate::element::{
        ATTACH, GET_HTML, ON_RENDER, REMOVE, RENDER, RESIZE, SET_HIDDEN, SET_HTML, SET_SIZE,
    };
    pub use crate::manifest::TYPE;
}
