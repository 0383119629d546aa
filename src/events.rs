//! Events.
//!
//! Every instance carries its own event table. `bind`/`unbind`/`trigger` act on that table
//! directly; `hook` subscribes to *another* instance's table while recording the subscription on
//! the subscriber, so the subscriber can later drop all of its subscriptions without the
//! publisher's help.

use crate::error::Result;
use crate::instance::{Instance, WeakInstance};
use crate::value::Value;
use core::fmt;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

/// An event handler, called with the context instance and the arguments.
///
/// Handlers are compared by reference: keep a clone around to `unbind` it later.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Instance, &[Value]) -> Result<()>>);

impl Handler {
    pub fn new<F: 'static + Fn(&Instance, &[Value]) -> Result<()>>(handler: F) -> Self {
        Handler(Rc::new(handler))
    }

    pub fn call(&self, context: &Instance, args: &[Value]) -> Result<()> {
        (self.0)(context, args)
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Rc::as_ptr(&self.0) as *const () == Rc::as_ptr(&other.0) as *const ()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// A single bind.
struct Binding {
    /// Distinguishes repeated binds of the same handler.
    id: u64,
    handler: Handler,
    bound: Vec<Value>,
}

/// Event name to ordered subscriber list.
#[derive(Default)]
pub(crate) struct EventTable {
    next_id: u64,
    events: HashMap<String, Vec<Binding>>,
}

impl EventTable {
    fn bind(&mut self, event: &str, handler: Handler, bound: Vec<Value>) {
        let id = self.next_id;
        self.next_id += 1;
        self.events
            .entry(event.to_string())
            .or_insert_with(Vec::new)
            .push(Binding { id, handler, bound });
    }

    fn unbind(&mut self, event: &str, handler: Option<&Handler>) {
        match handler {
            Some(handler) => {
                if let Some(bindings) = self.events.get_mut(event) {
                    bindings.retain(|binding| !binding.handler.ptr_eq(handler));
                    if bindings.is_empty() {
                        self.events.remove(event);
                    }
                }
            }
            None => {
                self.events.remove(event);
            }
        }
    }

    fn snapshot(&self, event: &str) -> Vec<(u64, Handler, Vec<Value>)> {
        self.events.get(event).map_or_else(Vec::new, |bindings| {
            bindings
                .iter()
                .map(|b| (b.id, b.handler.clone(), b.bound.clone()))
                .collect()
        })
    }

    fn is_bound(&self, event: &str, id: u64) -> bool {
        self.events
            .get(event)
            .map_or(false, |bindings| bindings.iter().any(|b| b.id == id))
    }

    fn count(&self, event: &str) -> usize {
        self.events.get(event).map_or(0, Vec::len)
    }
}

/// A subscription held by the subscriber.
pub(crate) struct Hook {
    target: WeakInstance,
    event: String,
    handler: Handler,
}

impl Hook {
    fn release(self) {
        if let Some(target) = self.target.upgrade() {
            target.unbind(&self.event, Some(&self.handler));
        }
    }
}

impl Instance {
    /// Subscribes `handler` to `event`. `bound` is prepended to the trigger arguments.
    pub fn bind(&self, event: &str, handler: Handler, bound: Vec<Value>) {
        self.data_mut().events.bind(event, handler, bound);
    }

    /// Removes subscribers of `event`: only those with this exact handler, or all of them.
    pub fn unbind(&self, event: &str, handler: Option<&Handler>) {
        self.data_mut().events.unbind(event, handler);
    }

    /// Calls every subscriber of `event` in bind order, with this instance as context.
    ///
    /// The first handler error is returned as is, and the remaining subscribers are not called.
    /// Subscribers unbound by an earlier subscriber are skipped.
    pub fn trigger(&self, event: &str, args: &[Value]) -> Result<()> {
        let bindings = self.data().events.snapshot(event);
        if bindings.is_empty() {
            return Ok(());
        }
        trace!(instance = %self, event, subscribers = bindings.len(), "trigger");

        for (id, handler, mut call_args) in bindings {
            if !self.data().events.is_bound(event, id) {
                continue;
            }
            call_args.extend_from_slice(args);
            handler.call(self, &call_args)?;
        }
        Ok(())
    }

    /// Number of subscribers of `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.data().events.count(event)
    }

    /// Subscribes to `target`'s `event` on behalf of this instance.
    ///
    /// The handler runs with this instance as context. The subscription is recorded here and can
    /// be released with [`unhook`](Instance::unhook) or [`unhook_all`](Instance::unhook_all).
    /// Neither side keeps the other alive through the hook.
    pub fn hook(&self, target: &Instance, event: &str, handler: Handler, bound: Vec<Value>) {
        let subscriber = self.downgrade();
        let wrapper = Handler::new(move |_, args| match subscriber.upgrade() {
            Some(subscriber) => handler.call(&subscriber, args),
            None => Ok(()),
        });
        target.bind(event, wrapper.clone(), bound);
        let mut data = self.data_mut();
        // hooks on dropped targets have nothing left to release
        data.hooks.retain(|hook| hook.target.upgrade().is_some());
        data.hooks.push(Hook {
            target: target.downgrade(),
            event: event.to_string(),
            handler: wrapper,
        });
    }

    /// Releases every hook this instance holds on `target`, newest first.
    pub fn unhook(&self, target: &Instance) {
        let released: Vec<Hook> = {
            let mut data = self.data_mut();
            let (released, kept) = data
                .hooks
                .drain(..)
                .partition(|hook| hook.target.refers_to(target));
            data.hooks = kept;
            released
        };
        for hook in released.into_iter().rev() {
            hook.release();
        }
    }

    /// Releases every hook this instance holds, newest first.
    pub fn unhook_all(&self) {
        loop {
            let hook = self.data_mut().hooks.pop();
            match hook {
                Some(hook) => hook.release(),
                None => break,
            }
        }
    }

    /// Number of hooks this instance holds.
    pub fn hook_count(&self) -> usize {
        self.data().hooks.len()
    }
}
