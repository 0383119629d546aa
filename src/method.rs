//! Methods and base dispatch.

use crate::error::Result;
use crate::instance::Instance;
use crate::value::Value;
use core::fmt;
use std::rc::Rc;

/// Signature of a method body: receiver, arguments, and a handle to the overridden method.
pub type MethodFn = dyn Fn(&Instance, &[Value], &Super<'_>) -> Result<Value>;

/// A method, possibly overriding a base method.
///
/// Overriding never mutates anything: the base is stored next to the body and handed to it as a
/// fresh [`Super`] on every call, so nested and re-entrant base calls each see their own chain.
#[derive(Clone)]
pub struct Method {
    body: Rc<MethodFn>,
    base: Option<Rc<Method>>,
}

impl Method {
    pub fn new<F>(body: F) -> Method
    where
        F: Fn(&Instance, &[Value], &Super<'_>) -> Result<Value> + 'static,
    {
        Method {
            body: Rc::new(body),
            base: None,
        }
    }

    /// Returns this method with `base` as its overridden implementation.
    pub fn overriding(&self, base: &Method) -> Method {
        Method {
            body: Rc::clone(&self.body),
            base: Some(Rc::new(base.clone())),
        }
    }

    /// Whether this method overrides another.
    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// Calls the method on `this`.
    pub fn invoke(&self, this: &Instance, args: &[Value]) -> Result<Value> {
        let sup = Super {
            this,
            args,
            base: self.base.as_deref(),
        };
        (self.body)(this, args, &sup)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Method) -> bool {
        let same_body = Rc::as_ptr(&self.body) as *const () == Rc::as_ptr(&other.body) as *const ();
        let same_base = match (&self.base, &other.base) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        };
        same_body && same_base
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Method({:p}", Rc::as_ptr(&self.body) as *const ())?;
        if self.base.is_some() {
            write!(f, ", overrides")?;
        }
        write!(f, ")")
    }
}

/// Access to the overridden implementation for the duration of one call.
pub struct Super<'a> {
    this: &'a Instance,
    args: &'a [Value],
    base: Option<&'a Method>,
}

impl<'a> Super<'a> {
    /// Whether there is an overridden implementation.
    pub fn exists(&self) -> bool {
        self.base.is_some()
    }

    /// Calls the overridden implementation with the same receiver and arguments.
    ///
    /// Returns null if nothing was overridden.
    pub fn call(&self) -> Result<Value> {
        self.call_with(self.args)
    }

    /// Calls the overridden implementation with the same receiver and different arguments.
    pub fn call_with(&self, args: &[Value]) -> Result<Value> {
        match self.base {
            Some(base) => base.invoke(self.this, args),
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::registry::Registry;
    use crate::ClassSpec;
    use std::cell::RefCell;

    fn plain_instance() -> Instance {
        let registry = Registry::new();
        let class = registry.define(None, None, ClassSpec::new()).unwrap();
        registry.instantiate(&class, None).unwrap()
    }

    #[test]
    fn base_call_sees_same_receiver_and_arguments() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_base = Rc::clone(&seen);
        let base = Method::new(move |this, args, _| {
            seen_base.borrow_mut().push((this.clone(), args.to_vec()));
            Ok(Value::from("base"))
        });
        let derived = Method::new(|_, _, sup| {
            let r = sup.call()?;
            Ok(Value::from(format!("derived+{}", r.as_str().unwrap_or(""))))
        })
        .overriding(&base);

        let this = plain_instance();
        let args = [Value::Int(1), Value::from("x")];
        assert_eq!(derived.invoke(&this, &args).unwrap(), Value::from("derived+base"));

        // direct call for comparison
        base.invoke(&this, &args).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].0.ptr_eq(&seen[1].0));
        assert_eq!(seen[0].1, seen[1].1);
    }

    #[test]
    fn nested_chains_do_not_interfere() {
        let a = Method::new(|_, args, _| Ok(Value::Int(args[0].as_int().unwrap_or(0) + 1)));
        let b = Method::new(|_, _, sup| Ok(Value::Int(sup.call()?.as_int().unwrap_or(0) * 10)))
            .overriding(&a);
        // c re-enters b through its base, and also calls b directly with other arguments
        let b2 = b.clone();
        let c = Method::new(move |this, _, sup| {
            let inner = b2.invoke(this, &[Value::Int(100)])?.as_int().unwrap_or(0);
            let outer = sup.call()?.as_int().unwrap_or(0);
            Ok(Value::Int(inner + outer))
        })
        .overriding(&b);

        let this = plain_instance();
        // inner: (100 + 1) * 10 = 1010; outer: (2 + 1) * 10 = 30
        assert_eq!(c.invoke(&this, &[Value::Int(2)]).unwrap(), Value::Int(1040));
    }

    #[test]
    fn failing_override_leaves_dispatch_intact() {
        let base = Method::new(|_, _, _| Ok(Value::from("ok")));
        let derived = Method::new(|_, args, sup| {
            if args.is_empty() {
                return Err(Error::handler("boom"));
            }
            sup.call()
        })
        .overriding(&base);

        let this = plain_instance();
        assert!(derived.invoke(&this, &[]).is_err());
        assert_eq!(derived.invoke(&this, &[Value::Null]).unwrap(), Value::from("ok"));
    }

    #[test]
    fn missing_base_returns_null() {
        let m = Method::new(|_, _, sup| {
            assert!(!sup.exists());
            sup.call()
        });
        assert!(m.invoke(&plain_instance(), &[]).unwrap().is_null());
    }
}
