//! The element lifecycle.
//!
//! An element is either *unrendered* or *rendered*. Rendering resolves the element's skin, lets
//! the skin produce a [`Source`] node, and attaches any behaviors. Removing tears the output
//! down again, detaches the element from its container, and releases every hook it holds.
//!
//! Property setters write to the element's fields and, while the element is rendered, forward
//! the change to the skin. Fields set while unrendered are picked up by the next render.
//!
//! Everything here is expressed as methods on the `t-element` and `t-skin` classes, so subclasses
//! can override any step; the typed wrappers on [`Instance`] just call those methods.

use crate::class::{is_instance, Class, ClassSpec, POST_INIT};
use crate::container::APPEND;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::registry::Registry;
use crate::source::Source;
use crate::value::{Options, Value};
use tracing::debug;

pub const ELEMENT: &str = "t-element";
pub const SKIN: &str = "t-skin";

pub const RENDER: &str = "render";
/// Called right after an element became rendered, with its output.
pub const ON_RENDER: &str = "on_render";
pub const REMOVE: &str = "remove";
pub const ATTACH: &str = "attach";
pub const RESIZE: &str = "resize";
pub const SET_HIDDEN: &str = "set_hidden";
pub const SET_HTML: &str = "set_html";
pub const GET_HTML: &str = "get_html";
pub const SET_SIZE: &str = "set_size";

/// Skin field holding the render output.
const OUTPUT: &str = "output";

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

fn element_options() -> Options {
    crate::options! {
        "source" => "div",
        "skin" => SKIN,
        "id" => Value::Null,
        "html" => Value::Null,
        "cls" => Value::Null,
        "hidden" => false,
        "append_to" => Value::Null,
        "attrs" => Options::new(),
        "width" => Value::Null,
        "height" => Value::Null,
        "resize_master" => false,
        "anchor" => Value::Null,
        "behaviors" => Value::Null,
    }
}

fn element_spec() -> ClassSpec {
    ClassSpec::new()
        .options(element_options())
        .method(POST_INIT, |this, _, _| {
            match this.get("append_to") {
                Value::Source(target) => {
                    let output = this.render(None)?;
                    target.append(&output);
                }
                Value::Instance(container) => {
                    container.call(APPEND, &[this.into()])?;
                }
                _ => (),
            }
            Ok(Value::Null)
        })
        .method(RENDER, |this, args, _| {
            if this.is_rendered() {
                if let Some(output) = this.source() {
                    return Ok(output.into());
                }
            }

            let skin = this.registry().manifest_value(&this.get("skin"))?;
            skin.call(ATTACH, &[this.into()])?;
            let output = skin.call(RENDER, &[arg(args, 0)])?;
            let output = output.expect_source("skin render output")?.clone();
            this.data_mut().rendered = true;
            debug!(element = %this, skin = %skin, "rendered");

            this.call(ON_RENDER, &[output.clone().into()])?;
            attach_behaviors(this)?;
            if this.get("resize_master").truthy() {
                this.resize()?;
            }
            Ok(output.into())
        })
        .method(ON_RENDER, |_, _, _| Ok(Value::Null))
        .method(REMOVE, |this, _, _| {
            if let Some(parent) = this.parent() {
                return parent.call(REMOVE, &[this.into()]);
            }

            let prior_parent = this
                .data_mut()
                .detached_from
                .take()
                .and_then(|parent| parent.upgrade());
            // teardown completes even if a step fails; the first error is returned
            let skin_result = match this.rendered_skin() {
                Some(skin) => skin.call(REMOVE, &[]).map(|_| ()),
                None => Ok(()),
            };
            this.data_mut().rendered = false;
            debug!(element = %this, "removed");

            let trigger_result = this.trigger(REMOVE, &[this.into(), prior_parent.into()]);
            this.unhook_all();
            skin_result.and(trigger_result).map(|_| Value::Null)
        })
        .method(SET_HIDDEN, |this, args, _| {
            let hidden = arg(args, 0).truthy();
            this.set("hidden", hidden);
            forward(this, SET_HIDDEN, &[hidden.into()])
        })
        .method(SET_HTML, |this, args, _| {
            let html = arg(args, 0);
            this.set("html", html.clone());
            forward(this, SET_HTML, &[html])
        })
        .method(GET_HTML, |this, _, _| match this.rendered_skin() {
            Some(skin) => skin.call(GET_HTML, &[]),
            None => Ok(this.get("html")),
        })
        .method(SET_SIZE, |this, args, _| {
            let (width, height) = (arg(args, 0), arg(args, 1));
            if !width.is_null() {
                this.set("width", width.clone());
            }
            if !height.is_null() {
                this.set("height", height.clone());
            }
            forward(this, SET_SIZE, &[width, height])
        })
        .method(RESIZE, |this, _, _| forward(this, RESIZE, &[]))
}

/// Calls `method` on the skin if the element is rendered.
fn forward(element: &Instance, method: &str, args: &[Value]) -> Result<Value> {
    match element.rendered_skin() {
        Some(skin) => skin.call(method, args),
        None => Ok(Value::Null),
    }
}

fn attach_behaviors(element: &Instance) -> Result<()> {
    let declared = match element.get("behaviors") {
        Value::List(list) => list,
        Value::Null => return Ok(()),
        single => vec![single],
    };
    let registry = element.registry();
    let mut behaviors = Vec::with_capacity(declared.len());
    for behavior in &declared {
        let behavior = registry.manifest_value(behavior)?;
        behavior.call(ATTACH, &[element.into()])?;
        behaviors.push(Value::from(behavior));
    }
    element.set("behaviors", behaviors);
    Ok(())
}

fn skin_spec() -> ClassSpec {
    ClassSpec::new()
        .option("cls", Value::Null)
        .method(ATTACH, |this, args, _| {
            let element = arg(args, 0);
            let element = element.expect_instance("skin host")?;
            this.set_host(element);
            element.set("skin", this);
            Ok(Value::Null)
        })
        .method(RENDER, |this, args, _| {
            let element = skin_host(this)?;
            let output = match arg(args, 0) {
                Value::Source(hint) => hint,
                Value::Null => Source::new(element.get("source").as_str().unwrap_or("div")),
                other => return Err(Error::invalid(format!("source hint must be a source, got {}", other.kind()))),
            };
            apply_fields(&element, this, &output);
            this.set(OUTPUT, output.clone());
            Ok(output.into())
        })
        .method(REMOVE, |this, _, _| {
            if let Some(output) = this.get(OUTPUT).as_source() {
                output.detach();
            }
            if let Some(element) = this.host() {
                element.data_mut().rendered = false;
            }
            this.set(OUTPUT, Value::Null);
            this.unhook_all();
            Ok(Value::Null)
        })
        .method(SET_HTML, |this, args, _| {
            skin_output(this)?.set_html(arg(args, 0).as_str().unwrap_or(""));
            Ok(Value::Null)
        })
        .method(GET_HTML, |this, _, _| Ok(skin_output(this)?.html().into()))
        .method(SET_HIDDEN, |this, args, _| {
            skin_output(this)?.set_hidden(arg(args, 0).truthy());
            Ok(Value::Null)
        })
        .method(SET_SIZE, |this, args, _| {
            skin_output(this)?.set_size(arg(args, 0).as_float(), arg(args, 1).as_float());
            Ok(Value::Null)
        })
        .method(RESIZE, |_, _, _| Ok(Value::Null))
}

/// Applies the element's buffered fields to a fresh output node.
fn apply_fields(element: &Instance, skin: &Instance, output: &Source) {
    if let Some(id) = element.get("id").as_str() {
        output.set_id(id);
    }
    for cls in &[element.get("cls"), skin.get("cls")] {
        if let Some(cls) = cls.as_str() {
            output.add_class(cls);
        }
    }
    if let Some(html) = element.get("html").as_str() {
        output.set_html(html);
    }
    output.set_size(element.get("width").as_float(), element.get("height").as_float());

    let attrs = match element.get("attrs") {
        Value::Options(options) => options.into_record(),
        Value::Record(record) => record,
        _ => Default::default(),
    };
    for (name, value) in &attrs {
        if let Some(value) = attr_text(value) {
            output.set_attr(name, &value);
        }
    }

    output.set_hidden(element.get("hidden").truthy());
}

fn attr_text(value: &Value) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn skin_host(skin: &Instance) -> Result<Instance> {
    skin.host()
        .ok_or_else(|| Error::InvariantViolation(format!("{} is not attached to an element", skin)))
}

fn skin_output(skin: &Instance) -> Result<Source> {
    match skin.get(OUTPUT) {
        Value::Source(output) => Ok(output),
        _ => Err(Error::InvariantViolation(format!("{} has not rendered", skin))),
    }
}

pub(crate) fn register(registry: &Registry) -> Result<()> {
    let object = registry.object();
    registry.define(Some(&object), Some(ELEMENT), element_spec())?;
    registry.define(Some(&object), Some(SKIN), skin_spec())?;
    Ok(())
}

impl Instance {
    /// Renders the element, returning its output. Rendering a rendered element returns the
    /// existing output.
    pub fn render(&self, hint: Option<&Source>) -> Result<Source> {
        let output = self.call(RENDER, &[hint.cloned().into()])?;
        Ok(output.expect_source("render output")?.clone())
    }

    /// Removes the element: from its container if it has one, otherwise tears it down.
    pub fn remove(&self) -> Result<()> {
        self.call(REMOVE, &[])?;
        Ok(())
    }

    pub fn is_rendered(&self) -> bool {
        self.data().rendered
    }

    /// The skin, once the element has been rendered.
    pub fn skin(&self) -> Option<Instance> {
        self.get("skin").as_instance().cloned()
    }

    fn rendered_skin(&self) -> Option<Instance> {
        if self.is_rendered() {
            self.skin()
        } else {
            None
        }
    }

    /// The render output while rendered.
    pub fn source(&self) -> Option<Source> {
        self.rendered_skin()
            .and_then(|skin| skin.get(OUTPUT).as_source().cloned())
    }

    pub fn set_hidden(&self, hidden: bool) -> Result<()> {
        self.call(SET_HIDDEN, &[hidden.into()])?;
        Ok(())
    }

    pub fn hide(&self) -> Result<()> {
        self.set_hidden(true)
    }

    pub fn show(&self) -> Result<()> {
        self.set_hidden(false)
    }

    pub fn set_html(&self, html: &str) -> Result<()> {
        self.call(SET_HTML, &[html.into()])?;
        Ok(())
    }

    pub fn html(&self) -> Result<String> {
        Ok(self.call(GET_HTML, &[])?.as_str().unwrap_or("").to_string())
    }

    /// Sets the given dimensions; `None` leaves a dimension unchanged.
    pub fn set_size(&self, width: Option<f64>, height: Option<f64>) -> Result<()> {
        self.call(SET_SIZE, &[width.into(), height.into()])?;
        Ok(())
    }

    pub fn resize(&self) -> Result<()> {
        self.call(RESIZE, &[])?;
        Ok(())
    }

    /// Finds the nearest ancestor that is an instance of `class`.
    pub fn find_parent(&self, class: &Class) -> Result<Instance> {
        let mut current = self.parent();
        while let Some(parent) = current {
            if is_instance(&parent, class) {
                return Ok(parent);
            }
            current = parent.parent();
        }
        Err(Error::InvariantViolation(format!(
            "{} has no ancestor of class {}",
            self, class
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Handler;
    use crate::options;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Registers a skin that counts attaches.
    fn counting_skin(registry: &Registry) -> Rc<RefCell<usize>> {
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        registry
            .get(SKIN)
            .unwrap()
            .extend(
                registry,
                Some("t-counting-skin"),
                ClassSpec::new().method(ATTACH, move |_, _, sup| {
                    *c.borrow_mut() += 1;
                    sup.call()
                }),
            )
            .unwrap();
        count
    }

    fn element(registry: &Registry, options: Options) -> Instance {
        let class = registry.get(ELEMENT).unwrap();
        registry.instantiate(&class, Some(options)).unwrap()
    }

    #[test]
    fn render_is_idempotent() {
        let registry = Registry::new();
        let attaches = counting_skin(&registry);
        let el = element(&registry, options! { "skin" => "t-counting-skin" });
        assert!(!el.is_rendered());

        let first = el.render(None).unwrap();
        let second = el.render(None).unwrap();
        assert!(first.ptr_eq(&second));
        assert!(el.is_rendered());
        assert_eq!(*attaches.borrow(), 1);
        assert!(el.skin().unwrap().host().unwrap().ptr_eq(&el));
    }

    #[test]
    fn render_uses_the_hint() {
        let registry = Registry::new();
        let el = element(&registry, options! { "source" => "section" });
        let hint = Source::new("main");
        let output = el.render(Some(&hint)).unwrap();
        assert!(output.ptr_eq(&hint));

        let plain = element(&registry, options! { "source" => "section" });
        assert_eq!(plain.render(None).unwrap().tag(), "section");
    }

    #[test]
    fn render_remove_render() {
        let registry = Registry::new();
        let attaches = counting_skin(&registry);
        let el = element(&registry, options! { "skin" => "t-counting-skin" });
        let first = el.render(None).unwrap();
        el.remove().unwrap();
        assert!(!el.is_rendered());
        assert!(el.source().is_none());

        let second = el.render(None).unwrap();
        assert!(el.is_rendered());
        assert!(!first.ptr_eq(&second));
        assert_eq!(*attaches.borrow(), 2);
    }

    #[test]
    fn buffered_properties_apply_on_render() {
        let registry = Registry::new();
        let el = element(
            &registry,
            options! {
                "id" => "main",
                "cls" => "panel wide",
                "attrs" => options! { "role" => "dialog", "tabindex" => 0 },
            },
        );
        el.set_html("<b>hi</b>").unwrap();
        el.hide().unwrap();
        el.set_size(Some(200.), None).unwrap();
        assert_eq!(el.html().unwrap(), "<b>hi</b>");

        let output = el.render(None).unwrap();
        assert_eq!(output.id().as_deref(), Some("main"));
        assert!(output.has_class("panel") && output.has_class("wide"));
        assert_eq!(output.html(), "<b>hi</b>");
        assert!(output.is_hidden());
        assert_eq!(output.size().x, 200.);
        assert_eq!(output.attr("role").as_deref(), Some("dialog"));
        assert_eq!(output.attr("tabindex").as_deref(), Some("0"));
    }

    #[test]
    fn setters_apply_immediately_while_rendered() {
        let registry = Registry::new();
        let el = element(&registry, Options::new());
        let output = el.render(None).unwrap();

        el.set_html("now").unwrap();
        assert_eq!(output.html(), "now");
        assert_eq!(el.html().unwrap(), "now");

        el.hide().unwrap();
        assert!(output.is_hidden());
        el.show().unwrap();
        assert!(!output.is_hidden());

        el.set_size(Some(10.), Some(20.)).unwrap();
        assert_eq!((output.size().x, output.size().y), (10., 20.));
        el.set_size(None, Some(5.)).unwrap();
        assert_eq!((output.size().x, output.size().y), (10., 5.));
    }

    #[test]
    fn on_render_sees_rendered_state() {
        let registry = Registry::new();
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        let class = registry
            .get(ELEMENT)
            .unwrap()
            .extend(
                &registry,
                None,
                ClassSpec::new().method(ON_RENDER, move |this, args, _| {
                    *s.borrow_mut() = Some((this.is_rendered(), args[0].as_source().is_some()));
                    Ok(Value::Null)
                }),
            )
            .unwrap();
        let el = registry.instantiate(&class, None).unwrap();
        el.render(None).unwrap();
        assert_eq!(*seen.borrow(), Some((true, true)));
    }

    #[test]
    fn remove_on_unrendered_element_releases_hooks() {
        let registry = Registry::new();
        let el = element(&registry, Options::new());
        let other = element(&registry, Options::new());
        let fired = Rc::new(RefCell::new(0));
        let f = Rc::clone(&fired);
        el.hook(
            &other,
            "x",
            Handler::new(move |_, _| {
                *f.borrow_mut() += 1;
                Ok(())
            }),
            Vec::new(),
        );

        el.remove().unwrap();
        assert!(!el.is_rendered());
        assert_eq!(el.hook_count(), 0);
        other.trigger("x", &[]).unwrap();
        assert_eq!(*fired.borrow(), 0);
    }

    #[test]
    fn remove_event_carries_element_and_prior_parent() {
        let registry = Registry::new();
        let el = element(&registry, Options::new());
        el.render(None).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        el.bind(
            REMOVE,
            Handler::new(move |_, args| {
                s.borrow_mut().extend_from_slice(args);
                Ok(())
            }),
            Vec::new(),
        );
        el.remove().unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].as_instance().unwrap().ptr_eq(&el));
        assert!(seen[1].is_null());
    }

    #[test]
    fn failing_remove_handler_still_tears_down() {
        let registry = Registry::new();
        let el = element(&registry, Options::new());
        let other = element(&registry, Options::new());
        el.render(None).unwrap();
        el.hook(&other, "x", Handler::new(|_, _| Ok(())), Vec::new());
        el.bind(REMOVE, Handler::new(|_, _| Err(Error::handler("nope"))), Vec::new());

        assert!(matches!(el.remove(), Err(Error::Handler(_))));
        assert!(!el.is_rendered());
        assert_eq!(el.hook_count(), 0);
    }

    #[test]
    fn failing_skin_remove_still_tears_down() {
        let registry = Registry::new();
        registry
            .get(SKIN)
            .unwrap()
            .extend(
                &registry,
                Some("t-brittle-skin"),
                ClassSpec::new().method(REMOVE, |_, _, _| Err(Error::handler("skin broke"))),
            )
            .unwrap();
        let el = element(&registry, options! { "skin" => "t-brittle-skin" });
        let other = element(&registry, Options::new());
        el.render(None).unwrap();
        el.hook(&other, "x", Handler::new(|_, _| Ok(())), Vec::new());

        let removed = Rc::new(RefCell::new(false));
        let r = Rc::clone(&removed);
        el.bind(
            REMOVE,
            Handler::new(move |_, _| {
                *r.borrow_mut() = true;
                Ok(())
            }),
            Vec::new(),
        );

        match el.remove() {
            Err(Error::Handler(message)) => assert_eq!(message, "skin broke"),
            other => panic!("expected the skin error, got {:?}", other),
        }
        assert!(!el.is_rendered());
        assert_eq!(el.hook_count(), 0);
        assert!(*removed.borrow());
    }

    #[test]
    fn resize_master_resizes_once_rendered() {
        let registry = Registry::new();
        let resized = Rc::new(RefCell::new(Vec::new()));
        let r = Rc::clone(&resized);
        registry
            .get(SKIN)
            .unwrap()
            .extend(
                &registry,
                Some("t-sizing-skin"),
                ClassSpec::new().method(RESIZE, move |this, _, _| {
                    r.borrow_mut().push(this.host().map_or(false, |el| el.is_rendered()));
                    Ok(Value::Null)
                }),
            )
            .unwrap();
        let el = element(&registry, options! { "skin" => "t-sizing-skin", "resize_master" => true });
        el.render(None).unwrap();
        assert_eq!(*resized.borrow(), vec![true]);

        let plain = element(&registry, options! { "skin" => "t-sizing-skin" });
        plain.render(None).unwrap();
        assert_eq!(resized.borrow().len(), 1);
    }

    #[test]
    fn behaviors_attach_once_per_render() {
        let registry = Registry::new();
        let attached = Rc::new(RefCell::new(Vec::new()));
        let a = Rc::clone(&attached);
        registry
            .object()
            .extend(
                &registry,
                Some("t-focusable"),
                ClassSpec::new().method(ATTACH, move |this, args, _| {
                    this.set_host(args[0].as_instance().unwrap());
                    a.borrow_mut().push(args[0].as_instance().unwrap().clone());
                    Ok(Value::Null)
                }),
            )
            .unwrap();
        let el = element(&registry, options! { "behaviors" => vec![Value::from("t-focusable")] });
        el.render(None).unwrap();
        el.render(None).unwrap();

        assert_eq!(attached.borrow().len(), 1);
        assert!(attached.borrow()[0].ptr_eq(&el));
        let behaviors = el.get("behaviors");
        let behavior = behaviors.as_list().unwrap()[0].as_instance().unwrap().clone();
        assert!(behavior.host().unwrap().ptr_eq(&el));
    }

    #[test]
    fn append_to_renders_into_target() {
        let registry = Registry::new();
        let target = Source::new("body");
        let el = element(&registry, options! { "append_to" => target.clone() });
        assert!(el.is_rendered());
        assert_eq!(target.children().len(), 1);
        assert!(target.children()[0].ptr_eq(&el.source().unwrap()));
    }

    #[test]
    fn unknown_skin_fails_render() {
        let registry = Registry::new();
        let el = element(&registry, options! { "skin" => "t-missing-skin" });
        assert!(matches!(el.render(None), Err(Error::Lookup(_))));
        assert!(!el.is_rendered());
    }

    #[test]
    fn find_parent_without_ancestors_fails() {
        let registry = Registry::new();
        let el = element(&registry, Options::new());
        let class = registry.get(ELEMENT).unwrap();
        assert!(matches!(el.find_parent(&class), Err(Error::InvariantViolation(_))));
    }
}
