//! Class-name bindings.
//!
//! A class binding pairs a dependency expression with a class template
//! applied to the view's root element:
//!
//! - `a:b` applies `a` when the dependency is truthy, `b` otherwise
//! - a single token applies only when the dependency is truthy
//! - `{{ path }}` interpolates inside either token (`has-error-{{ model.status }}`)
//!
//! A rendered class holding several whitespace-separated names applies each
//! name on its own.

use crate::binding::{evaluate, watch_dependencies};
use crate::element::ElementRef;
use crate::view::View;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use voodoo_core::{Error, Expression, Path, Result, Template, Value};
use voodoo_reactive::PathWatch;

#[derive(Clone, Debug, PartialEq, Eq)]
enum ClassTemplate {
    Pair(Template, Template),
    Single(Template),
}

/// A declared class binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassSpec {
    dependency: Expression,
    template: ClassTemplate,
    source: String,
}

impl ClassSpec {
    /// Parses a dependency expression and a class template.
    pub fn parse(dependency: &str, template: &str) -> Result<Self> {
        let dependency = Expression::parse(dependency)?;
        let parsed = match split_pair(template)? {
            Some((on, off)) => ClassTemplate::Pair(Template::parse(on)?, Template::parse(off)?),
            None => {
                let token = template.trim();
                if token.is_empty() {
                    return Err(Error::template(template, "empty class template"));
                }
                ClassTemplate::Single(Template::parse(token)?)
            }
        };
        Ok(Self {
            dependency,
            template: parsed,
            source: template.to_string(),
        })
    }

    /// Returns the dependency expression.
    #[inline]
    pub fn dependency(&self) -> &Expression {
        &self.dependency
    }

    /// Returns the class template as declared.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the template chosen for a dependency value, if any.
    fn select(&self, truthy: bool) -> Option<&Template> {
        match (&self.template, truthy) {
            (ClassTemplate::Pair(on, _), true) => Some(on),
            (ClassTemplate::Pair(_, off), false) => Some(off),
            (ClassTemplate::Single(on), true) => Some(on),
            (ClassTemplate::Single(_), false) => None,
        }
    }

    /// Every path the binding reads: the dependency plus the placeholders.
    fn watched(&self) -> Vec<Path> {
        let mut paths = self.dependency.dependencies();
        let templates: Vec<&Template> = match &self.template {
            ClassTemplate::Pair(on, off) => vec![on, off],
            ClassTemplate::Single(on) => vec![on],
        };
        for template in templates {
            paths.extend(template.paths().cloned());
        }
        paths
    }
}

/// Splits `a:b` on a `:` outside placeholders.
fn split_pair(source: &str) -> Result<Option<(&str, &str)>> {
    let mut depth = 0usize;
    let mut split = None;
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 1;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') && depth > 0 => {
                depth -= 1;
                i += 1;
            }
            b':' if depth == 0 => {
                if split.is_some() {
                    return Err(Error::template(source, "more than one ':' in class pair"));
                }
                split = Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    match split {
        Some(at) => {
            let (on, off) = (source[..at].trim(), source[at + 1..].trim());
            if on.is_empty() || off.is_empty() {
                return Err(Error::template(source, "empty side in class pair"));
            }
            Ok(Some((on, off)))
        }
        None => Ok(None),
    }
}

/// A live class binding on a view's root.
pub(crate) struct ClassBinding {
    spec: ClassSpec,
    root: ElementRef,
    host: Weak<View>,
    watches: RefCell<Vec<PathWatch>>,
    current: RefCell<Option<String>>,
    active: Cell<bool>,
}

impl ClassBinding {
    pub(crate) fn install(
        host: &Rc<View>,
        root: &ElementRef,
        spec: &ClassSpec,
    ) -> Result<Rc<Self>> {
        let binding = Rc::new(Self {
            spec: spec.clone(),
            root: Rc::clone(root),
            host: Rc::downgrade(host),
            watches: RefCell::new(Vec::new()),
            current: RefCell::new(None),
            active: Cell::new(true),
        });

        let weak = Rc::downgrade(&binding);
        let watches = watch_dependencies(host, spec.watched(), move || {
            if let Some(binding) = weak.upgrade() {
                if let Err(err) = binding.refresh() {
                    tracing::warn!(
                        message = "class.refresh_failed",
                        template = %binding.spec.source(),
                        %err
                    );
                }
            }
        })?;
        *binding.watches.borrow_mut() = watches;

        if let Err(err) = binding.refresh() {
            binding.teardown();
            return Err(err);
        }
        Ok(binding)
    }

    /// Returns the class currently applied by this binding.
    pub(crate) fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    fn refresh(&self) -> Result<()> {
        if !self.active.get() {
            return Ok(());
        }
        let host = match self.host.upgrade() {
            Some(host) => host,
            None => return Ok(()),
        };
        let truthy = match evaluate(&host, self.spec.dependency())? {
            Value::String(text) if self.spec.dependency().is_template() => !text.is_empty(),
            value => value.is_truthy(),
        };
        let next = match self.spec.select(truthy) {
            Some(template) => {
                let rendered = evaluate(&host, &Expression::Template(template.clone()))?;
                Some(rendered.to_text().trim().to_string()).filter(|c| !c.is_empty())
            }
            None => None,
        };

        let previous = self.current.replace(next.clone());
        if previous == next {
            return Ok(());
        }
        let (old, new) = (tokens(&previous), tokens(&next));
        for class in old.iter().filter(|c| !new.contains(*c)) {
            self.root.remove_class(class);
        }
        for class in new.iter().filter(|c| !old.contains(*c)) {
            self.root.add_class(class);
        }
        tracing::trace!(message = "class.apply", class = ?next);
        Ok(())
    }

    /// Cancels the watches and removes the applied class.
    pub(crate) fn teardown(&self) {
        if !self.active.replace(false) {
            return;
        }
        for watch in self.watches.borrow_mut().drain(..) {
            watch.cancel();
        }
        let applied = self.current.take();
        for class in tokens(&applied) {
            self.root.remove_class(class);
        }
    }
}

/// Splits a rendered class on whitespace.
fn tokens(class: &Option<String>) -> Vec<&str> {
    class
        .as_deref()
        .map(|c| c.split_whitespace().collect())
        .unwrap_or_default()
}
