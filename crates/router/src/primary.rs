//! The primary view slot.
//!
//! At most one view is primary. Making a view primary removes the primary
//! class from the previous one, applies it to the new one and writes the page
//! title.

use std::cell::RefCell;
use std::rc::Rc;
use voodoo_core::Result;
use voodoo_reactive::Observable;
use voodoo_view::{Element, View};

/// Page title key on the page record.
pub const TITLE: &str = "title";

/// Options passed alongside a new primary view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrimaryOptions {
    /// Title of the view, prepended to the application title.
    pub title: Option<String>,
}

impl PrimaryOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }
}

/// Holds the primary view and the page record it writes the title to.
pub struct PrimaryViews {
    class: String,
    separator: String,
    app_title: String,
    page: Rc<Observable>,
    current: RefCell<Option<Rc<View>>>,
}

impl PrimaryViews {
    /// Creates an empty slot. `page` gets a `title` key if it lacks one.
    pub fn new(
        page: Rc<Observable>,
        class: impl Into<String>,
        app_title: impl Into<String>,
        separator: impl Into<String>,
    ) -> Self {
        let app_title = app_title.into();
        page.declare(TITLE, app_title.as_str().into());
        Self {
            class: class.into(),
            separator: separator.into(),
            app_title,
            page,
            current: RefCell::new(None),
        }
    }

    /// Returns the primary view.
    pub fn current(&self) -> Option<Rc<View>> {
        self.current.borrow().clone()
    }

    /// Returns the page record.
    pub fn page(&self) -> &Rc<Observable> {
        &self.page
    }

    /// Makes `view` primary, rendering it first if needed.
    pub fn set(&self, view: &Rc<View>, options: &PrimaryOptions) -> Result<()> {
        let root = match view.root() {
            Some(root) if view.is_rendered() => root,
            _ => view.render()?,
        };

        let previous = self.current.replace(Some(Rc::clone(view)));
        if let Some(previous) = previous.filter(|p| !Rc::ptr_eq(p, view)) {
            if let Some(previous_root) = previous.root() {
                previous_root.remove_class(&self.class);
            }
        }
        root.add_class(&self.class);

        let title = match &options.title {
            Some(title) if self.app_title.is_empty() => title.clone(),
            Some(title) => format!("{}{}{}", title, self.separator, self.app_title),
            None => self.app_title.clone(),
        };
        self.page.set(TITLE, title.as_str())?;
        tracing::debug!(message = "primary.set", view = %view.name(), %title);
        Ok(())
    }

    /// Clears the slot, removing the primary class and restoring the
    /// application title.
    pub fn clear(&self) -> Result<()> {
        let previous = self.current.borrow_mut().take();
        if let Some(root) = previous.and_then(|view| view.root()) {
            root.remove_class(&self.class);
        }
        self.page.set(TITLE, self.app_title.as_str())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voodoo_core::Value;
    use voodoo_view::{MemoryToolkit, Toolkit, ViewConfig, ViewShape};

    fn view(name: &str) -> Rc<View> {
        let toolkit: Rc<dyn Toolkit> = Rc::new(MemoryToolkit::new());
        let shape = ViewShape::builder(name)
            .template("<section></section>")
            .build()
            .unwrap();
        View::new(toolkit, &shape, ViewConfig::new())
    }

    #[test]
    fn test_primary_moves_class_and_sets_title() {
        let page = Rc::new(Observable::new());
        let primary = PrimaryViews::new(page.clone(), "is-primary", "My Todos", " - ");
        assert_eq!(page.get(TITLE), Some(Value::from("My Todos")));

        let home = view("Home");
        let about = view("About");
        primary.set(&home, &PrimaryOptions::titled("Home")).unwrap();
        assert!(home.root().unwrap().has_class("is-primary"));
        assert_eq!(page.get(TITLE), Some(Value::from("Home - My Todos")));

        primary.set(&about, &PrimaryOptions::default()).unwrap();
        assert!(!home.root().unwrap().has_class("is-primary"));
        assert!(about.root().unwrap().has_class("is-primary"));
        assert_eq!(page.get(TITLE), Some(Value::from("My Todos")));
        assert!(Rc::ptr_eq(&primary.current().unwrap(), &about));
    }

    #[test]
    fn test_primary_same_view_keeps_class() {
        let page = Rc::new(Observable::new());
        let primary = PrimaryViews::new(page.clone(), "is-primary", "", " - ");
        let home = view("Home");
        primary.set(&home, &PrimaryOptions::titled("Home")).unwrap();
        primary.set(&home, &PrimaryOptions::titled("Again")).unwrap();
        assert!(home.root().unwrap().has_class("is-primary"));
        assert_eq!(page.get(TITLE), Some(Value::from("Again")));

        primary.clear().unwrap();
        assert!(!home.root().unwrap().has_class("is-primary"));
        assert!(primary.current().is_none());
        assert_eq!(page.get(TITLE), Some(Value::from("")));
    }
}
