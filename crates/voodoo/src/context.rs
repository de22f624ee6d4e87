//! The application context.
//!
//! Everything a route handler needs to build models, stores and views is
//! reached through an [`AppContext`]: the surface toolkit, the location
//! source, the executor that drives data-source futures, the page record and
//! the primary view slot.

use crate::config::AppConfig;
use futures::future::LocalBoxFuture;
use futures::task::{LocalSpawn, LocalSpawnExt};
use std::rc::Rc;
use voodoo_core::{Error, Result};
use voodoo_reactive::Observable;
use voodoo_router::{LocationSource, MemoryLocation, PrimaryOptions, PrimaryViews, Router};
use voodoo_view::{MemoryToolkit, Toolkit, View};

/// Shared state of a running application.
pub struct AppContext {
    config: AppConfig,
    toolkit: Rc<dyn Toolkit>,
    location: Rc<dyn LocationSource>,
    spawner: Rc<dyn LocalSpawn>,
    page: Rc<Observable>,
    primary: PrimaryViews,
}

impl AppContext {
    /// Creates a context.
    pub fn new(
        config: AppConfig,
        toolkit: Rc<dyn Toolkit>,
        location: Rc<dyn LocationSource>,
        spawner: Rc<dyn LocalSpawn>,
    ) -> Rc<Self> {
        let page = Rc::new(Observable::new());
        let primary = PrimaryViews::new(
            Rc::clone(&page),
            config.primary_class.as_str(),
            config.title.as_str(),
            config.title_separator.as_str(),
        );
        Rc::new(Self {
            config,
            toolkit,
            location,
            spawner,
            page,
            primary,
        })
    }

    /// Creates a context on the in-memory toolkit and location, starting at
    /// `config.initial_location`.
    pub fn in_memory(config: AppConfig, spawner: Rc<dyn LocalSpawn>) -> Rc<Self> {
        let location = Rc::new(MemoryLocation::new(config.initial_location.as_str()));
        Self::new(config, Rc::new(MemoryToolkit::new()), location, spawner)
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    pub fn toolkit(&self) -> &Rc<dyn Toolkit> {
        &self.toolkit
    }

    #[inline]
    pub fn location(&self) -> &Rc<dyn LocationSource> {
        &self.location
    }

    /// Returns the page record (`title`).
    #[inline]
    pub fn page(&self) -> &Rc<Observable> {
        &self.page
    }

    #[inline]
    pub fn primary(&self) -> &PrimaryViews {
        &self.primary
    }

    /// Makes `view` the primary view.
    pub fn set_primary(&self, view: &Rc<View>, title: Option<&str>) -> Result<()> {
        let options = PrimaryOptions {
            title: title.map(String::from),
        };
        self.primary.set(view, &options)
    }

    /// Tears down a view a route is leaving. The primary slot is cleared
    /// first when it holds `view`.
    pub fn dismiss(&self, view: &Rc<View>) -> Result<()> {
        let is_primary = self
            .primary
            .current()
            .map_or(false, |current| Rc::ptr_eq(&current, view));
        if is_primary {
            self.primary.clear()?;
        }
        view.destroy();
        tracing::debug!(message = "app.dismiss", view = %view.name(), is_primary);
        Ok(())
    }

    /// Hands a data-source future to the executor.
    pub fn spawn(&self, future: LocalBoxFuture<'static, ()>) -> Result<()> {
        self.spawner
            .spawn_local(future)
            .map_err(|err| Error::spawn(err.to_string()))
    }

    /// Pushes a location to the location source.
    pub fn navigate_to(&self, location: &str) {
        self.location.push(location);
    }

    /// Attaches `router` to the location source and enters the current
    /// location.
    pub fn start(self: &Rc<Self>, router: &Rc<Router<AppContext>>) -> Result<()> {
        tracing::debug!(
            message = "app.start",
            title = %self.config.title,
            location = %self.location.current()
        );
        router.attach(Rc::clone(self), Rc::clone(&self.location))
    }
}
