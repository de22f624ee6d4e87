//! A small todo application driven end to end through the in-memory surface.

use futures::executor::LocalPool;
use serde_json::{json, Value as Json};
use std::cell::RefCell;
use std::rc::Rc;
use voodoo::{
    AppConfig, AppContext, Element, ElementRef, Error, FnRoute, LocationSource, MemoryLocation,
    MemorySource, MemoryToolkit, Model, ModelShape, ObjectRef, Params, Predicate, Response,
    Result, Route, RouteHandle, Router, Store, StoreShape, Value, View, ViewConfig, ViewShape,
    XhrState,
};
use voodoo_view::bubble;
use voodoo_view::memory::{click, toggle, type_text};

type Log = Rc<RefCell<Vec<String>>>;

const TODO_VIEW: &str = r#"
    <li class="todo">
        <input class="todo-toggle-done" type="checkbox">
        <label class="todo-text"></label>
        <input class="todo-text-edit" type="text">
        <button class="todo-delete">x</button>
    </li>
"#;

const TODOS_VIEW: &str = r#"
    <section class="todos">
        <h1 class="title"></h1>
        <ul class="todo-list"></ul>
        <span class="todo-count"></span>
    </section>
"#;

fn todo_shape() -> ModelShape {
    ModelShape::builder("Todo")
        .default("text", "Untitled")
        .default("is_done", false)
        .default("is_deleted", false)
        .default("is_editing", false)
        .build()
}

fn todos_shape(source: Rc<MemorySource>) -> StoreShape {
    StoreShape::builder("Todos")
        .resource("/todos")
        .source(source)
        .property("title", "My todo list")
        .parse(|body: &Json| {
            body.get("items")
                .and_then(Json::as_array)
                .cloned()
                .unwrap_or_default()
        })
        .item_shape(todo_shape())
        .build()
}

fn todo_view_shape() -> Result<ViewShape> {
    ViewShape::builder("TodoView")
        .template(TODO_VIEW)
        .area(".todo-text", "model.text")
        .two_way(".todo-text-edit", "model.text")
        .two_way(".todo-toggle-done", "model.is_done")
        .class_binding("model.is_done", "is-done:is-active")
        .class_binding("model.is_deleted", "hidden")
        .class_binding("model.is_editing", "is-editing")
        .class_binding("model.xhr.state", "xhr-{{ model.xhr.state }}")
        .event("click .todo-delete", |view, _, _| {
            view.set("is_deleted", true)?;
            Ok(())
        })
        .event("dblclick .todo-text", |view, _, _| {
            view.set("is_editing", true)?;
            Ok(())
        })
        .build()
}

fn todos_view_shape() -> Result<ViewShape> {
    ViewShape::builder("TodosView")
        .template(TODOS_VIEW)
        .default("filter_by", "all")
        .default("todos_active", Value::Null)
        .on_render(|view| {
            let store = view
                .store()
                .and_then(|s| voodoo_core::downcast::<Store>(&s))
                .ok_or_else(|| Error::invalid_binding("store", "missing store"))?;
            let active = store.filter(Predicate::new().where_eq("is_done", false))?;
            view.set("todos_active", Value::object(Rc::clone(&active)))?;
            view.defer(move || active.release());
            Ok(())
        })
        .area(".title", "store.title")
        .area(".todo-list", "store")
        .area(".todo-count", "{{ todos_active.length }} left")
        .class_binding("filter_by", "filter-by-{{ filter_by }}")
        .item_view(".todo-list", |host, member| {
            let config = ViewConfig::new()
                .model(Rc::clone(member))
                .delegate_to(Rc::clone(host));
            Ok(View::new(
                Rc::clone(host.toolkit()),
                &todo_view_shape()?,
                config,
            ))
        })
        .build()
}

struct TodosRoute {
    store: Rc<Store>,
    view: Option<Rc<View>>,
    log: Log,
}

impl Route<AppContext> for TodosRoute {
    fn enter(&mut self, cx: &AppContext, location: &str, params: &Params) -> Result<()> {
        self.log.borrow_mut().push(format!("enter {}", location));
        let store: ObjectRef = self.store.clone();
        let view = View::new(
            Rc::clone(cx.toolkit()),
            &todos_view_shape()?,
            ViewConfig::new().store(store),
        );
        self.view = Some(Rc::clone(&view));
        cx.set_primary(&view, Some("Todos"))?;
        view.set("filter_by", params.get("by").unwrap_or("all"))?;
        Ok(())
    }

    fn exit(&mut self, cx: &AppContext, location: &str) -> Result<()> {
        self.log.borrow_mut().push(format!("exit {}", location));
        match self.view.take() {
            Some(view) => cx.dismiss(&view),
            None => Ok(()),
        }
    }
}

struct App {
    pool: LocalPool,
    cx: Rc<AppContext>,
    location: Rc<MemoryLocation>,
    router: Rc<Router<AppContext>>,
    store: Rc<Store>,
    about: Rc<RefCell<Option<Rc<View>>>>,
    log: Log,
}

impl App {
    fn start(items: Json) -> Self {
        let source = Rc::new(MemorySource::new());
        source.respond("/todos", Response::ok(json!({ "items": items })));
        let store = todos_shape(source).create();

        let pool = LocalPool::new();
        let location = Rc::new(MemoryLocation::new("/"));
        let config = AppConfig::from_json_str(r#"{"title": "My Todos"}"#).unwrap();
        let cx = AppContext::new(
            config,
            Rc::new(MemoryToolkit::new()),
            location.clone(),
            Rc::new(pool.spawner()),
        );

        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let router: Rc<Router<AppContext>> = Rc::new(Router::new());
        let todos: RouteHandle<AppContext> = Rc::new(RefCell::new(TodosRoute {
            store: Rc::clone(&store),
            view: None,
            log: log.clone(),
        }));
        router.add_handle("Todos", "/", Rc::clone(&todos)).unwrap();
        router.add_handle("Filter", "/filter/:by", todos).unwrap();

        let about_shape = ViewShape::builder("About")
            .template("<article></article>")
            .build()
            .unwrap();
        let about: Rc<RefCell<Option<Rc<View>>>> = Rc::new(RefCell::new(None));
        let (enter_log, entered) = (log.clone(), about.clone());
        let (exit_log, leaving) = (log.clone(), about.clone());
        router
            .add(
                "About",
                "/about",
                FnRoute::new(move |cx: &AppContext, location: &str, _: &Params| {
                    enter_log.borrow_mut().push(format!("enter {}", location));
                    let view = View::new(Rc::clone(cx.toolkit()), &about_shape, ViewConfig::new());
                    *entered.borrow_mut() = Some(Rc::clone(&view));
                    cx.set_primary(&view, Some("About"))
                })
                .on_exit(move |cx: &AppContext, location: &str| {
                    exit_log.borrow_mut().push(format!("exit {}", location));
                    let view = leaving.borrow_mut().take();
                    match view {
                        Some(view) => cx.dismiss(&view),
                        None => Ok(()),
                    }
                }),
            )
            .unwrap();

        cx.start(&router).unwrap();
        Self {
            pool,
            cx,
            location,
            router,
            store,
            about,
            log,
        }
    }

    fn fetch(&mut self) {
        self.cx.spawn(self.store.fetch().unwrap()).unwrap();
        self.pool.run_until_stalled();
    }

    fn todos_view(&self) -> Rc<View> {
        self.cx.primary().current().unwrap()
    }

    fn select(&self, selector: &str) -> ElementRef {
        self.todos_view().root().unwrap().select(selector).unwrap()
    }

    fn item(&self, index: usize) -> ElementRef {
        self.select(".todo-list").children()[index].clone()
    }

    fn model(&self, index: usize) -> Rc<Model> {
        self.store.at(index).unwrap()
    }
}

fn three_todos() -> Json {
    json!([
        {"id": 1, "text": "Buy milk", "is_done": false},
        {"id": 2, "text": "Walk dog", "is_done": true},
        {"id": 3, "text": "Write code", "is_done": false}
    ])
}

#[test]
fn test_fetch_renders_items_and_active_count() {
    let mut app = App::start(three_todos());
    assert_eq!(app.cx.page().get("title"), Some(Value::from("Todos - My Todos")));
    assert_eq!(app.select(".title").content(), "My todo list");
    assert!(app.select(".todo-list").children().is_empty());
    assert_eq!(app.select(".todo-count").content(), "0 left");

    app.fetch();
    assert_eq!(app.store.xhr_state(), XhrState::Success);
    assert_eq!(app.store.len(), 3);

    let texts: Vec<String> = app
        .select(".todo-list")
        .children()
        .iter()
        .map(|li| li.select(".todo-text").unwrap().content())
        .collect();
    assert_eq!(texts, vec!["Buy milk", "Walk dog", "Write code"]);
    assert_eq!(app.select(".todo-count").content(), "2 left");
    assert!(app.item(1).has_class("is-done"));
    assert!(app.item(0).has_class("is-active"));
}

#[test]
fn test_toggling_done_updates_active_count() {
    let mut app = App::start(three_todos());
    app.fetch();
    assert_eq!(app.select(".todo-count").content(), "2 left");

    toggle(&app.item(1).select(".todo-toggle-done").unwrap());
    assert_eq!(app.model(1).get("is_done"), Some(Value::Bool(false)));
    assert_eq!(app.select(".todo-count").content(), "3 left");
    assert!(app.item(1).has_class("is-active"));

    app.model(0).set("is_done", true).unwrap();
    assert_eq!(app.select(".todo-count").content(), "2 left");
    assert!(app.item(0).select(".todo-toggle-done").unwrap().checked());
}

#[test]
fn test_two_way_edit_round_trip() {
    let mut app = App::start(json!([{"id": 1}]));
    app.fetch();
    assert_eq!(app.model(0).get("text"), Some(Value::from("Untitled")));

    let edit = app.item(0).select(".todo-text-edit").unwrap();
    type_text(&edit, "Buy milk");
    assert_eq!(app.model(0).get("text"), Some(Value::from("Buy milk")));
    assert_eq!(app.item(0).select(".todo-text").unwrap().content(), "Buy milk");

    app.model(0).set("text", "Done").unwrap();
    assert_eq!(edit.value(), "Done");
}

#[test]
fn test_delegated_events_soft_delete_and_edit() {
    let mut app = App::start(three_todos());
    app.fetch();

    click(&app.item(2).select(".todo-delete").unwrap());
    assert_eq!(app.model(2).get("is_deleted"), Some(Value::Bool(true)));
    assert!(app.item(2).has_class("hidden"));
    assert_eq!(app.store.len(), 3);

    bubble(&app.item(0).select(".todo-text").unwrap(), "dblclick");
    assert!(app.item(0).has_class("is-editing"));
    assert!(!app.item(1).has_class("is-editing"));
}

#[test]
fn test_removing_a_model_removes_its_view() {
    let mut app = App::start(three_todos());
    app.fetch();

    let walk = app.model(1);
    app.store.remove(&walk);
    assert_eq!(app.select(".todo-list").children().len(), 2);
    assert_eq!(app.select(".todo-count").content(), "2 left");

    app.store.add_json(&json!({"text": "Read book"}));
    let last = app.item(2);
    assert_eq!(last.select(".todo-text").unwrap().content(), "Read book");
    assert_eq!(app.select(".todo-count").content(), "3 left");
}

#[test]
fn test_routes_exit_before_enter_and_move_primary() {
    let app = App::start(json!([]));
    let todos = app.todos_view();
    let root = todos.root().unwrap();
    assert!(root.has_class("filter-by-all"));
    assert!(root.has_class("is-primary"));

    app.cx.navigate_to("/filter/active");
    assert!(todos.is_destroyed());
    assert!(!root.has_class("is-primary"));
    let filtered = app.todos_view().root().unwrap();
    assert!(filtered.has_class("filter-by-active"));
    assert!(!filtered.has_class("filter-by-all"));
    assert!(filtered.has_class("is-primary"));

    app.router
        .go("About", &Params::new())
        .unwrap();
    assert!(!filtered.has_class("is-primary"));
    assert_eq!(app.cx.page().get("title"), Some(Value::from("About - My Todos")));
    assert_eq!(app.router.current_route().as_deref(), Some("About"));

    assert!(app.location.back());
    assert_eq!(app.router.current_location().as_deref(), Some("/filter/active"));
    assert!(app.select(".todo-list").children().is_empty());
    assert!(app.todos_view().root().unwrap().has_class("is-primary"));
    assert!(app.todos_view().root().unwrap().has_class("filter-by-active"));

    assert_eq!(
        *app.log.borrow(),
        vec![
            "enter /",
            "exit /",
            "enter /filter/active",
            "exit /filter/active",
            "enter /about",
            "exit /about",
            "enter /filter/active",
        ]
    );
}

#[test]
fn test_leaving_a_route_tears_its_view_down() {
    let mut app = App::start(three_todos());
    app.fetch();
    let todos = app.todos_view();
    let count = app.select(".todo-count");
    let list = app.select(".todo-list");
    assert_eq!(count.content(), "2 left");
    assert_eq!(app.store.live_count(), 1);

    app.cx.navigate_to("/about");
    assert!(todos.is_destroyed());
    assert_eq!(app.store.live_count(), 0);
    assert_eq!(app.model(0).attrs().subscriber_count("is_done"), 0);

    let rendered = list.children().len();
    app.model(0).set("is_done", true).unwrap();
    app.store.add_json(&json!({"text": "Read book"}));
    assert_eq!(count.content(), "2 left");
    assert_eq!(list.children().len(), rendered);

    let about = app.about.borrow().clone().unwrap();
    assert!(Rc::ptr_eq(&app.cx.primary().current().unwrap(), &about));
    assert!(app.location.back());
    assert!(about.is_destroyed());
    assert!(app.about.borrow().is_none());

    assert_eq!(app.store.live_count(), 1);
    assert_eq!(app.select(".todo-count").content(), "2 left");
    assert_eq!(app.select(".todo-list").children().len(), 4);
}

#[test]
fn test_unmatched_location_keeps_current_route() {
    let app = App::start(json!([]));
    app.cx.navigate_to("/nowhere");
    assert_eq!(app.location.current(), "/nowhere");
    assert_eq!(app.router.current_route().as_deref(), Some("Todos"));
    assert_eq!(app.log.borrow().len(), 1);
}

#[test]
fn test_stale_fetch_after_release_is_discarded() {
    let mut app = App::start(three_todos());
    assert_eq!(app.store.live_count(), 1);

    let pending = app.store.fetch().unwrap();
    assert_eq!(app.store.xhr_state(), XhrState::Loading);
    app.todos_view().destroy();
    assert_eq!(app.store.live_count(), 0);

    app.store.release();
    app.cx.spawn(pending).unwrap();
    app.pool.run_until_stalled();
    assert_eq!(app.store.len(), 0);
    assert!(app.store.fetch().is_err());
}

#[test]
fn test_failed_save_is_reflected_in_classes() {
    let mut pool = LocalPool::new();
    let cx = AppContext::in_memory(AppConfig::default(), Rc::new(pool.spawner()));

    let source = Rc::new(MemorySource::new());
    source.respond("/todos", Response::new(500, Json::Null));
    let shape = ModelShape::builder("Todo")
        .default("text", "Untitled")
        .default("is_done", false)
        .default("is_deleted", false)
        .default("is_editing", false)
        .resource("/todos")
        .source(source)
        .build();
    let todo = shape.create_default();

    let model: ObjectRef = todo.clone();
    let view = View::new(
        Rc::clone(cx.toolkit()),
        &todo_view_shape().unwrap(),
        ViewConfig::new().model(model),
    );
    let root = view.render().unwrap();
    assert!(root.has_class("xhr-idle"));

    cx.spawn(todo.save().unwrap()).unwrap();
    assert!(root.has_class("xhr-loading"));

    pool.run_until_stalled();
    assert_eq!(todo.status(), 500);
    assert!(root.has_class("xhr-error"));
    assert!(!root.has_class("xhr-loading"));
}
