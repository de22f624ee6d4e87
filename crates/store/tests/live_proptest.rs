//! Property-based tests for live sub-collections using proptest.

use proptest::prelude::*;
use std::rc::Rc;
use voodoo_core::{Object, Value};
use voodoo_store::{LiveCollection, Model, ModelShape, Predicate, Store, StoreShape};

#[derive(Clone, Debug)]
enum Op {
    Add(bool),
    Remove(usize),
    Flip(usize),
    Rename(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Add),
        (0usize..64).prop_map(Op::Remove),
        (0usize..64).prop_map(Op::Flip),
        (0usize..64).prop_map(Op::Rename),
    ]
}

fn is_done(model: &Model) -> bool {
    model.get("is_done") == Some(Value::Bool(true))
}

fn expected(store: &Store, done: bool) -> Vec<Rc<Model>> {
    store
        .models()
        .into_iter()
        .filter(|m| is_done(m) == done)
        .collect()
}

fn same_members(live: &LiveCollection, expected: &[Rc<Model>]) -> bool {
    let actual = live.models();
    actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, b)| Rc::ptr_eq(a, b))
}

fn apply(store: &Store, shape: &ModelShape, op: &Op) {
    match *op {
        Op::Add(done) => {
            store.add(shape.create([("is_done", Value::Bool(done))]));
        }
        Op::Remove(i) if !store.is_empty() => {
            store.remove_at(i % store.len());
        }
        Op::Flip(i) if !store.is_empty() => {
            let model = store.at(i % store.len()).unwrap();
            let done = is_done(&model);
            model.set("is_done", !done).unwrap();
        }
        Op::Rename(i) if !store.is_empty() => {
            let model = store.at(i % store.len()).unwrap();
            model.set("text", format!("renamed {}", i)).unwrap();
        }
        _ => {}
    }
}

proptest! {
    /// Live membership equals the filtered parent, in parent order, after
    /// every step.
    #[test]
    fn live_membership_matches_filter(
        initial in prop::collection::vec(any::<bool>(), 0..20),
        ops in prop::collection::vec(op(), 1..80)
    ) {
        let shape = ModelShape::builder("Todo")
            .default("text", "Untitled")
            .default("is_done", false)
            .build();
        let store = StoreShape::builder("Todos").build().create();
        for done in &initial {
            store.add(shape.create([("is_done", Value::Bool(*done))]));
        }

        let active = store.filter(Predicate::new().where_eq("is_done", false)).unwrap();
        let done = store.filter(Predicate::new().where_eq("is_done", true)).unwrap();

        for op in &ops {
            apply(&store, &shape, op);
            prop_assert!(same_members(&active, &expected(&store, false)));
            prop_assert!(same_members(&done, &expected(&store, true)));
            prop_assert_eq!(active.len() + done.len(), store.len());
            prop_assert_eq!(active.get("length"), Some(Value::Int(active.len() as i64)));
        }
    }

    /// Releasing the store stops every live collection from tracking.
    #[test]
    fn released_live_ignores_mutations(
        initial in prop::collection::vec(any::<bool>(), 1..20),
        ops in prop::collection::vec(op(), 1..40)
    ) {
        let shape = ModelShape::builder("Todo").default("is_done", false).build();
        let store = StoreShape::builder("Todos").build().create();
        for done in &initial {
            store.add(shape.create([("is_done", Value::Bool(*done))]));
        }
        let active = store.filter(Predicate::new().where_eq("is_done", false)).unwrap();
        store.release();

        for op in &ops {
            apply(&store, &shape, op);
        }
        prop_assert!(active.is_empty());
        for model in store.models() {
            prop_assert_eq!(model.attrs().subscriber_count("is_done"), 0);
        }
    }
}
