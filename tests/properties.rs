//! Property tests for diffing and projection.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use state_mirror::{diff, project, DiffNode, ShapeDescriptor};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-5i64..5).prop_map(Value::from),
        "[a-c]{0,2}".prop_map(Value::from),
    ];

    leaf.prop_recursive(4, 48, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::btree_map("[a-e]", inner, 0..5)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

fn arb_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-e]", arb_json(), 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

fn arb_shape() -> impl Strategy<Value = ShapeDescriptor> {
    let leaf = any::<bool>().prop_map(ShapeDescriptor::Leaf);
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop::collection::btree_map("[a-e0-3]", inner, 0..4).prop_map(ShapeDescriptor::Node)
    })
}

/// True if every location in `part` is present, with the same value, in `whole`.
fn is_subset(part: &DiffNode, whole: &DiffNode) -> bool {
    if part.is_empty() {
        return true;
    }
    match (part, whole) {
        (DiffNode::Value(p), DiffNode::Value(w)) => p == w,
        (DiffNode::Branch(children), DiffNode::Branch(_)) => children.iter().all(|(key, child)| {
            whole
                .get(key)
                .is_some_and(|whole_child| is_subset(child, whole_child))
        }),
        (DiffNode::Branch(children), DiffNode::Value(w)) => children.iter().all(|(key, child)| {
            let whole_child = match w {
                Value::Object(map) => map.get(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            whole_child.is_some_and(|wc| is_subset(child, &DiffNode::Value(wc.clone())))
        }),
        (DiffNode::Value(_), DiffNode::Branch(_)) => false,
    }
}

proptest! {
    #[test]
    fn diff_reconstructs_next(prev in arb_json(), next in arb_json()) {
        let delta = diff(&prev, &next);
        let mut state = prev.clone();
        delta.apply(&mut state);
        prop_assert_eq!(state, next);
    }

    #[test]
    fn diff_of_objects_reconstructs_next(prev in arb_object(), next in arb_object()) {
        let delta = diff(&prev, &next);
        let mut state = prev.clone();
        delta.apply(&mut state);
        prop_assert_eq!(state, next);
    }

    #[test]
    fn diff_of_identical_is_empty(state in arb_json()) {
        prop_assert!(diff(&state, &state).is_empty());
    }

    #[test]
    fn projection_is_subset(prev in arb_object(), next in arb_object(), shape in arb_shape()) {
        let delta = diff(&prev, &next);
        let projected = delta.project(&shape);
        prop_assert!(is_subset(&projected.updated, &delta.updated));
        prop_assert!(is_subset(&projected.deleted, &delta.deleted));
    }

    #[test]
    fn empty_shape_projects_nothing(prev in arb_json(), next in arb_json()) {
        let delta = diff(&prev, &next);
        prop_assert!(delta.project(&ShapeDescriptor::none()).is_empty());
    }

    #[test]
    fn full_shape_projects_everything(prev in arb_json(), next in arb_json()) {
        let delta = diff(&prev, &next);
        prop_assert_eq!(delta.project(&ShapeDescriptor::all()), delta);
    }

    #[test]
    fn untouched_shape_is_suppressed(prev in arb_object(), value in arb_json()) {
        // Only `changed` moves; a shape on another key never sees it.
        let mut prev = prev;
        if let Value::Object(map) = &mut prev {
            map.remove("watched");
            map.insert("changed".to_string(), json!("before"));
        }
        let mut next = prev.clone();
        next["changed"] = value;

        let shape = ShapeDescriptor::from_paths(["watched"]);
        prop_assert!(project(&diff(&prev, &next).updated, &shape).is_empty());
        prop_assert!(project(&diff(&prev, &next).deleted, &shape).is_empty());
    }
}

#[test]
fn concrete_example() {
    let prev = json!({"a": 1, "b": {"c": 2, "d": 3}});
    let next = json!({"a": 1, "b": {"c": 5}, "e": 6});
    let delta = diff(&prev, &next);

    assert_eq!(delta.updated.to_value(), json!({"b": {"c": 5}, "e": 6}));
    assert_eq!(delta.deleted.to_value(), json!({"b": {"d": 3}}));

    let shape: ShapeDescriptor = serde_json::from_value(json!({"b": {"c": true}})).unwrap();
    assert_eq!(project(&delta.updated, &shape).to_value(), json!({"b": {"c": 5}}));
    assert_eq!(project(&delta.deleted, &shape).to_value(), json!({}));
}
