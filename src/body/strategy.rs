//! proptest strategies for generated bodies.

use crate::body::value::{Body, Number, Object, Value};

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;

/// Keys the body language writes bare.
pub(crate) const KEY: &str = "[a-zA-Z_][a-zA-Z0-9_]{0,8}";

fn number() -> impl Strategy<Value = Number> {
    prop_oneof![
        any::<i128>().prop_map(Number::Integer),
        any::<f64>()
            .prop_filter("finite", |x| x.is_finite())
            .prop_map(Number::Float),
    ]
}

pub(crate) fn value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::Boolean),
        number().prop_map(Value::Number),
        any::<String>().prop_map(Value::Text),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Sequence),
            btree_map(KEY, inner, 0..4).prop_map(Value::Object),
        ]
    })
}

pub(crate) fn object() -> impl Strategy<Value = Object> {
    btree_map(KEY, value(), 0..5)
}

pub(crate) fn body() -> impl Strategy<Value = Body> {
    (object(), btree_map(KEY, value(), 0..3)).prop_map(|(body, opts)| Body { body, opts })
}
