//! Wire-level round trips through the public API only.

use stash_client::{Condition, KeyId, Value};

#[test]
fn int_value_round_trips_through_encode_decode() {
    let value = Value::Int(42);
    let mut buf = Vec::new();
    value.serialize(&mut buf).unwrap();
    assert_eq!(Value::deserialize(&buf[5..]).unwrap(), value);
}

#[test]
fn string_value_round_trips_through_encode_decode() {
    let value = Value::str("hi");
    let mut buf = Vec::new();
    value.serialize(&mut buf).unwrap();
    assert_eq!(Value::deserialize(&buf[5..]).unwrap(), value);
}

#[test]
fn and_of_equals_and_exists_round_trips() {
    let tree = Condition::equals(KeyId::new(5).unwrap(), Value::Int(1))
        .and(Condition::exists(KeyId::new(7).unwrap()));
    let mut buf = Vec::new();
    tree.serialize(&mut buf).unwrap();
    assert_eq!(Condition::deserialize(&buf).unwrap(), tree);
}
