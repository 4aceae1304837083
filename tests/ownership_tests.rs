//! Ownership transfer, borrowing, detach and explicit destruction.

mod harness;

use std::rc::Rc;

use crossbind::host::local::LocalHost;
use crossbind::{BindingError, Bridge, ClassBuilder, HostRuntime, Value};
use harness::{buffer_id, fixture, point_id, Point};

#[test]
fn owned_round_trip_destroys_exactly_once() {
    let mut fx = fixture();
    // Native code creates a point and hands it to the host with
    // ownership.
    let obj = fx.native_point(3, 4);
    let wrapper = match fx.bridge.expose_object(obj, true, false).unwrap() {
        Value::Object(h) => h,
        other => panic!("expected wrapper, got {other}"),
    };
    assert_eq!(
        fx.bridge.call_method(wrapper, "x", &[]).unwrap(),
        Value::Int(3)
    );

    // The wrapper owns the native lifetime: collecting it destroys the
    // object, exactly once.
    fx.bridge.host_collected(wrapper);
    assert_eq!(fx.bridge.instances().destroyed_count(point_id()), 1);
    assert_eq!(fx.bridge.instances().live_count(), 0);
}

#[test]
fn borrowed_wrapper_aliases_and_survives_collection() {
    let mut fx = fixture();
    let obj = fx.native_point(1, 1);
    let wrapper = match fx.bridge.expose_object(obj, false, false).unwrap() {
        Value::Object(h) => h,
        other => panic!("expected wrapper, got {other}"),
    };

    // Mutation through the wrapper is visible to the native holder.
    fx.bridge
        .call_method(wrapper, "shift", &[Value::Int(9), Value::Int(0)])
        .unwrap();
    assert_eq!(
        fx.bridge.instances().get_as::<Point>(obj),
        Some(&Point { x: 10, y: 1 })
    );

    // Exposing the same object again reuses the wrapper identity.
    assert_eq!(
        fx.bridge.expose_object(obj, false, false).unwrap(),
        Value::Object(wrapper)
    );

    // A borrowed wrapper dying does not touch the native object.
    fx.bridge.host_collected(wrapper);
    assert_eq!(fx.bridge.instances().destroyed_count(point_id()), 0);
    assert!(fx.bridge.instances().is_alive(obj));
}

#[test]
fn detach_frees_owned_object_and_unbinds_the_wrapper() {
    let mut fx = fixture();
    let wrapper = fx.new_point(5, 6);
    fx.bridge.detach(wrapper).unwrap();
    assert_eq!(fx.bridge.instances().destroyed_count(point_id()), 1);

    // The wrapper is unbound, not dead: the next dispatch lazily binds a
    // fresh default-constructed point.
    assert_eq!(
        fx.bridge.call_method(wrapper, "x", &[]).unwrap(),
        Value::Int(0)
    );
    assert_eq!(fx.bridge.instances().live_count(), 1);
}

#[test]
fn destroy_default_constructs_a_never_bound_wrapper() {
    let mut fx = fixture();
    // Destroying a wrapper that was never used still runs the full
    // lifecycle: the object is created lazily, then destroyed.
    let wrapper = fx.host.create_object(fx.host_point);
    fx.bridge.destroy_object(wrapper).unwrap();
    assert_eq!(fx.bridge.instances().destroyed_count(point_id()), 1);

    let err = fx.bridge.call_method(wrapper, "x", &[]).unwrap_err();
    assert!(matches!(err.root(), BindingError::ObjectDestroyed { .. }));
}

#[test]
fn destroying_an_unbound_wrapper_needs_a_factory() {
    let host = Rc::new(LocalHost::new());
    let host_token = host.define_class("Token", None);
    let mut bridge = Bridge::new(Rc::clone(&host));
    bridge.register_class(ClassBuilder::new("Token").build(), host_token);

    let wrapper = host.create_object(host_token);
    let err = bridge.destroy_object(wrapper).unwrap_err();
    assert_eq!(
        err,
        BindingError::CannotDefaultCreate {
            class: "Token".to_string(),
        }
    );
}

#[test]
fn explicit_destroy_requires_ownership_or_permission() {
    let mut fx = fixture();
    let obj = fx.native_point(0, 0);
    let wrapper = match fx.bridge.expose_object(obj, false, false).unwrap() {
        Value::Object(h) => h,
        other => panic!("expected wrapper, got {other}"),
    };

    let err = fx.bridge.destroy_object(wrapper).unwrap_err();
    assert!(matches!(
        err,
        BindingError::CannotDestroyExplicitly { .. }
    ));
    assert!(fx.bridge.instances().is_alive(obj));

    fx.bridge.allow_destroy(wrapper, true).unwrap();
    fx.bridge.destroy_object(wrapper).unwrap();
    assert!(!fx.bridge.instances().is_alive(obj));

    // Destroying again reports the dead object instead of double-freeing.
    let err = fx.bridge.destroy_object(wrapper).unwrap_err();
    assert!(matches!(err, BindingError::ObjectDestroyed { .. }));
    assert_eq!(fx.bridge.instances().destroyed_count(point_id()), 1);
}

#[test]
fn lazy_default_construction_on_first_dispatch() {
    let mut fx = fixture();
    // A wrapper of a bound class that was never constructed gets its
    // native object from the class factory on first use.
    let wrapper = fx.host.create_object(fx.host_point);
    assert_eq!(
        fx.bridge.call_method(wrapper, "x", &[]).unwrap(),
        Value::Int(0)
    );
    assert_eq!(fx.bridge.instances().live_count(), 1);
}

#[test]
fn implicit_construction_temporaries_die_with_the_call() {
    let mut fx = fixture();
    let wrapper = fx.new_point(10, 20);

    // The tuple becomes a temporary Point for the duration of the call.
    let sum = fx
        .bridge
        .call_method(
            wrapper,
            "plus",
            &[Value::List(vec![Value::Int(1), Value::Int(2)])],
        )
        .unwrap();
    let sum_wrapper = match sum {
        Value::Object(h) => h,
        other => panic!("expected wrapper, got {other}"),
    };
    assert_eq!(
        fx.bridge.call_method(sum_wrapper, "x", &[]).unwrap(),
        Value::Int(11)
    );
    assert_eq!(
        fx.bridge.call_method(sum_wrapper, "y", &[]).unwrap(),
        Value::Int(22)
    );
    // Exactly the temporary was destroyed; receiver and result live on.
    assert_eq!(fx.bridge.instances().destroyed_count(point_id()), 1);
    assert_eq!(fx.bridge.instances().live_count(), 2);
}

#[test]
fn tuple_of_wrong_arity_has_no_constructor() {
    let mut fx = fixture();
    let wrapper = fx.new_point(0, 0);
    let err = fx
        .bridge
        .call_method(wrapper, "plus", &[Value::List(vec![Value::Int(1); 4])])
        .unwrap_err();
    match err.root() {
        BindingError::NoSuchMethod { .. } => {}
        other => panic!("expected a resolution failure, got {other:?}"),
    }

    // Constructing directly with the wrong arity names the real problem.
    let fresh = fx.host.create_object(fx.host_point);
    let err = fx
        .bridge
        .construct(fresh, point_id(), &vec![Value::Int(1); 4])
        .unwrap_err();
    assert_eq!(
        err,
        BindingError::NoCompatibleConstructor {
            class: "Point".to_string(),
            arity: 4,
        }
    );
}

#[test]
fn buffer_dispose_marks_the_wrapper_destroyed() {
    let mut fx = fixture();
    let wrapper = fx.host.create_object(fx.host_buffer);
    fx.bridge.construct(wrapper, buffer_id(), &[]).unwrap();
    fx.bridge
        .call_method(wrapper, "push", &[Value::Int(7)])
        .unwrap();
    assert_eq!(
        fx.bridge.call_method(wrapper, "len", &[]).unwrap(),
        Value::Int(1)
    );

    // The native body destroys the buffer; the wrapper observes it.
    fx.bridge.call_method(wrapper, "dispose", &[]).unwrap();
    let err = fx.bridge.call_method(wrapper, "len", &[]).unwrap_err();
    assert!(matches!(err.root(), BindingError::ObjectDestroyed { .. }));
    assert_eq!(fx.bridge.instances().destroyed_count(buffer_id()), 1);
}
