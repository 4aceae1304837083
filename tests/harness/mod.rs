//! Shared fixture for the integration tests: a [`LocalHost`] with a small
//! bound class library (a value-like `Point`, a managed `Buffer`, and a
//! `Shape`/`Circle` hierarchy with a callback and a signal).

// Not every test crate uses every helper.
#![allow(dead_code)]

use std::rc::Rc;

use crossbind::host::local::LocalHost;
use crossbind::{
    ArgType, BasicType, Bridge, CallFrame, ClassBuilder, ClassFlags, ClassId, HostHandle,
    HostRuntime, LifecycleEvent, Value,
};

#[derive(Default, Clone, Debug, PartialEq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

#[derive(Default, Clone)]
pub struct Buffer {
    pub data: Vec<u8>,
}

#[derive(Default, Clone)]
pub struct Shape {
    pub moves: i64,
}

#[derive(Default, Clone)]
pub struct Circle {
    pub radius: f64,
}

pub fn point_id() -> ClassId {
    ClassId::from_name("Point")
}

pub fn buffer_id() -> ClassId {
    ClassId::from_name("Buffer")
}

pub fn shape_id() -> ClassId {
    ClassId::from_name("Shape")
}

pub fn circle_id() -> ClassId {
    ClassId::from_name("Circle")
}

pub struct Fx {
    pub host: Rc<LocalHost>,
    pub bridge: Bridge,
    pub host_point: HostHandle,
    pub host_buffer: HostHandle,
    pub host_shape: HostHandle,
    pub host_circle: HostHandle,
}

fn long() -> ArgType {
    ArgType::scalar(BasicType::Long)
}

fn string() -> ArgType {
    ArgType::scalar(BasicType::String)
}

fn point_class() -> crossbind::ClassDescriptor {
    ClassBuilder::new("Point")
        .factory(|| Box::new(Point::default()))
        .cloner(|any| Box::new(any.downcast_ref::<Point>().expect("point payload").clone()))
        .constructor(&[], |frame: &mut CallFrame| {
            frame.return_new(point_id(), Point::default());
            Ok(())
        })
        .constructor(&[long(), long()], |frame: &mut CallFrame| {
            let x = frame.args.read_int()?;
            let y = frame.args.read_int()?;
            frame.return_new(point_id(), Point { x, y });
            Ok(())
        })
        .const_method("x", &[], long(), |frame: &mut CallFrame| {
            let x = frame.this_as::<Point>()?.x;
            frame.ret.write_int(x);
            Ok(())
        })
        .const_method("y", &[], long(), |frame: &mut CallFrame| {
            let y = frame.this_as::<Point>()?.y;
            frame.ret.write_int(y);
            Ok(())
        })
        .method("shift", &[long(), long()], ArgType::void(), |frame: &mut CallFrame| {
            let dx = frame.args.read_int()?;
            let dy = frame.args.read_int()?;
            let p = frame.this_mut_as::<Point>()?;
            p.x += dx;
            p.y += dy;
            Ok(())
        })
        // Takes another point by const reference; a host tuple argument
        // exercises implicit construction.
        .const_method(
            "plus",
            &[ArgType::object(point_id()).cref()],
            ArgType::object(point_id()).pass_obj(),
            |frame: &mut CallFrame| {
                let other = frame.args.read_object()?.ok_or_else(|| {
                    crossbind::BindingError::TypeMismatch {
                        detail: "plus needs a point".to_string(),
                    }
                })?;
                let rhs = frame
                    .instances
                    .get_as::<Point>(other.obj)
                    .cloned()
                    .ok_or_else(|| crossbind::BindingError::ObjectDestroyed {
                        class: "Point".to_string(),
                    })?;
                let lhs = frame.this_as::<Point>()?.clone();
                frame.return_new(
                    point_id(),
                    Point {
                        x: lhs.x + rhs.x,
                        y: lhs.y + rhs.y,
                    },
                );
                Ok(())
            },
        )
        // Takes ownership of its argument and destroys it, the way a
        // native sink would.
        .method(
            "swallow",
            &[ArgType::object(point_id()).pass_obj()],
            ArgType::void(),
            |frame: &mut CallFrame| {
                let slot = frame.args.read_object()?.ok_or_else(|| {
                    crossbind::BindingError::TypeMismatch {
                        detail: "swallow needs a point".to_string(),
                    }
                })?;
                frame.emit_for(slot.obj, LifecycleEvent::Destroyed);
                Ok(())
            },
        )
        // Overload pair for two-pass resolution tests.
        .const_method("which", &[ArgType::scalar(BasicType::Int)], string(), |frame: &mut CallFrame| {
            let _ = frame.args.read_int()?;
            frame.ret.write(crossbind::Slot::Str(Box::new(
                crossbind::adaptors::HostString("int".to_string()),
            )));
            Ok(())
        })
        .const_method(
            "which",
            &[ArgType::scalar(BasicType::Double)],
            string(),
            |frame: &mut CallFrame| {
                let _ = frame.args.read_float()?;
                frame.ret.write(crossbind::Slot::Str(Box::new(
                    crossbind::adaptors::HostString("double".to_string()),
                )));
                Ok(())
            },
        )
        .build()
}

fn buffer_class() -> crossbind::ClassDescriptor {
    ClassBuilder::new("Buffer")
        .flags(ClassFlags::MANAGED)
        .factory(|| Box::new(Buffer::default()))
        .constructor(&[], |frame: &mut CallFrame| {
            frame.return_new(buffer_id(), Buffer::default());
            Ok(())
        })
        .const_method("len", &[], long(), |frame: &mut CallFrame| {
            let len = frame.this_as::<Buffer>()?.data.len() as i64;
            frame.ret.write_int(len);
            Ok(())
        })
        .method("push", &[long()], ArgType::void(), |frame: &mut CallFrame| {
            let byte = frame.args.read_int()? as u8;
            frame.this_mut_as::<Buffer>()?.data.push(byte);
            Ok(())
        })
        // Lifecycle controls: native code takes or releases ownership, or
        // destroys the buffer outright.
        .method("keep", &[], ArgType::void(), |frame: &mut CallFrame| {
            frame.emit(LifecycleEvent::Keep);
            Ok(())
        })
        .method("release", &[], ArgType::void(), |frame: &mut CallFrame| {
            frame.emit(LifecycleEvent::Release);
            Ok(())
        })
        .method("dispose", &[], ArgType::void(), |frame: &mut CallFrame| {
            frame.emit(LifecycleEvent::Destroyed);
            Ok(())
        })
        .build()
}

fn shape_class() -> crossbind::ClassDescriptor {
    ClassBuilder::new("Shape")
        .factory(|| Box::new(Shape::default()))
        .constructor(&[], |frame: &mut CallFrame| {
            frame.return_new(shape_id(), Shape::default());
            Ok(())
        })
        .callback_with_default("describe", &[], string(), |frame: &mut CallFrame| {
            frame.ret.write(crossbind::Slot::Str(Box::new(
                crossbind::adaptors::HostString("shape".to_string()),
            )));
            Ok(())
        })
        .callback("on_resized", &[long()], ArgType::void())
        .signal("moved", &[long()], long())
        .build()
}

fn circle_class() -> crossbind::ClassDescriptor {
    ClassBuilder::new("Circle")
        .base(shape_id())
        .factory(|| Box::new(Circle::default()))
        .constructor(&[], |frame: &mut CallFrame| {
            frame.return_new(circle_id(), Circle::default());
            Ok(())
        })
        .build()
}

pub fn fixture() -> Fx {
    let host = Rc::new(LocalHost::new());
    let host_point = host.define_class("Point", None);
    let host_buffer = host.define_class("Buffer", None);
    let host_shape = host.define_class("Shape", None);
    let host_circle = host.define_class("Circle", Some(host_shape));

    let mut bridge = Bridge::new(Rc::clone(&host));
    bridge.register_class(point_class(), host_point);
    bridge.register_class(buffer_class(), host_buffer);
    bridge.register_class(shape_class(), host_shape);
    bridge.register_class(circle_class(), host_circle);

    Fx {
        host,
        bridge,
        host_point,
        host_buffer,
        host_shape,
        host_circle,
    }
}

impl Fx {
    /// Construct a Point wrapper through the normal host path.
    pub fn new_point(&mut self, x: i64, y: i64) -> HostHandle {
        let wrapper = self.host.create_object(self.host_point);
        self.bridge
            .construct(wrapper, point_id(), &[Value::Int(x), Value::Int(y)])
            .expect("point construction");
        wrapper
    }

    /// Create a native point directly, as native code would.
    pub fn native_point(&mut self, x: i64, y: i64) -> crossbind::ObjId {
        self.bridge
            .instances_mut()
            .create(point_id(), Box::new(Point { x, y }))
    }

    pub fn callable_handle(&self, v: Value) -> HostHandle {
        match v {
            Value::Callable(h) => h,
            other => panic!("expected a callable, got {other}"),
        }
    }
}
