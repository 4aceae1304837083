//! Performance benchmarks for the marshaling boundary.
//!
//! The suite measures full round trips through the bridge:
//! - Scalar calls: dispatch plus argument/return serialization
//! - Container calls: vector and string copies into adaptors
//! - Object lifecycle: construct, expose, collect
//!
//! Every benchmark goes through `Bridge::call_method`, so the numbers
//! include overload resolution, compatibility testing and heap drain.

use std::hint::black_box;
use std::rc::Rc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use crossbind::host::local::LocalHost;
use crossbind::{
    ArgType, BasicType, Bridge, CallFrame, ClassBuilder, ClassId, HostHandle, HostRuntime, Value,
};

#[derive(Default, Clone)]
struct Point {
    x: i64,
    y: i64,
}

fn point_id() -> ClassId {
    ClassId::from_name("Point")
}

fn long() -> ArgType {
    ArgType::scalar(BasicType::Long)
}

fn bench_bridge() -> (Rc<LocalHost>, Bridge, HostHandle) {
    let host = Rc::new(LocalHost::new());
    let host_point = host.define_class("Point", None);
    let mut bridge = Bridge::new(Rc::clone(&host));

    let desc = ClassBuilder::new("Point")
        .factory(|| Box::new(Point::default()))
        .cloner(|any| Box::new(any.downcast_ref::<Point>().unwrap().clone()))
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
        .method("shift", &[long(), long()], ArgType::void(), |frame: &mut CallFrame| {
            let dx = frame.args.read_int()?;
            let dy = frame.args.read_int()?;
            let p = frame.this_mut_as::<Point>()?;
            p.x += dx;
            p.y += dy;
            Ok(())
        })
        .const_method(
            "which",
            &[ArgType::scalar(BasicType::Int)],
            long(),
            |frame: &mut CallFrame| {
                let v = frame.args.read_int()?;
                frame.ret.write_int(v);
                Ok(())
            },
        )
        .const_method(
            "which",
            &[ArgType::scalar(BasicType::Double)],
            long(),
            |frame: &mut CallFrame| {
                let v = frame.args.read_float()?;
                frame.ret.write_int(v as i64);
                Ok(())
            },
        )
        .const_method(
            "sum",
            &[ArgType::vector(long()).cref()],
            long(),
            |frame: &mut CallFrame| {
                let vec = frame.args.read_vector()?;
                let mut total = 0i64;
                for item in vec.to_list() {
                    if let Value::Int(v) = item {
                        total += v;
                    }
                }
                frame.ret.write_int(total);
                Ok(())
            },
        )
        .const_method(
            "label",
            &[ArgType::scalar(BasicType::String)],
            ArgType::scalar(BasicType::String),
            |frame: &mut CallFrame| {
                let s = frame.args.read_string()?;
                frame.ret.write(crossbind::Slot::Str(Box::new(
                    crossbind::adaptors::HostString(s),
                )));
                Ok(())
            },
        )
        .build();
    bridge.register_class(desc, host_point);

    let wrapper = host.create_object(host_point);
    bridge
        .construct(wrapper, point_id(), &[Value::Int(1), Value::Int(2)])
        .unwrap();
    (host, bridge, wrapper)
}

/// Scalar round trips: dispatch cost with trivial payloads.
fn scalar_benchmarks(c: &mut Criterion) {
    let (_host, mut bridge, point) = bench_bridge();

    let mut group = c.benchmark_group("marshal/scalars");

    group.bench_function("getter_no_args", |b| {
        b.iter(|| black_box(bridge.call_method(point, "x", &[]).unwrap()));
    });

    group.bench_function("two_int_args", |b| {
        let args = [Value::Int(1), Value::Int(-1)];
        b.iter(|| black_box(bridge.call_method(point, "shift", black_box(&args)).unwrap()));
    });

    group.bench_function("overload_strict_pass", |b| {
        let args = [Value::Int(5)];
        b.iter(|| black_box(bridge.call_method(point, "which", black_box(&args)).unwrap()));
    });

    group.bench_function("overload_loose_pass", |b| {
        // Falls out of the 32-bit range, resolving on the second pass.
        let args = [Value::Int(1 << 40)];
        b.iter(|| {
            let out = bridge.call_method(point, "which", black_box(&args)).unwrap();
            bridge.diagnostics_mut().drain();
            black_box(out)
        });
    });

    group.finish();
}

/// Container round trips: copy cost grows with payload size.
fn container_benchmarks(c: &mut Criterion) {
    let (_host, mut bridge, point) = bench_bridge();

    let mut group = c.benchmark_group("marshal/containers");

    for size in [4usize, 64, 1024] {
        let list = Value::List((0..size as i64).map(Value::Int).collect());
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("vector_{size}"), |b| {
            b.iter(|| {
                black_box(
                    bridge
                        .call_method(point, "sum", std::slice::from_ref(&list))
                        .unwrap(),
                )
            });
        });
    }

    let text = "x".repeat(256);
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("string_256", |b| {
        let args = [Value::Str(text.clone())];
        b.iter(|| black_box(bridge.call_method(point, "label", black_box(&args)).unwrap()));
    });

    group.finish();
}

/// Object lifecycle: construction, exposure and collection.
fn lifecycle_benchmarks(c: &mut Criterion) {
    let (host, mut bridge, seed) = bench_bridge();
    let host_point = host.class_of(seed);

    let mut group = c.benchmark_group("marshal/lifecycle");

    group.bench_function("construct_and_collect", |b| {
        b.iter(|| {
            let wrapper = host.create_object(host_point);
            bridge
                .construct(wrapper, point_id(), &[Value::Int(3), Value::Int(4)])
                .unwrap();
            bridge.host_collected(wrapper);
            black_box(wrapper)
        });
    });

    group.bench_function("expose_borrowed_reuse", |b| {
        let obj = bridge
            .instances_mut()
            .create(point_id(), Box::new(Point { x: 1, y: 2 }));
        // First exposure creates the wrapper; iterations hit the reuse path.
        let first = bridge.expose_object(obj, false, false).unwrap();
        black_box(first);
        b.iter(|| black_box(bridge.expose_object(obj, false, false).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    scalar_benchmarks,
    container_benchmarks,
    lifecycle_benchmarks
);

criterion_main!(benches);
