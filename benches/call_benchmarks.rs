//! Benchmarks for binding and for the per-call path through bound functions.
//!
//! - Binding: a batch of descriptors through every stage
//! - Calls: a direct call, a conversion chain, the full handler stack
//!   with cache hits, and a variadic call
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use hostbind::pipeline::CallRecorder;
use hostbind::prelude::*;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

/// Call at the end of each benchmark iteration to flush profiling data.
#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

struct Celsius {
    degrees: f64,
}

fn add() -> FunctionDescriptor {
    FunctionDescriptor::new("add", |ctx: &mut CallContext| {
        let a: f64 = ctx.arg(0)?;
        let b: f64 = ctx.arg(1)?;
        ctx.set_return(a + b);
        Ok(())
    })
    .param("a", DataType::Float)
    .param("b", DataType::Float)
    .returns(DataType::Float)
}

fn to_fahrenheit() -> FunctionDescriptor {
    FunctionDescriptor::new("to_fahrenheit", |ctx: &mut CallContext| {
        let c: Native<Celsius> = ctx.arg(0)?;
        ctx.set_return(c.degrees * 9.0 / 5.0 + 32.0);
        Ok(())
    })
    .param("celsius", DataType::native::<Celsius>())
    .returns(DataType::Float)
}

fn cached_add() -> FunctionDescriptor {
    FunctionDescriptor::new("cached_add", |ctx: &mut CallContext| {
        let a: f64 = ctx.arg(0)?;
        let b: f64 = ctx.arg(1)?;
        ctx.set_return(a + b);
        Ok(())
    })
    .param("a", DataType::Float)
    .param("b", DataType::Float)
    .returns(DataType::Float)
    .with_attributes(
        Attributes::new()
            .with_flag(attr::LOGGING)
            .with_flag(attr::CACHE)
            .with_flag(attr::TIMING)
            .with_flag(attr::SUPPRESS_IN_DIALOG),
    )
}

fn sum() -> FunctionDescriptor {
    FunctionDescriptor::new("sum", |ctx: &mut CallContext| {
        let values: Vec<f64> = ctx.arg(0)?;
        ctx.set_return(values.iter().sum::<f64>());
        Ok(())
    })
    .with_param(
        ParamDescriptor::new("values", DataType::array(DataType::Float))
            .with_flags(ParamFlags::PARAMS),
    )
    .returns(DataType::Float)
}

fn conversions() -> ConversionConfig {
    ConversionConfig::new().add_param_conversion(
        DataType::Float,
        DataType::native::<Celsius>(),
        |degrees: f64| Native::new(Celsius { degrees }),
    )
}

fn bound_host() -> Arc<LocalHost> {
    let host = Arc::new(LocalHost::new());
    let services: Arc<dyn HostServices> = host.clone();
    let execution = ExecutionConfig::new()
        .with_logging(Arc::new(TracingRecorder) as Arc<dyn CallRecorder>)
        .with_caching(CachePolicy::BestEffort)
        .with_timing(Arc::new(TimingLog::new()))
        .with_suppression(SuppressInDialogHandler::new(Arc::clone(&services)));
    let report = Pipeline::new(services)
        .with_conversions(conversions())
        .with_execution(execution)
        .run([add(), to_fahrenheit(), cached_add(), sum()], host.as_ref());
    assert!(report.is_success());
    host
}

fn benchmark_binding(c: &mut Criterion) {
    setup_profiler();
    let mut group = c.benchmark_group("binding");
    group.throughput(Throughput::Elements(4));

    group.bench_function("four_functions", |b| {
        b.iter(|| {
            let host = Arc::new(LocalHost::new());
            let report = Pipeline::new(host.clone())
                .with_conversions(conversions())
                .run([add(), to_fahrenheit(), cached_add(), sum()], host.as_ref());
            black_box(report);
            end_profiling_frame();
        });
    });

    group.finish();
}

fn benchmark_calls(c: &mut Criterion) {
    let host = bound_host();
    let mut group = c.benchmark_group("calls");

    group.bench_function("direct", |b| {
        b.iter(|| black_box(host.call("add", vec![Dynamic::Float(1.0), Dynamic::Float(2.0)])));
    });

    group.bench_function("conversion", |b| {
        b.iter(|| black_box(host.call("to_fahrenheit", vec![Dynamic::Float(21.5)])));
    });

    group.bench_function("handlers_cache_hit", |b| {
        b.iter(|| {
            black_box(host.call("cached_add", vec![Dynamic::Float(1.0), Dynamic::Float(2.0)]))
        });
    });

    for count in [4usize, 64] {
        let args: Vec<Dynamic> = (0..count).map(|i| Dynamic::Float(i as f64)).collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("variadic_{count}"), |b| {
            b.iter(|| black_box(host.call("sum", args.clone())));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_binding, benchmark_calls);
criterion_main!(benches);
