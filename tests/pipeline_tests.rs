//! End-to-end behavior of the binding stages through a local host.


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hostbind::pipeline::{CallRecorder, ExecutionHandler, FunctionCall, standard};
use hostbind::prelude::*;
use test_harness::{BindHarness, num, text};

// ============================================================================
// Conversions
// ============================================================================

#[derive(Debug)]
struct Wrapped {
    text: String,
}

#[derive(Debug)]
struct Shouted {
    inner: Wrapped,
}

fn t1() -> DataType {
    DataType::native::<Wrapped>()
}

fn t2() -> DataType {
    DataType::native::<Shouted>()
}

fn string_to_t1(config: ConversionConfig) -> ConversionConfig {
    config.add_param_conversion(DataType::String, t1(), |text: String| {
        Native::new(Wrapped { text })
    })
}

fn t1_to_t2(config: ConversionConfig) -> ConversionConfig {
    config.add_param_conversion(t1(), t2(), |w: Native<Wrapped>| {
        Native::new(Shouted {
            inner: Wrapped {
                text: w.text.to_uppercase(),
            },
        })
    })
}

fn shout() -> FunctionDescriptor {
    FunctionDescriptor::new("shout", |ctx: &mut CallContext| {
        let value: Native<Shouted> = ctx.arg(0)?;
        ctx.set_return(format!("{}!", value.inner.text));
        Ok(())
    })
    .param("value", t2())
    .returns(DataType::String)
}

#[test]
fn innermost_first_rules_reach_the_host_type() {
    let config = string_to_t1(t1_to_t2(ConversionConfig::new()));
    let harness = BindHarness::new().configure(|p| p.with_conversions(config));
    harness.bind_ok([shout()]);

    let bound = harness.host.function("shout").unwrap();
    assert_eq!(bound.params()[0].data_type, DataType::String);
    assert_eq!(harness.call("shout", vec![text("hey")]), text("HEY!"));
}

#[test]
fn declaration_order_rules_leave_the_parameter_unregistrable() {
    let config = t1_to_t2(string_to_t1(ConversionConfig::new()));
    let harness = BindHarness::new().configure(|p| p.with_conversions(config));
    let report = harness.bind([shout()]);

    match report.failure("shout") {
        Some(BindError::NonHostType { data_type, .. }) => assert_eq!(*data_type, t1()),
        other => panic!("expected NonHostType, got {other:?}"),
    }
    assert!(!harness.host.is_registered("shout"));
}

#[test]
fn cycles_fail_only_their_function() {
    let a = DataType::named("A");
    let b = DataType::named("B");
    let config = ConversionConfig::new()
        .add_param_conversion(b.clone(), a.clone(), |v: Dynamic| v)
        .add_param_conversion(a.clone(), b, |v: Dynamic| v);
    let looping = FunctionDescriptor::new("looping", |_: &mut CallContext| Ok(())).param("x", a);
    let fine = FunctionDescriptor::new("fine", |ctx: &mut CallContext| {
        ctx.set_return(1i64);
        Ok(())
    })
    .returns(DataType::Int);

    let harness = BindHarness::new().configure(|p| p.with_conversions(config));
    let report = harness.bind([looping, fine]);

    assert_eq!(report.registered, vec!["fine"]);
    assert!(matches!(
        report.failure("looping"),
        Some(BindError::ConversionCycle { .. })
    ));
}

// ============================================================================
// Execution handlers
// ============================================================================

fn expensive(calls: &Arc<AtomicUsize>) -> FunctionDescriptor {
    let calls = Arc::clone(calls);
    FunctionDescriptor::new("expensive", move |ctx: &mut CallContext| {
        calls.fetch_add(1, Ordering::SeqCst);
        let x: f64 = ctx.arg(0)?;
        ctx.set_return(x + 1.0);
        Ok(())
    })
    .param("x", DataType::Float)
    .returns(DataType::Float)
    .with_attributes(
        Attributes::new()
            .with_flag(attr::LOGGING)
            .with_int(attr::CACHE, 60)
            .with_flag(attr::TIMING),
    )
}

#[test]
fn cache_hits_are_logged_but_not_timed() {
    let recorder = Arc::new(MemoryRecorder::new());
    let timing = Arc::new(TimingLog::new());
    let harness = BindHarness::new();
    let execution = ExecutionConfig::standard(
        Arc::clone(&recorder) as Arc<dyn CallRecorder>,
        Arc::clone(&timing),
        harness.services(),
    );
    let harness = harness.configure(|p| p.with_execution(execution));
    let calls = Arc::new(AtomicUsize::new(0));
    harness.bind_ok([expensive(&calls)]);

    assert_eq!(harness.call("expensive", vec![num(1.0)]), num(2.0));
    assert_eq!(harness.call("expensive", vec![num(1.0)]), num(2.0));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.len(), 2);
    assert_eq!(timing.snapshot("expensive").unwrap().calls, 1);
}

#[test]
fn suppression_applies_only_in_the_restricted_context() {
    let harness = BindHarness::new();
    let execution = ExecutionConfig::new()
        .with_suppression(SuppressInDialogHandler::new(harness.services()));
    let harness = harness.configure(|p| p.with_execution(execution));
    let lookup = FunctionDescriptor::new("lookup", |_: &mut CallContext| {
        Err(CallError::failed("service unavailable"))
    })
    .returns(DataType::Object)
    .with_attributes(Attributes::new().with_flag(attr::SUPPRESS_IN_DIALOG));
    harness.bind_ok([lookup]);

    assert_eq!(harness.call("lookup", vec![]), Dynamic::Error(HostError::Value));
    harness.host.set_restricted(true);
    assert_eq!(harness.call("lookup", vec![]), Dynamic::Empty);
    harness.host.set_restricted(false);
    assert_eq!(harness.call("lookup", vec![]), Dynamic::Error(HostError::Value));
}

#[test]
fn custom_selectors_wrap_inside_earlier_ones() {
    struct Tag(&'static str);
    impl ExecutionHandler for Tag {
        fn after(&self, call: &mut FunctionCall) {
            if let Some(Ok(Dynamic::String(s))) = call.outcome() {
                let tagged = format!("{}{}", s, self.0);
                call.set_result(Dynamic::String(tagged));
            }
        }
    }

    let execution = ExecutionConfig::new()
        .add_selector(|_: &FunctionDescriptor| Some(Arc::new(Tag("<outer")) as Arc<dyn ExecutionHandler>))
        .add_selector(|_: &FunctionDescriptor| Some(Arc::new(Tag("<inner")) as Arc<dyn ExecutionHandler>));
    let harness = BindHarness::new().configure(|p| p.with_execution(execution));
    let hello = FunctionDescriptor::new("hello", |ctx: &mut CallContext| {
        ctx.set_return("hi");
        Ok(())
    })
    .returns(DataType::String);
    harness.bind_ok([hello]);

    assert_eq!(harness.call("hello", vec![]), text("hi<inner<outer"));
}

// ============================================================================
// Async
// ============================================================================

fn slow_double() -> FunctionDescriptor {
    FunctionDescriptor::new("slow_double", |ctx: &mut CallContext| {
        let x: f64 = ctx.arg(0)?;
        std::thread::sleep(Duration::from_millis(10));
        ctx.set_return(x * 2.0);
        Ok(())
    })
    .param("x", DataType::Float)
    .returns(DataType::task(DataType::Float))
}

#[test]
fn emulated_async_round_trip() {
    let harness = BindHarness::new();
    harness.bind_ok([slow_double()]);

    let bound = harness.host.function("slow_double").unwrap();
    assert_eq!(bound.return_type(), &DataType::Object);
    assert_eq!(bound.convention(), CallConvention::EmulatedAsync);

    assert_eq!(harness.call_until_ready("slow_double", vec![num(4.0)]), num(8.0));
    // Observed once; the next call starts over.
    assert_eq!(
        harness.call("slow_double", vec![num(4.0)]),
        Dynamic::Error(HostError::NA)
    );
    assert!(harness.host.wait_ready("slow_double", Duration::from_secs(5)));
}

#[test]
fn emulated_async_keys_by_arguments() {
    let harness = BindHarness::new();
    harness.bind_ok([slow_double()]);

    assert_eq!(harness.call("slow_double", vec![num(1.0)]), Dynamic::Error(HostError::NA));
    assert_eq!(harness.call("slow_double", vec![num(2.0)]), Dynamic::Error(HostError::NA));
    assert!(harness.host.wait_ready("slow_double", Duration::from_secs(5)));
    assert!(harness.host.wait_ready("slow_double", Duration::from_secs(5)));
    assert_eq!(harness.call("slow_double", vec![num(2.0)]), num(4.0));
    assert_eq!(harness.call("slow_double", vec![num(1.0)]), num(2.0));
}

#[test]
fn abandoned_invocations_start_over() {
    let options = AsyncOptions::new();
    let tracker = options.tracker().clone();
    let harness = BindHarness::new().configure(|p| p.with_async(options));
    harness.bind_ok([slow_double()]);

    harness.call("slow_double", vec![num(3.0)]);
    assert_eq!(tracker.outstanding(), 1);
    assert!(tracker.abandon("slow_double", &[num(3.0)]));
    assert_eq!(tracker.outstanding(), 0);
    assert_eq!(
        harness.call("slow_double", vec![num(3.0)]),
        Dynamic::Error(HostError::NA)
    );
}

#[test]
fn native_async_delivers_through_the_completion() {
    let harness = BindHarness::with_host(LocalHost::new().with_native_async(true))
        .configure(|p| p.with_async(AsyncOptions::new().native_if_available(true)));
    harness.bind_ok([slow_double()]);

    let bound = harness.host.function("slow_double").unwrap();
    assert_eq!(bound.convention(), CallConvention::NativeAsync);
    assert_eq!(bound.return_type(), &DataType::Void);
    assert_eq!(harness.call("slow_double", vec![num(5.0)]), num(10.0));

    let completion = Completion::new();
    assert_eq!(bound.call_with_completion(vec![num(1.0)], completion.clone()), Dynamic::Void);
    let outcome = completion.wait_timeout(Duration::from_secs(5));
    assert_eq!(outcome, Some(Ok(num(2.0))));
    assert!(!completion.complete(Ok(num(0.0))));
}

#[test]
fn native_async_is_only_used_when_the_host_offers_it() {
    let harness = BindHarness::new()
        .configure(|p| p.with_async(AsyncOptions::new().native_if_available(true)));
    harness.bind_ok([slow_double()]);
    assert_eq!(
        harness.host.function("slow_double").unwrap().convention(),
        CallConvention::EmulatedAsync
    );
}

#[test]
fn async_results_of_author_types_are_rejected() {
    let secret = FunctionDescriptor::new("secret", |ctx: &mut CallContext| {
        ctx.set_return(Native::new(Wrapped {
            text: "hidden".to_string(),
        }));
        Ok(())
    })
    .returns(DataType::task(t1()));
    let flagged = FunctionDescriptor::new("flagged", |ctx: &mut CallContext| {
        ctx.set_return(Native::new(Wrapped {
            text: "hidden".to_string(),
        }));
        Ok(())
    })
    .returns(t1())
    .with_attributes(Attributes::new().with_flag(attr::ASYNC));

    let harness = BindHarness::new();
    let report = harness.bind([secret, flagged, slow_double()]);

    assert_eq!(report.registered, vec!["slow_double".to_string()]);
    match report.failure("secret") {
        Some(BindError::NonHostType { data_type, .. }) => {
            assert_eq!(*data_type, DataType::task(t1()))
        }
        other => panic!("expected NonHostType, got {other:?}"),
    }
    assert!(matches!(
        report.failure("flagged"),
        Some(BindError::NonHostType { .. })
    ));
    assert!(!harness.host.is_registered("secret"));
}

// ============================================================================
// Variadic
// ============================================================================

fn total() -> FunctionDescriptor {
    FunctionDescriptor::new("total", |ctx: &mut CallContext| {
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

#[test]
fn variadic_call_matches_direct_call() {
    let direct = total();
    let expected = direct
        .native_fn()
        .invoke(vec![Dynamic::Array(vec![num(1.0), num(2.0), num(3.0)])])
        .unwrap();

    let harness = BindHarness::new();
    harness.bind_ok([total()]);
    assert!(harness.host.function("total").unwrap().is_variadic());

    assert_eq!(
        harness.call("total", vec![num(1.0), text("2"), Dynamic::Int(3)]),
        expected
    );
    assert_eq!(
        harness.call("total", vec![Dynamic::Array(vec![num(1.0), num(2.0), num(3.0)])]),
        expected
    );
    assert_eq!(harness.call("total", vec![]), num(0.0));
}

#[test]
fn variadic_coercion_failures_use_the_unhandled_handler() {
    let harness = BindHarness::new();
    harness.bind_ok([total()]);
    assert_eq!(
        harness.call("total", vec![num(1.0), text("lots")]),
        Dynamic::Error(HostError::Value)
    );
}

// ============================================================================
// Finalizer
// ============================================================================

#[test]
fn stray_params_marker_is_reported() {
    let bad = FunctionDescriptor::new("bad", |_: &mut CallContext| Ok(()))
        .with_param(
            ParamDescriptor::new("values", DataType::array(DataType::Float))
                .with_flags(ParamFlags::PARAMS),
        )
        .param("x", DataType::Float);
    let harness = BindHarness::new();
    let report = harness.bind([bad]);
    assert!(matches!(
        report.failure("bad"),
        Some(BindError::MisplacedParams { index: 0, .. })
    ));
}

#[test]
fn second_pipeline_run_changes_no_types() {
    let config = string_to_t1(t1_to_t2(ConversionConfig::new()))
        .with_param_rule(standard::nullable(false));
    let harness = BindHarness::new().configure(|p| {
        p.with_conversions(config).with_post_async_conversions(
            ConversionConfig::new().with_return_rule(standard::not_available_as_getting_data()),
        )
    });
    let slow = shout().with_attributes(Attributes::new().with_flag(attr::ASYNC));

    let once = harness.pipeline.process(FunctionSet::new([slow]));
    let signature = |set: &FunctionSet| {
        let desc = &set.functions()[0];
        let params: Vec<DataType> = desc.params().iter().map(|p| p.data_type.clone()).collect();
        (params, desc.return_type().clone(), desc.convention())
    };
    let first = signature(&once);
    let twice = harness.pipeline.process(once);
    assert_eq!(signature(&twice), first);
    assert!(twice.failures().is_empty());
}

#[test]
fn instance_methods_bind_as_plain_functions() {
    struct Counter {
        step: i64,
        hits: AtomicUsize,
    }

    let counter = Arc::new(Counter {
        step: 5,
        hits: AtomicUsize::new(0),
    });
    let native = NativeFn::bind_instance(
        hostbind::core::TypeHash::from_name("next"),
        Arc::clone(&counter),
        |c: &Counter, ctx: &mut CallContext| {
            let n = c.hits.fetch_add(1, Ordering::SeqCst) as i64;
            ctx.set_return(n * c.step);
            Ok(())
        },
    );
    let harness = BindHarness::new();
    harness.bind_ok([FunctionDescriptor::from_native("next", native).returns(DataType::Int)]);

    assert_eq!(harness.call("next", vec![]), Dynamic::Int(0));
    assert_eq!(harness.call("next", vec![]), Dynamic::Int(5));
    assert_eq!(counter.hits.load(Ordering::SeqCst), 2);
}
