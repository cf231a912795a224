use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flow_core::logic::{InstalledChain, LogicRegistry};
use flow_core::{new_handle, Closeable, ContainerContext, FlowError, FlowResult, Initializable, Logic, LogicHandle,
                LogicSpec, ResettableLogic, StatelessLogic, Value, ValueShape};
use parking_lot::Mutex;
use serde_json::json;

// Registro compartido de lo que ocurre en la cadena.
#[derive(Debug, Default)]
struct Probe {
    init_order: Mutex<Vec<String>>,
    closes: AtomicUsize,
    in_use: AtomicBool,
    close_during_use: AtomicBool,
}

// Decorador: delega en `inner` y se inicializa.
#[derive(Debug)]
struct Wrapper {
    label: String,
    inner: Arc<dyn Logic>,
    probe: Arc<Probe>,
}

impl Initializable for Wrapper {
    fn initialize(&self, _ctx: &Arc<ContainerContext>) -> FlowResult<()> {
        self.probe.init_order.lock().push(self.label.clone());
        Ok(())
    }
}

impl Logic for Wrapper {
    fn call(&self, value: Value) -> FlowResult<Option<Value>> {
        self.inner.call(value)
    }
    fn inner(&self) -> Option<Arc<dyn Logic>> {
        Some(self.inner.clone())
    }
    fn as_initializable(&self) -> Option<&dyn Initializable> {
        Some(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Eslabón interno que posee un recurso.
#[derive(Debug)]
struct Resource {
    probe: Arc<Probe>,
    fail_close: bool,
    init_delay: Duration,
}

impl Initializable for Resource {
    fn initialize(&self, _ctx: &Arc<ContainerContext>) -> FlowResult<()> {
        thread::sleep(self.init_delay);
        self.probe.init_order.lock().push("resource".into());
        Ok(())
    }
}

impl Closeable for Resource {
    fn close(&self) -> FlowResult<()> {
        if self.probe.in_use.load(Ordering::SeqCst) {
            self.probe.close_during_use.store(true, Ordering::SeqCst);
        }
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(FlowError::Internal("disk gone".into()));
        }
        Ok(())
    }
}

impl Logic for Resource {
    fn call(&self, value: Value) -> FlowResult<Option<Value>> {
        self.probe.in_use.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_micros(50));
        self.probe.in_use.store(false, Ordering::SeqCst);
        Ok(Some(value))
    }
    fn as_initializable(&self) -> Option<&dyn Initializable> {
        Some(self)
    }
    fn as_closeable(&self) -> Option<&dyn Closeable> {
        Some(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn three_deep(probe: &Arc<Probe>, fail_close: bool, init_delay: Duration) -> Arc<dyn Logic> {
    let resource: Arc<dyn Logic> = Arc::new(Resource { probe: probe.clone(),
                                                       fail_close,
                                                       init_delay });
    let middle: Arc<dyn Logic> = Arc::new(Wrapper { label: "middle".into(),
                                                    inner: resource,
                                                    probe: probe.clone() });
    Arc::new(Wrapper { label: "outer".into(),
                       inner: middle,
                       probe: probe.clone() })
}

fn context_with(probe: Arc<Probe>) -> Arc<ContainerContext> {
    let registry = Arc::new(LogicRegistry::new());
    let p = probe.clone();
    registry.register("three_deep", move |params| {
                let fail_close = params.get("fail_close").and_then(|v| v.as_bool()).unwrap_or(false);
                let delay = params.get("init_delay_ms").and_then(|v| v.as_u64()).unwrap_or(0);
                Ok(three_deep(&p, fail_close, Duration::from_millis(delay)))
            });
    ContainerContext::builder("pe-1").logic_registry(registry).build()
}

fn spec(fail_close: bool) -> LogicSpec {
    LogicSpec::new(ValueShape::PrimitiveString, "three_deep", json!({ "fail_close": fail_close })).expect("spec")
}

#[test]
fn initialize_runs_outermost_first() {
    let probe = Arc::new(Probe::default());
    let ctx = context_with(probe.clone());
    let handle = ResettableLogic::new(ctx, &spec(false)).expect("install");
    assert_eq!(*probe.init_order.lock(), vec!["outer", "middle", "resource"]);
    assert_eq!(handle.invoke(Value::from("x")).expect("invoke"), Some(Value::from("x")));
}

#[test]
fn three_deep_chain_closes_innermost_exactly_once() {
    let probe = Arc::new(Probe::default());
    let ctx = context_with(probe.clone());
    let handle = ResettableLogic::new(ctx, &spec(false)).expect("install");
    handle.close();
    handle.close();
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    assert!(handle.is_closed());
    assert_eq!(handle.invoke(Value::from("late")), Err(FlowError::Closed));
}

#[test]
fn close_failure_is_swallowed() {
    let probe = Arc::new(Probe::default());
    let ctx = context_with(probe.clone());
    let handle = ResettableLogic::new(ctx, &spec(true)).expect("install");
    handle.close(); // no panic, no error
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn close_races_in_flight_calls_without_overlap() {
    let _ = env_logger::builder().is_test(true).try_init();
    for _ in 0..20 {
        let probe = Arc::new(Probe::default());
        let ctx = context_with(probe.clone());
        let handle: Arc<dyn LogicHandle> = Arc::new(ResettableLogic::new(ctx, &spec(false)).expect("install"));

        let workers: Vec<_> = (0..4).map(|i| {
                                        let h = handle.clone();
                                        thread::spawn(move || {
                                            for n in 0..50 {
                                                let _live = h.get();
                                                match h.invoke(Value::Int(i * 100 + n)) {
                                                    Ok(_) | Err(FlowError::Closed) => {}
                                                    Err(e) => panic!("unexpected error {e}"),
                                                }
                                            }
                                        })
                                    })
                                    .collect();
        let closers: Vec<_> = (0..3).map(|_| {
                                        let h = handle.clone();
                                        thread::spawn(move || {
                                            thread::sleep(Duration::from_micros(200));
                                            h.close();
                                        })
                                    })
                                    .collect();
        for t in workers.into_iter().chain(closers) {
            t.join().expect("thread");
        }
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
        assert!(!probe.close_during_use.load(Ordering::SeqCst), "close overlapped an in-flight call");
    }
}

#[test]
fn reinitialize_swaps_and_releases_previous_instance() {
    let probe = Arc::new(Probe::default());
    let ctx = context_with(probe.clone());
    let handle = ResettableLogic::new(ctx, &spec(false)).expect("install");
    let before = handle.get();
    handle.reinitialize(&spec(false)).expect("reinitialize");
    let after = handle.get();
    assert!(!Arc::ptr_eq(&before, &after));
    // la cadena anterior se cerró; la nueva sigue viva
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    assert_eq!(probe.init_order.lock().len(), 6);
    handle.close();
    assert_eq!(probe.closes.load(Ordering::SeqCst), 2);
}

#[test]
fn in_flight_calls_survive_concurrent_reinitialize() {
    let probe = Arc::new(Probe::default());
    let ctx = context_with(probe.clone());
    let handle: Arc<dyn LogicHandle> = Arc::new(ResettableLogic::new(ctx, &spec(false)).expect("install"));
    let stop = Arc::new(AtomicBool::new(false));
    let closed_errors = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..4).map(|_| {
                                    let (h, stop, errors) = (handle.clone(), stop.clone(), closed_errors.clone());
                                    thread::spawn(move || {
                                        while !stop.load(Ordering::SeqCst) {
                                            match h.invoke(Value::from("x")) {
                                                Ok(out) => assert_eq!(out, Some(Value::from("x"))),
                                                Err(FlowError::Closed) => {
                                                    errors.fetch_add(1, Ordering::SeqCst);
                                                }
                                                Err(e) => panic!("unexpected error {e}"),
                                            }
                                        }
                                    })
                                })
                                .collect();
    for _ in 0..2000 {
        handle.reinitialize(&spec(false)).expect("reinitialize");
    }
    stop.store(true, Ordering::SeqCst);
    for t in workers {
        t.join().expect("thread");
    }
    assert_eq!(closed_errors.load(Ordering::SeqCst), 0);
    // cada cadena reemplazada se cerró una vez; la actual sigue viva
    assert_eq!(probe.closes.load(Ordering::SeqCst), 2000);
    assert!(!probe.close_during_use.load(Ordering::SeqCst));
}

#[test]
fn close_during_reinitialize_releases_the_new_chain() {
    let probe = Arc::new(Probe::default());
    let ctx = context_with(probe.clone());
    let handle: Arc<dyn LogicHandle> = Arc::new(ResettableLogic::new(ctx, &spec(false)).expect("install"));
    let slow = LogicSpec::new(ValueShape::PrimitiveString, "three_deep", json!({ "init_delay_ms": 300 })).expect("spec");

    let h = handle.clone();
    let reinit = thread::spawn(move || h.reinitialize(&slow));
    thread::sleep(Duration::from_millis(50));
    handle.close();
    assert_eq!(reinit.join().expect("thread"), Err(FlowError::Closed));

    // cadena original (por close) y cadena nueva (por reinitialize)
    assert!(handle.is_closed());
    assert_eq!(probe.closes.load(Ordering::SeqCst), 2);
    assert_eq!(handle.invoke(Value::from("late")), Err(FlowError::Closed));
}

#[test]
fn corrupt_spec_fails_construction() {
    let probe = Arc::new(Probe::default());
    let ctx = context_with(probe);
    let corrupt = LogicSpec::from_bytes(ValueShape::PrimitiveString, b"{not json".to_vec());
    assert!(matches!(ResettableLogic::new(ctx.clone(), &corrupt), Err(FlowError::Deserialization(_))));
    let handle = ResettableLogic::new(ctx, &spec(false)).expect("install");
    assert!(matches!(handle.reinitialize(&corrupt), Err(FlowError::Deserialization(_))));
    // la lógica viva no cambió
    assert_eq!(handle.spec(), spec(false));
}

#[test]
fn stateless_handle_ignores_reinitialize() {
    let registry = Arc::new(LogicRegistry::new());
    registry.register("upper", |_| {
                Ok(Arc::new(flow_core::FnLogic::stateless(|v: Value| {
                    Ok(v.as_str().map(|s| Value::String(s.to_uppercase())))
                })) as Arc<dyn Logic>)
            });
    let ctx = ContainerContext::builder("pe-2").logic_registry(registry).build();
    let spec = LogicSpec::new(ValueShape::PrimitiveString, "upper", json!({})).expect("spec");
    let handle = StatelessLogic::new(ctx.clone(), &spec).expect("install");
    let before = handle.get();
    handle.reinitialize(&spec).expect("noop");
    assert!(Arc::ptr_eq(&before, &handle.get()));
    assert_eq!(handle.invoke(Value::from("ab")).expect("invoke"), Some(Value::from("AB")));

    // new_handle sólo elige la variante sin estado fuera de una región consistente
    let chosen = new_handle(ctx, &spec).expect("handle");
    let before = chosen.get();
    chosen.reinitialize(&spec).expect("noop");
    assert!(Arc::ptr_eq(&before, &chosen.get()));
}

#[test]
fn installed_chain_reports_depth() {
    let probe = Arc::new(Probe::default());
    let ctx = context_with(probe);
    let chain = InstalledChain::load(&ctx, &spec(false)).expect("load");
    assert_eq!(chain.depth(), 3);
    assert_eq!(chain.fingerprint(), spec(false).fingerprint());
}
