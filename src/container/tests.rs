use super::*;
use crate::component::{Component, ComponentContext};
use crate::config::ContainerConfig;
use crate::error::KeelError;
use crate::status::LifeCycleStatus;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type Journal = Arc<Mutex<Vec<String>>>;

/// Records every lifecycle call in a shared journal and fails on demand
#[derive(Default)]
struct Recorder {
    journal: Journal,
    name: String,
    fail_init: bool,
    fail_start: bool,
    fail_stop: bool,
    stop_delay: Option<Duration>,
    terminate_on_start: bool,
    observed: Mutex<Vec<LifeCycleStatus>>,
}

impl Recorder {
    fn new(name: &str, journal: &Journal) -> Self {
        Self {
            journal: Arc::clone(journal),
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn record(&self, phase: &str) {
        self.journal.lock().push(format!("{}:{}", phase, self.name));
    }
}

#[async_trait]
impl Component for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self, ctx: &ComponentContext) -> anyhow::Result<()> {
        self.observed.lock().push(ctx.status());
        self.record("init");
        if self.fail_init {
            anyhow::bail!("bad settings");
        }
        Ok(())
    }

    async fn start(&self, ctx: &ComponentContext) -> anyhow::Result<()> {
        self.observed.lock().push(ctx.status());
        if self.terminate_on_start {
            assert!(ctx.request_termination("lost upstream", Some(anyhow::anyhow!("socket closed"))));
        }
        self.record("start");
        if self.fail_start {
            anyhow::bail!("port in use");
        }
        Ok(())
    }

    async fn stop(&self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        if let Some(delay) = self.stop_delay {
            tokio::time::sleep(delay).await;
        }
        self.record("stop");
        if self.fail_stop {
            anyhow::bail!("flush failed");
        }
        Ok(())
    }
}

/// Component relying entirely on the default no-op hooks
#[derive(Debug)]
struct Passive;

impl Component for Passive {}

fn create_test_config() -> ContainerConfig {
    ContainerConfig {
        stop_timeout_ms: 1_000,
        handle_signals: false,
    }
}

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().clone()
}

fn register_abc(container: &ComponentContainer, journal: &Journal) {
    for name in ["a", "b", "c"] {
        container
            .register(Some(name), Arc::new(Recorder::new(name, journal)))
            .unwrap();
    }
}

#[tokio::test]
async fn test_duplicate_identifier_is_rejected() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();

    container
        .register(Some("db"), Arc::new(Recorder::new("first", &journal)))
        .unwrap();
    let err = container
        .register(Some("db"), Arc::new(Recorder::new("second", &journal)))
        .unwrap_err();

    match err {
        KeelError::DuplicateIdentifier { identifier } => assert_eq!(identifier, "db"),
        other => panic!("Expected DuplicateIdentifier, got {:?}", other),
    }
    assert_eq!(container.len(), 1);
    assert_eq!(container.lookup_as::<Recorder>("db").unwrap().name, "first");
}

#[tokio::test]
async fn test_start_forward_and_stop_reverse() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    register_abc(&container, &journal);

    container.initialize_all().await.unwrap();
    container.start_all().await.unwrap();
    assert!(container
        .statuses()
        .iter()
        .all(|(_, status)| *status == LifeCycleStatus::Started));

    container.stop_all().await.unwrap();

    assert_eq!(
        entries(&journal),
        vec![
            "init:a", "init:b", "init:c", "start:a", "start:b", "start:c", "stop:c", "stop:b",
            "stop:a"
        ]
    );
    assert_eq!(container.status_of("b"), Some(LifeCycleStatus::Stopped));
}

#[tokio::test]
async fn test_start_failure_unwinds_started_subset_only() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    container
        .register(Some("a"), Arc::new(Recorder::new("a", &journal)))
        .unwrap();
    container
        .register(
            Some("b"),
            Arc::new(Recorder {
                fail_start: true,
                ..Recorder::new("b", &journal)
            }),
        )
        .unwrap();
    container
        .register(Some("c"), Arc::new(Recorder::new("c", &journal)))
        .unwrap();

    let err = container.startup().await.unwrap_err();

    match &err {
        KeelError::Start { component, .. } => assert_eq!(component, "b"),
        other => panic!("Expected Start failure, got {:?}", other),
    }
    assert!(err.to_string().contains("port in use"));

    let calls = entries(&journal);
    assert_eq!(&calls[3..], &["start:a", "start:b", "stop:a"]);
    for name in ["a", "b", "c"] {
        assert_eq!(container.status_of(name), Some(LifeCycleStatus::Stopped));
    }
}

#[tokio::test]
async fn test_start_failure_reports_stop_failures_from_unwind() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    container
        .register(
            Some("a"),
            Arc::new(Recorder {
                fail_stop: true,
                ..Recorder::new("a", &journal)
            }),
        )
        .unwrap();
    container
        .register(
            Some("b"),
            Arc::new(Recorder {
                fail_start: true,
                ..Recorder::new("b", &journal)
            }),
        )
        .unwrap();

    let err = container.startup().await.unwrap_err();

    match &err {
        KeelError::Start {
            component,
            unwind_failures,
            ..
        } => {
            assert_eq!(component, "b");
            assert_eq!(unwind_failures.len(), 1);
            assert!(unwind_failures[0].source.to_string().contains("flush failed"));
        }
        other => panic!("Expected Start failure, got {:?}", other),
    }
    assert_eq!(err.failed_components(), vec!["a"]);
    assert!(err.to_string().contains("a (flush failed)"));
    assert!(entries(&journal).ends_with(&["stop:a".to_string()]));
    assert_eq!(container.status_of("a"), Some(LifeCycleStatus::Stopped));
}

#[tokio::test]
async fn test_initialization_failure_is_fatal() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    container
        .register(Some("a"), Arc::new(Recorder::new("a", &journal)))
        .unwrap();
    container
        .register(
            Some("b"),
            Arc::new(Recorder {
                fail_init: true,
                ..Recorder::new("b", &journal)
            }),
        )
        .unwrap();
    container
        .register(Some("c"), Arc::new(Recorder::new("c", &journal)))
        .unwrap();

    let err = container.initialize_all().await.unwrap_err();
    assert!(matches!(err, KeelError::Initialization { ref component, .. } if component == "b"));

    // c is never initialized and nothing is started afterwards
    container.start_all().await.unwrap();
    assert_eq!(entries(&journal), vec!["init:a", "init:b"]);
    assert!(container
        .statuses()
        .iter()
        .all(|(_, status)| status.is_terminal()));
}

#[tokio::test]
async fn test_stop_failures_are_aggregated() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    for (name, fail_stop) in [("a", true), ("b", false), ("c", true)] {
        container
            .register(
                Some(name),
                Arc::new(Recorder {
                    fail_stop,
                    ..Recorder::new(name, &journal)
                }),
            )
            .unwrap();
    }
    container.startup().await.unwrap();

    let err = container.stop_all().await.unwrap_err();

    assert_eq!(err.failed_components(), vec!["c", "a"]);
    assert!(entries(&journal).ends_with(&[
        "stop:c".to_string(),
        "stop:b".to_string(),
        "stop:a".to_string()
    ]));
    assert_eq!(container.status_of("b"), Some(LifeCycleStatus::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_stop_timeout_is_reported_and_sweep_continues() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    container
        .register(Some("a"), Arc::new(Recorder::new("a", &journal)))
        .unwrap();
    container
        .register(
            Some("slow"),
            Arc::new(Recorder {
                stop_delay: Some(Duration::from_secs(60)),
                ..Recorder::new("slow", &journal)
            }),
        )
        .unwrap();
    container.startup().await.unwrap();

    let err = container.stop_all().await.unwrap_err();

    assert_eq!(err.failed_components(), vec!["slow"]);
    assert!(err.to_string().contains("timed out"));
    assert!(entries(&journal).ends_with(&["stop:a".to_string()]));
    assert_eq!(container.status_of("slow"), Some(LifeCycleStatus::Stopped));
}

#[tokio::test]
async fn test_termination_requested_during_start() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    container
        .register(Some("a"), Arc::new(Recorder::new("a", &journal)))
        .unwrap();
    container
        .register(
            Some("b"),
            Arc::new(Recorder {
                terminate_on_start: true,
                ..Recorder::new("b", &journal)
            }),
        )
        .unwrap();
    container
        .register(Some("c"), Arc::new(Recorder::new("c", &journal)))
        .unwrap();

    let err = container.startup().await.unwrap_err();

    assert!(matches!(err, KeelError::Terminated { ref reason, .. } if reason == "lost upstream"));
    // b's own start completes before the sweep; c is never attempted
    assert_eq!(
        &entries(&journal)[3..],
        &["start:a", "start:b", "stop:b", "stop:a"]
    );
    assert_eq!(container.status_of("c"), Some(LifeCycleStatus::Stopped));

    let request = container.termination_request().unwrap();
    assert_eq!(request.source, TerminationSource::Component("b".to_string()));
    assert_eq!(request.cause.as_deref(), Some("socket closed"));
}

#[tokio::test]
async fn test_request_termination_is_idempotent() {
    let container = ComponentContainer::new(create_test_config());

    assert!(!container.is_termination_requested());
    assert!(container.request_termination("maintenance", None));
    assert!(!container.request_termination("second opinion", None));

    let request = container.termination_request().unwrap();
    assert_eq!(request.reason, "maintenance");
    assert_eq!(request.source, TerminationSource::Host);
    assert!(container.is_termination_requested());
}

#[tokio::test]
async fn test_run_stops_components_after_context_request() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    let watcher = Arc::new(Recorder::new("watcher", &journal));
    container.register(Some("db"), Arc::new(Recorder::new("db", &journal))).unwrap();
    container.register(Some("watcher"), Arc::clone(&watcher)).unwrap();
    container.startup().await.unwrap();

    // the component keeps its context and requests termination from its own task
    let ctx = container.shared.prepare(1).map(|(_, ctx)| ctx).unwrap();
    assert_eq!(ctx.identifier(), Some("watcher"));
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        ctx.request_termination("disk full", None);
    });

    let request = container.run().await.unwrap();

    assert_eq!(request.reason, "disk full");
    assert_eq!(
        request.source,
        TerminationSource::Component("watcher".to_string())
    );
    assert!(entries(&journal).ends_with(&["stop:watcher".to_string(), "stop:db".to_string()]));
}

#[tokio::test]
async fn test_request_after_startup_is_acted_on_by_run() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    container
        .register(Some("svc"), Arc::new(Recorder::new("svc", &journal)))
        .unwrap();
    container.startup().await.unwrap();

    assert!(container.request_termination("rolling restart", None));
    tokio::task::yield_now().await;

    // recorded, but nothing is stopped until the host drives run()
    assert_eq!(container.status_of("svc"), Some(LifeCycleStatus::Started));
    assert!(!entries(&journal).contains(&"stop:svc".to_string()));

    let request = container.run().await.unwrap();
    assert_eq!(request.reason, "rolling restart");
    assert_eq!(container.status_of("svc"), Some(LifeCycleStatus::Stopped));
}

#[tokio::test]
async fn test_run_surfaces_stop_failures() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    container
        .register(
            Some("cache"),
            Arc::new(Recorder {
                fail_stop: true,
                ..Recorder::new("cache", &journal)
            }),
        )
        .unwrap();
    container.startup().await.unwrap();
    container.request_termination("deploy", None);

    let err = container.run().await.unwrap_err();
    assert_eq!(err.failed_components(), vec!["cache"]);
}

#[tokio::test]
async fn test_context_tracks_status() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    let recorder = Arc::new(Recorder::new("svc", &journal));
    container.register(Some("svc"), Arc::clone(&recorder)).unwrap();

    let ctx = container.shared.prepare(0).map(|(_, ctx)| ctx).unwrap();
    assert_eq!(ctx.status(), LifeCycleStatus::New);

    container.startup().await.unwrap();
    assert_eq!(
        *recorder.observed.lock(),
        vec![LifeCycleStatus::Initializing, LifeCycleStatus::Starting]
    );
    assert_eq!(ctx.status(), LifeCycleStatus::Started);

    drop(container);
    assert_eq!(ctx.status(), LifeCycleStatus::Stopped);
    assert!(!ctx.request_termination("too late", None));
}

#[tokio::test]
async fn test_lookup_by_identifier_and_type() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    container
        .register(Some("db"), Arc::new(Recorder::new("db", &journal)))
        .unwrap();
    container.register(None, Arc::new(Passive)).unwrap();

    assert!(container.lookup("db").is_some());
    assert!(container.lookup("missing").is_none());
    assert!(container.lookup_as::<Passive>("db").is_none());

    // identified registrations are not candidates for type lookup
    assert!(container.lookup_by_type::<Recorder>().unwrap().is_none());
    assert!(container.lookup_by_type::<Passive>().unwrap().is_some());

    container.register(None, Arc::new(Passive)).unwrap();
    let err = container.lookup_by_type::<Passive>().unwrap_err();
    assert!(matches!(err, KeelError::AmbiguousComponent { candidates: 2, .. }));
}

#[tokio::test]
async fn test_anonymous_components_are_labelled_by_name() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();
    container
        .register(
            None,
            Arc::new(Recorder {
                fail_start: true,
                ..Recorder::new("mailer", &journal)
            }),
        )
        .unwrap();
    container.register(None, Arc::new(Passive)).unwrap();

    let labels: Vec<_> = container.statuses().into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels[0], "mailer");
    assert!(labels[1].ends_with("Passive"));

    let err = container.startup().await.unwrap_err();
    assert!(matches!(err, KeelError::Start { ref component, .. } if component == "mailer"));
}

struct TwoTier {
    journal: Journal,
}

impl Assembly for TwoTier {
    fn assemble(&self, ctx: &mut AssemblyContext<'_>) -> crate::error::Result<()> {
        ctx.add_component("store", Arc::new(Recorder::new("store", &self.journal)))?;
        let store = ctx.get::<Recorder>("store").expect("store was just added");
        ctx.add_component("api", Arc::new(Recorder::new(&format!("api->{}", store.name), &self.journal)))?;
        ctx.add_anonymous_component(Arc::new(Passive))?;
        Ok(())
    }
}

#[tokio::test]
async fn test_assembly_registers_in_order() {
    let container = ComponentContainer::new(create_test_config());
    let journal = journal();

    let added = container.assemble(&TwoTier { journal: Arc::clone(&journal) }).unwrap();
    assert_eq!(added, 3);

    container.startup().await.unwrap();
    container.stop_all().await.unwrap();

    assert_eq!(
        entries(&journal),
        vec![
            "init:store",
            "init:api->store",
            "start:store",
            "start:api->store",
            "stop:api->store",
            "stop:store"
        ]
    );

    // a second assembly of the same identifiers fails fast
    let err = container
        .assemble(&TwoTier { journal: Arc::clone(&journal) })
        .unwrap_err();
    assert!(matches!(err, KeelError::DuplicateIdentifier { .. }));
}

#[tokio::test]
async fn test_concurrent_status_reads() {
    let container = ComponentContainer::new(create_test_config());
    for i in 0..10 {
        container
            .register(Some(format!("component_{}", i).as_str()), Arc::new(Passive))
            .unwrap();
    }
    container.startup().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let ctx = container.shared.prepare(i).map(|(_, ctx)| ctx).unwrap();
        handles.push(tokio::spawn(async move { ctx.status() }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), LifeCycleStatus::Started);
    }
}
