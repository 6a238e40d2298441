//! Dependency resolution through a build session

mod common;

use std::sync::{mpsc, Arc};
use std::time::Duration;

use brood::repository::EndpointError;
use brood::resolve::{ConflictReason, ResolutionCache};
use brood::{
    ArtifactKey, BuildSession, Exclusion, ProjectDeclaration, RepositoryClient, RepositoryEndpoint,
    ResolveError, Scope, TaskRegistry,
};
use parking_lot::Mutex;
use common::{config, dep, dep_in, resolved, session, session_with, MemoryRepository};
use proptest::prelude::*;
use tempfile::TempDir;

fn key(s: &str) -> ArtifactKey {
    s.parse().unwrap()
}

fn before(order: &[String], first: &str, second: &str) -> bool {
    let pos = |c: &str| order.iter().position(|o| o == c).unwrap();
    pos(first) < pos(second)
}

#[test]
fn diamond_tie_goes_to_first_declaration() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:b", "1"), dep("g:c", "1")]);
    repo.publish("g:b:1", vec![dep("g:d", "1")]);
    repo.publish("g:c:1", vec![dep("g:d", "2")]);
    repo.publish("g:d:1", vec![]);
    repo.publish("g:d:2", vec![]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:a", "1")]);
    let order = resolved(&session, Scope::Compile);

    assert!(order.contains(&"g:d:1".to_string()));
    assert!(!order.contains(&"g:d:2".to_string()));
    assert!(before(&order, "g:d:1", "g:b:1"));
    assert!(before(&order, "g:b:1", "g:a:1"));
    assert!(before(&order, "g:c:1", "g:a:1"));

    let graph = session.resolve(Scope::Compile).unwrap();
    let conflict = graph.conflicts().get(&key("g:d")).unwrap();
    assert_eq!(conflict.selected.to_string(), "1");
    assert_eq!(conflict.rejected[0].version.to_string(), "2");
    assert_eq!(conflict.rejected[0].reason, ConflictReason::DeclaredEarlier);
}

#[test]
fn nearer_candidate_wins_regardless_of_order() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:b", "1"), dep("g:c", "1")]);
    repo.publish("g:b:1", vec![dep("g:x", "1")]);
    repo.publish("g:x:1", vec![dep("g:d", "1")]);
    repo.publish("g:c:1", vec![dep("g:d", "2")]);
    repo.publish("g:d:1", vec![]);
    repo.publish("g:d:2", vec![]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:a", "1")]);
    let order = resolved(&session, Scope::Compile);

    assert!(order.contains(&"g:d:2".to_string()));
    assert!(!order.contains(&"g:d:1".to_string()));

    let graph = session.resolve(Scope::Compile).unwrap();
    let conflict = graph.conflicts().get(&key("g:d")).unwrap();
    assert_eq!(conflict.rejected[0].reason, ConflictReason::Nearer);
}

#[test]
fn exclusion_on_any_edge_removes_key_everywhere() {
    let repo = MemoryRepository::new();
    repo.publish(
        "g:a:1",
        vec![dep("g:b", "1").exclude(Exclusion::new("g", "d")), dep("g:c", "1")],
    );
    repo.publish("g:b:1", vec![]);
    repo.publish("g:c:1", vec![dep("g:d", "1")]);
    repo.publish("g:d:1", vec![]);

    let dir = TempDir::new().unwrap();
    let excluded = session(&dir, &repo, vec![dep("g:a", "1")]);
    assert_eq!(resolved(&excluded, Scope::Compile), vec!["g:b:1", "g:c:1", "g:a:1"]);
    let graph = excluded.resolve(Scope::Compile).unwrap();
    assert_eq!(graph.conflicts().excluded().to_vec(), vec![key("g:d")]);

    // A root declaration is never excluded
    let dir = TempDir::new().unwrap();
    let declared = session(&dir, &repo, vec![dep("g:a", "1"), dep("g:d", "1")]);
    assert!(resolved(&declared, Scope::Compile).contains(&"g:d:1".to_string()));
}

#[test]
fn exclusion_below_a_losing_version_is_ignored() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:b", "1"), dep("g:x", "1")]);
    repo.publish("g:c:1", vec![dep("g:b", "2")]);
    repo.publish("g:b:1", vec![]);
    repo.publish("g:b:2", vec![dep("g:y", "1").exclude(Exclusion::new("g", "x"))]);
    repo.publish("g:x:1", vec![]);
    repo.publish("g:y:1", vec![]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:a", "1"), dep("g:c", "1")]);
    let order = resolved(&session, Scope::Compile);
    assert!(order.contains(&"g:x:1".to_string()));
    assert!(!order.contains(&"g:b:2".to_string()));
    assert!(!order.iter().any(|c| c.starts_with("g:y")));

    let graph = session.resolve(Scope::Compile).unwrap();
    assert!(graph.conflicts().excluded().is_empty());
}

#[test]
fn project_exclusions_apply_to_the_whole_request() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:b", "1")]);
    repo.publish("g:b:1", vec![]);

    let dir = TempDir::new().unwrap();
    let project = ProjectDeclaration::new(vec![dep("g:a", "1")]).exclude(Exclusion::new("g", "*"));
    let session = session_with(config(&dir), &repo, TaskRegistry::new(), project);

    // Roots stay, everything below matching the pattern goes
    assert_eq!(resolved(&session, Scope::Compile), vec!["g:a:1"]);
}

#[test]
fn range_selects_highest_match() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:d", "[1.0,2.0)")]);
    repo.publish("g:d:1.5", vec![]);
    repo.publish("g:d:1.9", vec![]);
    repo.publish("g:d:2.0", vec![]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:a", "1")]);
    assert_eq!(resolved(&session, Scope::Compile), vec!["g:d:1.9", "g:a:1"]);
}

#[test]
fn scopes_filter_the_result() {
    let repo = MemoryRepository::new();
    repo.publish(
        "g:app:1",
        vec![
            dep_in("g:driver", "1", Scope::Runtime),
            dep_in("g:servlet", "1", Scope::Provided),
            dep_in("g:junit", "1", Scope::Test),
        ],
    );
    repo.publish("g:driver:1", vec![]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:app", "1")]);

    assert_eq!(resolved(&session, Scope::Compile), vec!["g:app:1"]);
    assert_eq!(resolved(&session, Scope::Runtime), vec!["g:driver:1", "g:app:1"]);

    let runtime = session.resolve(Scope::Runtime).unwrap();
    assert_eq!(runtime.get(&key("g:driver")).unwrap().scope, Scope::Runtime);
}

#[test]
fn optional_dependencies_are_not_followed() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:extra", "1").optional()]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:a", "1")]);
    assert_eq!(resolved(&session, Scope::Compile), vec!["g:a:1"]);
}

#[test]
fn classpath_points_at_fetched_files() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:b", "1")]);
    repo.publish("g:b:1", vec![]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:a", "1")]);
    let graph = session.resolve(Scope::Compile).unwrap();

    let contents: Vec<String> = graph
        .classpath()
        .into_iter()
        .map(|p| std::fs::read_to_string(p).unwrap())
        .collect();
    assert_eq!(contents, vec!["g:b:1", "g:a:1"]);
    assert!(graph.classpath().iter().all(|p| p.starts_with(dir.path())));
}

#[test]
fn concurrent_resolutions_share_one_fetch_sequence() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:b", "1"), dep("g:c", "[1,2)")]);
    repo.publish("g:b:1", vec![dep("g:c", "1.1")]);
    repo.publish("g:c:1.1", vec![]);
    repo.publish("g:c:1.2", vec![]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:a", "1")]);
    let barrier = std::sync::Barrier::new(2);

    let (first, second) = std::thread::scope(|s| {
        let one = s.spawn(|| {
            barrier.wait();
            session.resolve(Scope::Compile).unwrap()
        });
        let two = s.spawn(|| {
            barrier.wait();
            session.resolve(Scope::Compile).unwrap()
        });
        (one.join().unwrap(), two.join().unwrap())
    });

    assert!(Arc::ptr_eq(&first, &second));

    let mut requests = repo.requests();
    let total = requests.len();
    requests.sort();
    requests.dedup();
    assert_eq!(requests.len(), total, "a path was fetched twice");
}

/// Holds the first request until released
struct Gate {
    inner: Arc<MemoryRepository>,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl RepositoryEndpoint for Gate {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn get(&self, relative_path: &str) -> Result<Vec<u8>, EndpointError> {
        let entered = self.entered.lock().take();
        if let Some(entered) = entered {
            let release = self.release.lock().take();
            entered.send(()).unwrap();
            if let Some(release) = release {
                release.recv().unwrap();
            }
        }
        self.inner.get(relative_path)
    }
}

#[test]
fn cancelled_session_does_not_fail_sessions_sharing_its_cache() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![]);

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gate: Arc<dyn RepositoryEndpoint> = Arc::new(Gate {
        inner: repo.clone(),
        entered: Mutex::new(Some(entered_tx)),
        release: Mutex::new(Some(release_rx)),
    });

    let dir = TempDir::new().unwrap();
    let cache = ResolutionCache::new();
    let open = || {
        let config = config(&dir);
        let client = RepositoryClient::with_config(&config, vec![gate.clone()]);
        BuildSession::with_client(
            config,
            Arc::new(TaskRegistry::new()),
            ProjectDeclaration::new(vec![dep("g:a", "1")]),
            client,
        )
        .with_cache(cache.clone())
    };
    let aborted = open();
    let waiting = open();

    std::thread::scope(|s| {
        let first = s.spawn(|| aborted.resolve(Scope::Compile));
        entered_rx.recv().unwrap();

        // The second session finds the first one's resolution in flight
        let second = s.spawn(|| waiting.resolve(Scope::Compile));
        std::thread::sleep(Duration::from_millis(50));
        aborted.cancel("user abort");
        release_tx.send(()).unwrap();

        assert_eq!(first.join().unwrap().unwrap_err(), ResolveError::Cancelled);
        assert!(second.join().unwrap().is_ok());
    });

    assert!(!waiting.is_cancelled());
    assert_eq!(resolved(&waiting, Scope::Compile), vec!["g:a:1"]);
}

#[test]
fn transient_failures_are_retried() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![]);

    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.retry.backoff_ms = 1;
    let session = session_with(
        cfg,
        &repo,
        TaskRegistry::new(),
        ProjectDeclaration::new(vec![dep("g:a", "1")]),
    );

    repo.fail_next(2);
    assert_eq!(resolved(&session, Scope::Compile), vec!["g:a:1"]);
}

#[test]
fn retries_are_bounded() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![]);

    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.retry.attempts = 2;
    cfg.retry.backoff_ms = 1;
    let session = session_with(
        cfg,
        &repo,
        TaskRegistry::new(),
        ProjectDeclaration::new(vec![dep("g:a", "1")]),
    );

    repo.fail_next(2);
    let err = session.resolve(Scope::Compile).unwrap_err();
    assert!(matches!(err, ResolveError::RepositoryUnavailable(_)));
    assert_eq!(repo.requests().len(), 2);

    // Failures are not cached
    assert!(session.resolve(Scope::Compile).is_ok());
}

#[test]
fn missing_coordinate_is_unresolvable() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:gone", "1")]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:a", "1")]);
    let err = session.resolve(Scope::Compile).unwrap_err();
    assert!(matches!(err, ResolveError::UnresolvableCoordinate { ref coordinate, .. } if coordinate == "g:gone:1"));
}

#[test]
fn cycle_in_selected_versions_is_reported() {
    let repo = MemoryRepository::new();
    repo.publish("g:a:1", vec![dep("g:b", "1")]);
    repo.publish("g:b:1", vec![dep("g:a", "1")]);

    let dir = TempDir::new().unwrap();
    let session = session(&dir, &repo, vec![dep("g:a", "1")]);
    match session.resolve(Scope::Compile) {
        Err(ResolveError::CyclicDependency(path)) => {
            assert_eq!(path.first(), path.last());
            assert_eq!(path.len(), 3);
        }
        other => panic!("expected a cycle, got {:?}", other.map(|g| g.len())),
    }
}

fn arb_dag() -> impl Strategy<Value = (usize, Vec<bool>)> {
    (1usize..8).prop_flat_map(|n| (Just(n), prop::collection::vec(any::<bool>(), n * n)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn resolved_order_is_topological((n, edges) in arb_dag()) {
        // Node i may depend on node j only when j > i, so the graph is acyclic
        let depends = |i: usize, j: usize| j > i && edges[i * n + j];

        let repo = MemoryRepository::new();
        for i in 0..n {
            let deps = (0..n)
                .filter(|&j| depends(i, j))
                .map(|j| dep(&format!("g:n{}", j), "1"))
                .collect();
            repo.publish(&format!("g:n{}:1", i), deps);
        }

        let dir = TempDir::new().unwrap();
        let roots = (0..n).map(|i| dep(&format!("g:n{}", i), "1")).collect();
        let session = session(&dir, &repo, roots);
        let graph = session.resolve(Scope::Compile).unwrap();

        prop_assert_eq!(graph.len(), n);
        for i in 0..n {
            for j in 0..n {
                if depends(i, j) {
                    let pi = graph.position(&key(&format!("g:n{}", i))).unwrap();
                    let pj = graph.position(&key(&format!("g:n{}", j))).unwrap();
                    prop_assert!(pj < pi, "n{} must come before n{}", j, i);
                }
            }
        }
    }
}
