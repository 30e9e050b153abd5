// CLASSIFICATION: COMMUNITY
// Filename: model_scenarios.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! End-to-end modeling scenarios against the public engine surface.

use std::sync::Arc;

use cohesix_sentinel::{
    pseudonym_mapping, DigestAlgorithm, Engine, EngineConfig, EventKind, EventParams, FileParams,
    InodeShadow, SocketAddress, SocketConnectParams, Task,
};

fn engine() -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    Engine::new(EngineConfig::default()).unwrap()
}

fn task(pid: u32, comm: &str) -> Arc<Task> {
    Task::new(pid, comm, cohesix_sentinel::Credentials::default())
}

/// One file identity: a path, content bytes and the inode shadow shared
/// by every open of that inode.
struct TestFile {
    path: String,
    content: Vec<u8>,
    shadow: Arc<InodeShadow>,
}

impl TestFile {
    fn new(path: &str, content: &[u8]) -> TestFile {
        TestFile {
            path: path.into(),
            content: content.to_vec(),
            shadow: InodeShadow::new(),
        }
    }

    fn params(&self) -> EventParams<'_> {
        let base = self.path.rsplit('/').next().unwrap_or(&self.path);
        EventParams::File(FileParams {
            path: Some(&self.path),
            base_name: base,
            flags: 0,
            uid: 0,
            gid: 0,
            mode: 0o644,
            s_magic: 0xef53,
            s_id: [0u8; 32],
            s_uuid: [0u8; 16],
            size: self.content.len() as u64,
            iversion: 1,
            shadow: &self.shadow,
            content: &self.content,
        })
    }
}

fn open(engine: &Engine, file: &TestFile, task: &Task) -> cohesix_sentinel::Result<()> {
    engine.dispatch(
        engine.root(),
        EventKind::FileOpen,
        file.params(),
        false,
        task,
    )
}

#[test]
fn identical_opens_coalesce_into_one_point() {
    let engine = engine();
    let task = task(1, "true");
    let file = TestFile::new("/bin/true", b"ELF true");

    open(&engine, &file, &task).unwrap();
    open(&engine, &file, &task).unwrap();

    let model = engine.root().model().unwrap();
    let trajectory = model.trajectory();
    assert_eq!(trajectory.len(), 1);

    let point = model.point(&trajectory[0].mapping).unwrap();
    assert_eq!(point.count, 2);
    assert!(point.valid);
    // One point for the open on top of the injected hardware aggregate
    // measurement; the aggregate is not a model point.
    assert_eq!(model.point_count(), 1);
}

#[test]
fn state_is_insertion_order_invariant() {
    let files = ["/a", "/b", "/c"];
    let contents: [&[u8]; 3] = [b"alpha", b"bravo", b"charlie"];
    let aggregate = DigestAlgorithm::Sha256.zero_digest();

    let forward = engine();
    let t1 = task(2, "fwd");
    for (path, content) in files.iter().zip(contents) {
        open(&forward, &TestFile::new(path, content), &t1).unwrap();
    }

    let reverse = engine();
    let t2 = task(3, "rev");
    for (path, content) in files.iter().zip(contents).rev() {
        open(&reverse, &TestFile::new(path, content), &t2).unwrap();
    }

    let forward_model = forward.root().model().unwrap();
    let reverse_model = reverse.root().model().unwrap();
    assert_eq!(
        forward_model.compute_state(&aggregate),
        reverse_model.compute_state(&aggregate)
    );
    assert_ne!(forward_model.measurement(), reverse_model.measurement());
}

#[test]
fn sealed_model_sends_novel_opens_to_forensics() {
    let engine = engine();
    let task = task(4, "sealed");
    let known = TestFile::new("/bin/true", b"ELF true");

    open(&engine, &known, &task).unwrap();
    engine.root().seal();

    // A replay of the known event stays legitimate.
    open(&engine, &known, &task).unwrap();
    assert!(task.is_trusted());

    let rogue = TestFile::new("/etc/shadow", b"root:!:19000");
    open(&engine, &rogue, &task).unwrap();

    let model = engine.root().model().unwrap();
    let forensics = model.forensics();
    assert_eq!(forensics.len(), 1);
    assert!(!task.is_trusted());
    assert!(!model.point(&forensics[0].mapping).unwrap().valid);
}

#[test]
fn pseudonym_elides_file_content() {
    let engine = engine();
    let task = task(5, "pseudo");
    let algorithm = engine.root().algorithm();

    let path = "/tmp/secret";
    let name_digest = algorithm.digest(path.as_bytes());
    let mapping = pseudonym_mapping(algorithm, path.len() as u32, &name_digest);
    engine.root().model().unwrap().load_pseudonym(mapping);

    // Same path and metadata, different bytes and inodes.
    open(&engine, &TestFile::new(path, b"first contents"), &task).unwrap();
    open(&engine, &TestFile::new(path, b"second contents"), &task).unwrap();

    let model = engine.root().model().unwrap();
    let trajectory = model.trajectory();
    assert_eq!(trajectory.len(), 1);
    assert_eq!(model.point(&trajectory[0].mapping).unwrap().count, 2);

    let cell = trajectory[0].file.as_ref().unwrap();
    assert!(cell.digest.is_zero());
    assert_eq!(cell.digest.width(), algorithm.digest_size());
}

#[test]
fn unix_connect_distinguishes_abstract_and_path_names() {
    let engine = engine();
    let task = task(6, "dialer");

    let abstract_name = SocketAddress::Unix {
        path: b"\0abstract-name".to_vec(),
    };
    let fs_path = SocketAddress::Unix {
        path: b"/var/run/x.sock".to_vec(),
    };

    let before = engine.root().model().unwrap().point_count();
    for address in [abstract_name, fs_path] {
        engine
            .dispatch(
                engine.root(),
                EventKind::SocketConnect,
                EventParams::SocketConnect(SocketConnectParams { address }),
                false,
                &task,
            )
            .unwrap();
    }
    assert_eq!(engine.root().model().unwrap().point_count(), before + 2);
}

#[test]
fn magazine_bitmap_drains_after_atomic_burst() {
    use cohesix_sentinel::magazine::Magazine;
    use cohesix_sentinel::workqueue::WorkQueue;

    let wq = Arc::new(WorkQueue::new("scenario-refill"));
    let magazine: Arc<Magazine<u64>> = Magazine::new(4, "scenario", Arc::clone(&wq));

    let burst: Vec<_> = (0..4).map(|_| magazine.acquire(true)).collect();
    assert!(burst.iter().all(Option::is_some));
    assert_eq!(magazine.occupied_count(), 4);

    wq.flush();
    assert!(magazine.is_idle());
    assert!(magazine.acquire(true).is_some());
}
