use std::sync::Arc;

use blobbench::mapping::{self, MAPPING_KEY};
use blobbench::measurements::OperationKind;
use blobbench::remote::BoxedRemote;
use blobbench::{Error, Harness, Phase, Record, Runner, Status, Workload};
use blobbench_client::{ClientBuilder, StoreFlavor};
use blobbench_test::server::{StoreKind, TestServer};

fn remote(server: &TestServer, flavor: StoreFlavor) -> BoxedRemote {
    let client = ClientBuilder::new(server.url("/"), flavor).build().unwrap();
    Arc::new(client)
}

fn workload(records: u64) -> Workload {
    Workload::builder()
        .record_count(records)
        .operation_count(records * 2)
        .fields(3, 16)
        .operation_weights(1, 0, 0, 0, 0)
        .build()
        .unwrap()
}

#[tokio::test]
async fn single_worker_publishes_its_mapping() {
    blobbench_test::tracing::init();
    let server = TestServer::ambry();

    let harness = Harness::load(remote(&server, StoreFlavor::Ambry), 1);
    let binding = harness.binding();
    binding.init().await.unwrap();

    let record: Record = [("field0".to_owned(), "value".to_owned())].into();
    assert_eq!(binding.insert("user1", &record).await, Status::Ok);
    let locator = harness.mapping().get("user1").unwrap();

    let token = binding.cleanup().await.unwrap().unwrap();
    assert_eq!(harness.mapping().get(MAPPING_KEY), Some(token.clone()));

    // The token is the locator of the mapping blob itself.
    let published = mapping::decode(&server.object(&token).unwrap()).unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published["user1"], locator);
}

#[tokio::test]
async fn concurrent_load_publishes_once() {
    blobbench_test::tracing::init();

    for kind in [StoreKind::Ambry, StoreKind::Stored] {
        let flavor = match kind {
            StoreKind::Ambry => StoreFlavor::Ambry,
            StoreKind::Stored => StoreFlavor::Stored,
        };
        let server = TestServer::for_kind(kind);

        let report = Runner::load(remote(&server, flavor), workload(60), 6)
            .show_progress(false)
            .run_phase()
            .await
            .unwrap();

        // Every record plus exactly one mapping blob.
        assert_eq!(server.creates(), 61);
        assert_eq!(server.object_count(), 61);

        let token = report.mapping_id.unwrap();
        let published = mapping::decode(&server.object(&token).unwrap()).unwrap();
        assert_eq!(published.len(), 60);
        for n in 0..60 {
            let locator = &published[&format!("user{n}")];
            assert!(server.object(locator).is_some(), "{locator} missing");
        }
        assert_eq!(
            report
                .measurements
                .status_count(OperationKind::Insert, Status::Ok),
            60
        );
    }
}

#[tokio::test]
async fn run_after_load() {
    blobbench_test::tracing::init();
    let server = TestServer::stored();

    let load = Runner::load(remote(&server, StoreFlavor::Stored), workload(20), 4)
        .show_progress(false)
        .run_phase()
        .await
        .unwrap();
    let token = load.mapping_id.unwrap();

    let run = Runner::run(remote(&server, StoreFlavor::Stored), workload(20), 4, token)
        .show_progress(false)
        .run_phase()
        .await
        .unwrap();

    assert_eq!(run.phase, Phase::Run);
    assert_eq!(run.mapping_id, None);
    assert_eq!(
        run.measurements.status_count(OperationKind::Read, Status::Ok),
        40
    );
    assert!(run.summary.operations.contains_key(&OperationKind::Read));
}

#[tokio::test]
async fn deletes_after_load() {
    let server = TestServer::ambry();

    let load = Runner::load(remote(&server, StoreFlavor::Ambry), workload(10), 2)
        .show_progress(false)
        .run_phase()
        .await
        .unwrap();
    let token = load.mapping_id.unwrap();

    let deletes = Workload::builder()
        .record_count(10)
        .operation_count(30)
        .operation_weights(0, 0, 0, 0, 1)
        .build()
        .unwrap();
    let run = Runner::run(remote(&server, StoreFlavor::Ambry), deletes, 1, token)
        .show_progress(false)
        .run_phase()
        .await
        .unwrap();

    // Repeated deletes of the same record are still successful.
    let ok = run.measurements.status_count(OperationKind::Delete, Status::Ok);
    assert_eq!(ok, 30);
    // The mapping blob survives.
    assert!(server.object_count() >= 1);
}

#[tokio::test]
async fn invalid_mapping_id_fails_startup() {
    blobbench_test::tracing::init();
    let server = TestServer::ambry();

    let err = Runner::run(
        remote(&server, StoreFlavor::Ambry),
        workload(10),
        3,
        "/0123456789abcdef0123456789abcdef",
    )
    .show_progress(false)
    .run_phase()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::MappingUnavailable { .. }), "{err:?}");
    assert!(err.is_configuration());
    assert_eq!(server.creates(), 0);
}

#[tokio::test]
async fn unreachable_store_fails_startup() {
    let server = TestServer::ambry();
    let url = server.url("/");
    drop(server);

    let client = ClientBuilder::new(url, StoreFlavor::Ambry).build().unwrap();
    let err = Runner::load(Arc::new(client), workload(10), 2)
        .show_progress(false)
        .run_phase()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Unhealthy { .. }), "{err:?}");
}

#[tokio::test]
async fn client_is_closed_after_the_phase() {
    let server = TestServer::stored();
    let client = ClientBuilder::new(server.url("/"), StoreFlavor::Stored)
        .build()
        .unwrap();

    Runner::load(Arc::new(client.clone()), workload(5), 2)
        .show_progress(false)
        .run_phase()
        .await
        .unwrap();

    let err = client.create("{}").await.unwrap_err();
    assert!(matches!(err, blobbench_client::Error::Closed), "{err:?}");
    assert_eq!(server.creates(), 6);
}
