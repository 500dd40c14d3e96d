use data_controller::storage::Storage;
use fabric_common::model::{Dataset, DatasetStatus};
use std::path::PathBuf;
use uuid::Uuid;

#[test]
fn dataset_upsert_round_trips_through_sqlite() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    let dataset_uid = Uuid::new_v4();

    storage
        .upsert(&Dataset {
            dataset_uid,
            magnet_link: None,
            path: PathBuf::from("/data/storage/placeholder"),
            status: DatasetStatus::Creating,
        })
        .unwrap();
    let fetched = storage.get(dataset_uid).unwrap().unwrap();
    assert_eq!(fetched.status, DatasetStatus::Creating);
    assert_eq!(fetched.magnet_link, None);

    storage
        .upsert(&Dataset {
            dataset_uid,
            magnet_link: Some("magnet:?xt=urn:btih:ABCDEF0123456789".to_string()),
            path: PathBuf::from("/data/storage/placeholder"),
            status: DatasetStatus::Available,
        })
        .unwrap();
    let fetched = storage.get(dataset_uid).unwrap().unwrap();
    assert_eq!(fetched.status, DatasetStatus::Available);
    assert_eq!(
        fetched.magnet_link.as_deref(),
        Some("magnet:?xt=urn:btih:ABCDEF0123456789")
    );
}

#[test]
fn unknown_dataset_returns_none() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    assert!(storage.get(Uuid::new_v4()).unwrap().is_none());
}
