use environment_controller::model::{ContainerRun, ContainerStatus};
use environment_controller::storage::Storage;
use fabric_common::model::{Image, ImageStatus};
use uuid::Uuid;

#[test]
fn image_upsert_round_trips_through_sqlite() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();

    let image = Image {
        image_tag: "distfabric/grid_search:abc123".to_string(),
        image_id: None,
        status: ImageStatus::Building,
    };
    storage.upsert_image(&image).unwrap();

    let fetched = storage.get_image(&image.image_tag).unwrap().unwrap();
    assert_eq!(fetched.status, ImageStatus::Building);
    assert_eq!(fetched.image_id, None);

    storage
        .upsert_image(&Image {
            image_tag: image.image_tag.clone(),
            image_id: Some("sha256:deadbeef".to_string()),
            status: ImageStatus::Pushed,
        })
        .unwrap();

    let fetched = storage.get_image(&image.image_tag).unwrap().unwrap();
    assert_eq!(fetched.status, ImageStatus::Pushed);
    assert_eq!(fetched.image_id.as_deref(), Some("sha256:deadbeef"));
}

#[test]
fn container_run_round_trips_through_sqlite() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    let subtask_uid = Uuid::new_v4();

    storage
        .upsert_container_run(&ContainerRun {
            subtask_uid,
            image_tag: "distfabric/grid_search:abc123".to_string(),
            status: ContainerStatus::Creating,
        })
        .unwrap();
    assert_eq!(
        storage.get_container_run(subtask_uid).unwrap().unwrap().status,
        ContainerStatus::Creating
    );

    storage
        .upsert_container_run(&ContainerRun {
            subtask_uid,
            image_tag: "distfabric/grid_search:abc123".to_string(),
            status: ContainerStatus::Success,
        })
        .unwrap();
    assert_eq!(
        storage.get_container_run(subtask_uid).unwrap().unwrap().status,
        ContainerStatus::Success
    );
}
