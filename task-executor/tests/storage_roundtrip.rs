use fabric_common::model::{ExecutorSubtask, ExecutorSubtaskStatus};
use task_executor::storage::Storage;
use uuid::Uuid;

fn subtask() -> ExecutorSubtask {
    ExecutorSubtask {
        subtask_uid: Uuid::new_v4(),
        creator_uid: Uuid::new_v4(),
        dataset_uid: None,
        status: ExecutorSubtaskStatus::WaitingParams,
        created_at: None,
        finished_at: None,
    }
}

#[test]
fn subtask_upsert_round_trips_through_sqlite() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    let s = subtask();
    storage.upsert(&s).unwrap();

    let fetched = storage.get(s.subtask_uid).unwrap().unwrap();
    assert_eq!(fetched.status, ExecutorSubtaskStatus::WaitingParams);
    assert!(fetched.dataset_uid.is_none());
    assert!(fetched.created_at.is_none());

    let dataset_uid = Uuid::new_v4();
    storage
        .upsert(&ExecutorSubtask {
            dataset_uid: Some(dataset_uid),
            status: ExecutorSubtaskStatus::Running,
            created_at: Some(chrono::Utc::now()),
            ..s.clone()
        })
        .unwrap();

    let fetched = storage.get(s.subtask_uid).unwrap().unwrap();
    assert_eq!(fetched.status, ExecutorSubtaskStatus::Running);
    assert_eq!(fetched.dataset_uid, Some(dataset_uid));
    assert!(fetched.created_at.is_some());
}

#[test]
fn all_lists_every_subtask() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    storage.upsert(&subtask()).unwrap();
    storage.upsert(&subtask()).unwrap();
    assert_eq!(storage.all().unwrap().len(), 2);
}
