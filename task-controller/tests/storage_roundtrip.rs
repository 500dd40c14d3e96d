use fabric_common::model::{CreatorSubtask, CreatorSubtaskStatus, SubtaskType, Task, TaskStatus, TaskType};
use task_controller::storage::Storage;
use uuid::Uuid;

fn task() -> Task {
    Task {
        task_uid: Uuid::new_v4(),
        task_type: TaskType::GridSearch,
        creator_uid: Uuid::new_v4(),
        status: TaskStatus::Creating,
        dataset_uid: None,
        created_at: None,
        finished_at: None,
        params: serde_json::json!({"subtasks_params": []}),
        result: None,
        subtasks: Vec::new(),
    }
}

#[test]
fn task_upsert_round_trips_through_sqlite() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    let t = task();
    storage.upsert_task(&t).unwrap();

    let fetched = storage.get_task(t.task_uid).unwrap().unwrap();
    assert_eq!(fetched.status, TaskStatus::Creating);
    assert!(fetched.dataset_uid.is_none());
    assert!(fetched.subtasks.is_empty());

    storage
        .upsert_task(&Task {
            status: TaskStatus::Success,
            finished_at: Some(chrono::Utc::now()),
            result: Some(serde_json::json!({"result": {"f1_score": 0.9}})),
            ..t.clone()
        })
        .unwrap();

    let fetched = storage.get_task(t.task_uid).unwrap().unwrap();
    assert_eq!(fetched.status, TaskStatus::Success);
    assert!(fetched.finished_at.is_some());
    assert_eq!(fetched.result.unwrap()["result"]["f1_score"], 0.9);
}

#[test]
fn creator_subtasks_round_trip_and_attach_to_task() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    let t = task();
    storage.upsert_task(&t).unwrap();

    let subtask = CreatorSubtask {
        subtask_uid: Uuid::new_v4(),
        task_uid: t.task_uid,
        subtask_type: SubtaskType::GridSearch,
        executor_uid: Some(Uuid::new_v4()),
        status: CreatorSubtaskStatus::WaitingExecutorAssignment,
        created_at: None,
        finished_at: None,
        params: serde_json::json!({"subtask_params": [{"criterion": "gini"}]}),
        result: None,
    };
    storage.upsert_creator_subtask(&subtask).unwrap();

    let fetched = storage.get_task(t.task_uid).unwrap().unwrap();
    assert_eq!(fetched.subtasks.len(), 1);
    assert_eq!(fetched.subtasks[0].subtask_uid, subtask.subtask_uid);
}

#[test]
fn all_tasks_lists_every_task() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    storage.upsert_task(&task()).unwrap();
    storage.upsert_task(&task()).unwrap();
    assert_eq!(storage.all_tasks().unwrap().len(), 2);
}
