use chrono::{NaiveDate, TimeZone, Utc};
use zentask_core::calendar::build_calendar_url;
use zentask_core::datastore::DataStore;
use zentask_core::grouping::group_by_due_date;
use zentask_core::progress::compute_progress;
use zentask_core::store::TaskStore;
use zentask_core::task::Priority;
use tempfile::tempdir;

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
}

#[test]
fn store_roundtrip_and_derived_views() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(DataStore::open(temp.path()).expect("open datastore"));

    let at = |ms: i64| Utc.timestamp_millis_opt(ms).single().expect("valid instant");
    let later = store
        .create_at("Ship release", day("2024-06-02"), Priority::High, at(10))
        .expect("created");
    let older = store
        .create_at("Write notes", day("2024-06-01"), Priority::Medium, at(20))
        .expect("created");
    let newest = store
        .create_at("Buy milk & eggs", day("2024-06-01"), Priority::Low, at(30))
        .expect("created");

    store.toggle_completed(&older.id);
    store.mark_synced(&later.id);

    let reopened = TaskStore::open(DataStore::open(temp.path()).expect("reopen datastore"));
    assert_eq!(reopened.tasks(), store.tasks());
    let stored_newest = reopened.get(&newest.id).expect("present");
    assert_eq!(stored_newest, &newest);
    assert!(!stored_newest.is_synced);

    let groups = group_by_due_date(reopened.tasks());
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].date, day("2024-06-01"));
    let first: Vec<&str> = groups[0].tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(first, vec![newest.id.as_str(), older.id.as_str()]);

    let progress = compute_progress(reopened.tasks());
    assert_eq!((progress.completed, progress.total, progress.percent), (1, 3, 33));

    let url = build_calendar_url(stored_newest);
    assert!(url.contains("dates=20240601/20240602"));
    assert!(url.contains("text=Buy%20milk%20%26%20eggs"));
}

#[test]
fn corrupt_storage_starts_empty_and_recovers_on_write() {
    let temp = tempdir().expect("tempdir");
    let datastore = DataStore::open(temp.path()).expect("open datastore");
    std::fs::write(&datastore.tasks_path, "[{\"id\": 1}]").expect("write garbage");

    let mut store = TaskStore::open(datastore);
    assert!(store.tasks().is_empty());

    store.create("fresh start", day("2024-06-01"), Priority::Medium);
    let reopened = TaskStore::open(DataStore::open(temp.path()).expect("reopen datastore"));
    assert_eq!(reopened.tasks().len(), 1);
}

#[test]
fn deleting_unknown_id_leaves_collection_untouched() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(DataStore::open(temp.path()).expect("open datastore"));
    store.create("one", day("2024-06-01"), Priority::Medium);
    store.create("two", day("2024-06-02"), Priority::Medium);
    let before = store.tasks().to_vec();

    assert!(!store.delete("00000000-0000-0000-0000-000000000000"));
    assert_eq!(store.tasks(), before.as_slice());
}
