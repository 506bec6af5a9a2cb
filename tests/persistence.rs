use std::fs;
use std::path::Path;
use turtledb::*;

fn file_store(path: &Path) -> Store<JsonFileStorage> {
    Store::open(JsonFileStorage::new(path))
}

fn serialized(store: &Store<JsonFileStorage>) -> String {
    serde_json::to_string_pretty(store.document()).unwrap()
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");

    let mut store = file_store(&path);
    store
        .run(
            "INSERT INTO users (email, password, name) VALUES (?, ?, ?)",
            &["a@example.com".into(), "hash".into(), "Ada".into()],
        )
        .unwrap();
    store
        .run(
            "INSERT INTO users (email, google_id, role) VALUES (?, ?, 'admin')",
            &["b@example.com".into(), "g-123".into()],
        )
        .unwrap();

    let reopened = file_store(&path);
    assert_eq!(reopened.document(), store.document());
    assert_eq!(reopened.next_id(), 3);
}

#[test]
fn test_file_matches_memory_after_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");

    let mut store = file_store(&path);
    assert!(!path.exists());

    store
        .run("INSERT INTO users (email) VALUES (?)", &["a@example.com".into()])
        .unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), serialized(&store));

    store
        .run(
            "UPDATE users SET name = ? WHERE email = ?",
            &["Ada".into(), "a@example.com".into()],
        )
        .unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), serialized(&store));
}

#[test]
fn test_reads_and_empty_updates_do_not_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");

    let mut store = file_store(&path);
    store
        .run("INSERT INTO users (email) VALUES (?)", &["a@example.com".into()])
        .unwrap();

    // Replace the file with a marker; any write would overwrite it.
    fs::write(&path, "marker").unwrap();

    store.all("SELECT * FROM users ORDER BY email DESC", &[]).unwrap();
    store
        .get("SELECT * FROM users WHERE id = ?", &[Value::Integer(1)])
        .unwrap();
    let result = store
        .run(
            "UPDATE users SET role = ? WHERE id = ?",
            &["admin".into(), Value::Integer(99)],
        )
        .unwrap();
    assert_eq!(result.changes, 0);
    store.run("CREATE TABLE users (id INTEGER)", &[]).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "marker");
}

#[test]
fn test_corrupted_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    fs::write(&path, "{\"users\": [ {\"id\": ").unwrap();

    let store = file_store(&path);
    assert!(store.is_empty());
    assert_eq!(store.next_id(), 1);
    assert_eq!(store.document(), &StoreDocument::new());
}

#[test]
fn test_write_failure_keeps_memory_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    let mut store = file_store(&blocker.join("users.json"));
    let err = store
        .run("INSERT INTO users (email) VALUES (?)", &["a@example.com".into()])
        .unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
    assert!(store.is_empty());
    assert_eq!(store.next_id(), 1);
}

#[test]
fn test_existing_file_layout_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    fs::write(
        &path,
        r#"{
  "users": [
    {
      "id": 7,
      "email": "admin@example.com",
      "password": "$2a$10$abc",
      "name": "Admin",
      "google_id": null,
      "role": "admin",
      "created_at": "2024-03-01T09:30:00.000Z",
      "updated_at": "2024-03-02T10:00:00.250Z"
    }
  ],
  "nextId": 8
}"#,
    )
    .unwrap();

    let mut store = file_store(&path);
    let admin = store
        .get("SELECT * FROM users WHERE role = ?", &["admin".into()])
        .unwrap()
        .unwrap();
    assert_eq!(admin.id, 7);
    assert_eq!(admin.role, Role::Admin);

    let id = store
        .run("INSERT INTO users (email) VALUES (?)", &["b@example.com".into()])
        .unwrap()
        .last_insert_id;
    assert_eq!(id, Some(8));

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"nextId\": 9"));
    assert!(raw.contains("\"updated_at\": \"2024-03-02T10:00:00.250Z\""));
}

#[test]
fn test_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        path: dir.path().join("data").join("users.json"),
        ..StoreConfig::default()
    };

    let mut store = Store::from_config(&config);
    store
        .run("INSERT INTO users (email) VALUES (?)", &["a@example.com".into()])
        .unwrap();
    assert!(config.path.exists());
    assert_eq!(store.storage().path(), config.path.as_path());
}
