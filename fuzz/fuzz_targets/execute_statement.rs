#![no_main]

use libfuzzer_sys::fuzz_target;
use turtledb::{MemoryStorage, Store, Value};

// Matched statements must never panic the executor, whatever the parameters.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut parts = text.split('\u{1f}');
    let Some(sql) = parts.next() else {
        return;
    };
    let params: Vec<Value> = parts
        .map(|p| match p.parse::<i128>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Text(p.to_string()),
        })
        .collect();

    let mut store = Store::open(MemoryStorage::new());
    let _ = store.run("INSERT INTO users (email) VALUES (?)", &["seed@example.com".into()]);
    if let Ok(stmt) = turtledb::prepare(sql) {
        let _ = store.execute(&stmt, &params);
    }
});
