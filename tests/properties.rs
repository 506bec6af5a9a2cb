use proptest::prelude::*;
use turtledb::*;

const NAMES: [&str; 4] = ["ada", "bob", "cy", "dee"];

/// A store with one record per entry, named after `NAMES[entry]`.
fn seeded(names: &[usize]) -> Store<MemoryStorage> {
    let mut store = Store::open(MemoryStorage::new());
    for (n, name) in names.iter().enumerate() {
        store
            .run(
                "INSERT INTO users (email, name) VALUES (?, ?)",
                &[format!("user{}@example.com", n).into(), NAMES[*name].into()],
            )
            .unwrap();
    }
    store
}

proptest! {
    #[test]
    fn given_sequential_inserts_then_ids_strictly_increase(count in 0usize..30) {
        let mut store = Store::open(MemoryStorage::new());
        let start = store.next_id();
        let mut ids = Vec::new();
        for n in 0..count {
            let result = store
                .run("INSERT INTO users (email) VALUES (?)", &[format!("u{}@example.com", n).into()])
                .unwrap();
            ids.push(result.last_insert_id.unwrap());
        }
        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(store.next_id(), start + count as u64);
        prop_assert_eq!(store.len(), count);
    }

    #[test]
    fn given_equality_filter_then_exact_subset_in_order(
        names in prop::collection::vec(0usize..NAMES.len(), 0..20),
        target in 0usize..NAMES.len(),
    ) {
        let store = seeded(&names);
        let rows = store
            .all("SELECT * FROM users WHERE name = ?", &[NAMES[target].into()])
            .unwrap();

        let expected: Vec<u64> = names
            .iter()
            .enumerate()
            .filter(|(_, name)| **name == target)
            .map(|(n, _)| n as u64 + 1)
            .collect();
        let actual: Vec<u64> = rows.iter().map(|r| r.id).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn given_order_by_then_sorted_and_stable(
        names in prop::collection::vec(0usize..NAMES.len(), 0..20),
        asc in any::<bool>(),
    ) {
        let store = seeded(&names);
        let direction = if asc { "ASC" } else { "DESC" };
        let rows = store
            .all(&format!("SELECT * FROM users ORDER BY name {}", direction), &[])
            .unwrap();
        prop_assert_eq!(rows.len(), names.len());

        for pair in rows.windows(2) {
            let (a, b) = (pair[0].name.as_deref(), pair[1].name.as_deref());
            if asc {
                prop_assert!(a <= b);
            } else {
                prop_assert!(a >= b);
            }
            if a == b {
                prop_assert!(pair[0].id < pair[1].id);
            }
        }
    }

    #[test]
    fn given_update_with_filter_then_only_matches_change(
        names in prop::collection::vec(0usize..NAMES.len(), 0..20),
        target in 0usize..NAMES.len(),
    ) {
        let mut store = seeded(&names);
        let before = store.document().clone();

        let result = store
            .run(
                "UPDATE users SET role = ?, updated_at = CURRENT_TIMESTAMP WHERE name = ?",
                &["admin".into(), NAMES[target].into()],
            )
            .unwrap();

        let matching = names.iter().filter(|name| **name == target).count();
        prop_assert_eq!(result.changes, matching);

        let after = store.document();
        prop_assert_eq!(after.users.len(), before.users.len());
        for (old, new) in before.users.iter().zip(&after.users) {
            if old.name.as_deref() == Some(NAMES[target]) {
                prop_assert_eq!(new.role, Role::Admin);
                prop_assert!(new.updated_at > old.updated_at);
            } else {
                prop_assert_eq!(old, new);
            }
        }

        let saves = if matching > 0 { names.len() + 1 } else { names.len() };
        prop_assert_eq!(store.storage().save_count(), saves);
    }
}
