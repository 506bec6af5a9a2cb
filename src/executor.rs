use crate::ast::*;
use crate::config::StoreConfig;
use crate::database::{self, Record, StoreDocument};
use crate::error::{Result, StoreError};
use crate::matcher;
use crate::storage::{JsonFileStorage, StorageEngine};
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard};

/// Result of executing a statement without a caller-selected mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(Vec<Record>),
    Inserted { id: u64 },
    Updated { changes: usize },
    Created,
}

/// Mutation result, shaped like a prepared statement's `run()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunResult {
    pub last_insert_id: Option<u64>,
    pub changes: usize,
}

/// Owns the in-memory document and the engine that persists it.
pub struct Store<S: StorageEngine> {
    doc: StoreDocument,
    storage: S,
    reload_after_write: bool,
}

impl Store<JsonFileStorage> {
    pub fn from_config(config: &StoreConfig) -> Self {
        let mut store = Store::open(JsonFileStorage::from_config(config));
        store.reload_after_write = config.reload_after_write;
        store
    }
}

impl<S: StorageEngine> Store<S> {
    /// Load the document from `storage`.
    pub fn open(storage: S) -> Self {
        let doc = storage.load();
        Store {
            doc,
            storage,
            reload_after_write: false,
        }
    }

    pub fn reload_after_write(mut self, enabled: bool) -> Self {
        self.reload_after_write = enabled;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.doc.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.users.is_empty()
    }

    /// Identifier the next INSERT will receive.
    pub fn next_id(&self) -> u64 {
        self.doc.next_id
    }

    #[cfg(feature = "testing-api")]
    pub fn document(&self) -> &StoreDocument {
        &self.doc
    }

    /// Replace the in-memory document with what the engine holds.
    pub fn reload(&mut self) {
        self.doc = self.storage.load();
    }

    /// Single-row mode: the first matching record, or `None`.
    pub fn get(&self, sql: &str, params: &[Value]) -> Result<Option<Record>> {
        let stmt = select_only(matcher::parse(sql)?, "get")?;
        Ok(self.select(&stmt, params)?.into_iter().next())
    }

    /// Multi-row mode: every matching record.
    pub fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let stmt = select_only(matcher::parse(sql)?, "all")?;
        self.select(&stmt, params)
    }

    /// Mutation mode for INSERT, UPDATE and CREATE.
    pub fn run(&mut self, sql: &str, params: &[Value]) -> Result<RunResult> {
        let stmt = matcher::parse(sql)?;
        if let Statement::Select(_) = stmt {
            return Err(StoreError::Mode {
                operation: "run",
                statement: stmt.kind(),
            });
        }
        Ok(match self.execute(&stmt, params)? {
            Outcome::Inserted { id } => RunResult {
                last_insert_id: Some(id),
                changes: 1,
            },
            Outcome::Updated { changes } => RunResult {
                last_insert_id: None,
                changes,
            },
            Outcome::Rows(_) | Outcome::Created => RunResult::default(),
        })
    }

    /// Execute an already matched statement.
    pub fn execute(&mut self, stmt: &Statement, params: &[Value]) -> Result<Outcome> {
        match stmt {
            Statement::Select(select) => self.select(select, params).map(Outcome::Rows),
            Statement::Insert(insert) => {
                let mut binder = Binder::new(stmt, params)?;
                self.insert(insert, &mut binder)
                    .map(|id| Outcome::Inserted { id })
            }
            Statement::Update(update) => {
                let mut binder = Binder::new(stmt, params)?;
                self.update(update, &mut binder)
                    .map(|changes| Outcome::Updated { changes })
            }
            Statement::Create => {
                debug!("CREATE accepted as no-op");
                Ok(Outcome::Created)
            }
        }
    }

    fn select(&self, stmt: &SelectStatement, params: &[Value]) -> Result<Vec<Record>> {
        let mut binder = Binder::for_select(stmt, params)?;
        let filter = binder.filter(stmt.filter.as_ref())?;

        let mut rows: Vec<Record> = self
            .doc
            .users
            .iter()
            .filter(|record| matches_filter(record, filter.as_ref()))
            .cloned()
            .collect();

        if let Some(order) = &stmt.order_by {
            // sort_by is stable, so ties keep their stored order.
            rows.sort_by(|a, b| {
                let ord = a.field(order.column).cmp(&b.field(order.column));
                if order.asc { ord } else { ord.reverse() }
            });
        }

        debug!("SELECT matched {} row(s)", rows.len());
        Ok(rows)
    }

    fn insert(&mut self, stmt: &InsertStatement, binder: &mut Binder) -> Result<u64> {
        let values = stmt
            .values
            .iter()
            .map(|operand| binder.resolve(operand))
            .collect::<Result<Vec<_>>>()?;

        if !stmt.columns.contains(&Column::Email) {
            return Err(StoreError::invalid_value("email", "required"));
        }

        let mut working = self.doc.clone();
        let id = working.allocate_id()?;
        let mut record = Record::new(id, String::new(), database::now());
        for (column, value) in stmt.columns.iter().zip(values) {
            apply(&mut record, *column, value)?;
        }
        working.users.push(record);

        self.commit(working)?;
        debug!("INSERT assigned id {}", id);
        Ok(id)
    }

    fn update(&mut self, stmt: &UpdateStatement, binder: &mut Binder) -> Result<usize> {
        // SET placeholders bind before the WHERE placeholder.
        let assignments = stmt
            .assignments
            .iter()
            .map(|assignment| -> Result<(Column, Option<Value>)> {
                match &assignment.value {
                    AssignValue::Operand(operand) => {
                        Ok((assignment.column, Some(binder.resolve(operand)?)))
                    }
                    AssignValue::CurrentTimestamp => Ok((assignment.column, None)),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let filter = binder.filter(stmt.filter.as_ref())?;

        let now = database::now();
        let mut working = self.doc.clone();
        let mut changes = 0;
        for record in working
            .users
            .iter_mut()
            .filter(|record| matches_filter(record, filter.as_ref()))
        {
            for (column, value) in &assignments {
                match value {
                    Some(value) => apply(record, *column, value.clone())?,
                    None => record.touch(now),
                }
            }
            changes += 1;
        }

        if changes == 0 {
            debug!("UPDATE matched no rows");
            return Ok(0);
        }

        self.commit(working)?;
        if self.reload_after_write {
            self.reload();
        }
        debug!("UPDATE changed {} row(s)", changes);
        Ok(changes)
    }

    /// Persist `working` and adopt it. On failure memory keeps the old document.
    fn commit(&mut self, working: StoreDocument) -> Result<()> {
        self.storage.save(&working)?;
        self.doc = working;
        Ok(())
    }
}

/// Hands out positional parameters in placeholder order.
struct Binder<'a> {
    params: &'a [Value],
    next: usize,
}

impl<'a> Binder<'a> {
    fn new(stmt: &Statement, params: &'a [Value]) -> Result<Self> {
        let expected = stmt.placeholder_count();
        if expected != params.len() {
            return Err(StoreError::ParameterCount {
                expected,
                actual: params.len(),
            });
        }
        Ok(Binder { params, next: 0 })
    }

    fn for_select(stmt: &SelectStatement, params: &'a [Value]) -> Result<Self> {
        let expected = stmt
            .filter
            .as_ref()
            .is_some_and(|f| f.value.is_placeholder()) as usize;
        if expected != params.len() {
            return Err(StoreError::ParameterCount {
                expected,
                actual: params.len(),
            });
        }
        Ok(Binder { params, next: 0 })
    }

    fn resolve(&mut self, operand: &Operand) -> Result<Value> {
        match operand {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Placeholder => {
                let value = self.params.get(self.next).cloned().ok_or(
                    StoreError::ParameterCount {
                        expected: self.next + 1,
                        actual: self.params.len(),
                    },
                )?;
                self.next += 1;
                Ok(value)
            }
        }
    }

    fn filter(&mut self, filter: Option<&Filter>) -> Result<Option<(Column, Value)>> {
        match filter {
            Some(f) => Ok(Some((f.column, self.resolve(&f.value)?))),
            None => Ok(None),
        }
    }
}

fn select_only(stmt: Statement, operation: &'static str) -> Result<SelectStatement> {
    match stmt {
        Statement::Select(select) => Ok(select),
        other => Err(StoreError::Mode {
            operation,
            statement: other.kind(),
        }),
    }
}

fn matches_filter(record: &Record, filter: Option<&(Column, Value)>) -> bool {
    filter.is_none_or(|(column, value)| record.field(*column).matches(value))
}

fn apply(record: &mut Record, column: Column, value: Value) -> Result<()> {
    match column {
        Column::Email => {
            record.email = value
                .into_text()
                .ok_or_else(|| StoreError::invalid_value("email", "cannot be NULL"))?;
        }
        Column::Password => record.password = value.into_text(),
        Column::Name => record.name = value.into_text(),
        Column::GoogleId => record.google_id = value.into_text(),
        Column::Role => {
            record.role = value
                .into_text()
                .ok_or_else(|| StoreError::invalid_value("role", "cannot be NULL"))?
                .parse()?;
        }
        Column::Id | Column::CreatedAt | Column::UpdatedAt => {
            return Err(StoreError::invalid_value(
                column.name(),
                "assigned by the store",
            ));
        }
    }
    Ok(())
}

/// A [`Store`] behind a mutex, for callers that share it across threads.
pub struct SharedStore<S: StorageEngine> {
    inner: Arc<Mutex<Store<S>>>,
}

impl<S: StorageEngine> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        SharedStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StorageEngine> SharedStore<S> {
    pub fn new(store: Store<S>) -> Self {
        SharedStore {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store<S>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access, e.g. for a read-then-write sequence.
    pub fn with<R>(&self, f: impl FnOnce(&mut Store<S>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn get(&self, sql: &str, params: &[Value]) -> Result<Option<Record>> {
        self.lock().get(sql, params)
    }

    pub fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        self.lock().all(sql, params)
    }

    pub fn run(&self, sql: &str, params: &[Value]) -> Result<RunResult> {
        self.lock().run(sql, params)
    }
}
