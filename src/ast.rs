use crate::error::StoreError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Create,
}

impl Statement {
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Create => "CREATE",
        }
    }

    /// Number of `?` placeholders, in binding order.
    pub fn placeholder_count(&self) -> usize {
        match self {
            Statement::Select(stmt) => stmt
                .filter
                .iter()
                .filter(|f| f.value.is_placeholder())
                .count(),
            Statement::Insert(stmt) => stmt.values.iter().filter(|v| v.is_placeholder()).count(),
            Statement::Update(stmt) => {
                let set = stmt
                    .assignments
                    .iter()
                    .filter(|a| matches!(a.value, AssignValue::Operand(Operand::Placeholder)))
                    .count();
                let filter = stmt
                    .filter
                    .iter()
                    .filter(|f| f.value.is_placeholder())
                    .count();
                set + filter
            }
            Statement::Create => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub filter: Option<Filter>,
    pub order_by: Option<OrderBy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub columns: Vec<Column>,
    pub values: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub assignments: Vec<Assignment>,
    pub filter: Option<Filter>,
}

/// A single `column = operand` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: Column,
    pub value: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: Column,
    pub asc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: Column,
    pub value: AssignValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
    Operand(Operand),
    CurrentTimestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Placeholder,
    Literal(Value),
}

impl Operand {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Operand::Placeholder)
    }
}

/// Columns of the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Email,
    Password,
    Name,
    GoogleId,
    Role,
    CreatedAt,
    UpdatedAt,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Email => "email",
            Column::Password => "password",
            Column::Name => "name",
            Column::GoogleId => "google_id",
            Column::Role => "role",
            Column::CreatedAt => "created_at",
            Column::UpdatedAt => "updated_at",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "id" => Ok(Column::Id),
            "email" => Ok(Column::Email),
            "password" => Ok(Column::Password),
            "name" => Ok(Column::Name),
            "google_id" => Ok(Column::GoogleId),
            "role" => Ok(Column::Role),
            "created_at" => Ok(Column::CreatedAt),
            "updated_at" => Ok(Column::UpdatedAt),
            _ => Err(StoreError::UnknownColumn(s.to_string())),
        }
    }
}

/// A positional parameter or inline literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// Wide enough for every `i64` parameter and every `u64` identifier.
    Integer(i128),
    Text(String),
}

impl Value {
    /// Equality as used by WHERE: `NULL` never matches, an integer matches
    /// numeric text.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Integer(a), Value::Text(b)) | (Value::Text(b), Value::Integer(a)) => {
                b.trim().parse::<i128>().is_ok_and(|b| b == *a)
            }
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(n) => Some(n.to_string()),
            Value::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(i128::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Integer(i128::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Integer(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Integer(_)) => Ordering::Greater,
        }
    }
}
