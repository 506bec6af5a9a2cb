//! Classifies statement strings and turns them into [`Statement`] values.
//!
//! This is deliberately not a SQL parser. Each supported statement shape has
//! one pattern, and anything outside those shapes is rejected with
//! [`StoreError::Unsupported`] rather than executed partially.

use crate::ast::*;
use crate::error::{Result, StoreError};
use regex::{Captures, Regex};
use std::sync::LazyLock;

const TABLE: &str = "users";

static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)\b").expect("keyword pattern"));

static SELECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^SELECT\s+(?P<projection>.+?)\s+FROM\s+(?P<table>\w+)(?:\s+WHERE\s+(?P<where>.+?))?(?:\s+ORDER\s+BY\s+(?P<order>.+?))?$",
    )
    .expect("SELECT pattern")
});

static INSERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^INSERT\s+INTO\s+(?P<table>\w+)\s*\((?P<columns>[^)]*)\)\s*VALUES\s*\((?P<values>.*)\)$",
    )
    .expect("INSERT pattern")
});

static UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^UPDATE\s+(?P<table>\w+)\s+SET\s+(?P<set>.+?)(?:\s+WHERE\s+(?P<where>.+))?$")
        .expect("UPDATE pattern")
});

static PREDICATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^(?P<column>\w+)\s*=\s*(?P<operand>\?|NULL|-?\d+|'(?:[^']|'')*'|"(?:[^"]|"")*")$"#)
        .expect("predicate pattern")
});

static COMPOUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s(AND|OR)\s").expect("compound pattern"));

static ORDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<column>\w+)(?:\s+(?P<direction>ASC|DESC))?$").expect("ORDER BY pattern")
});

static ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?P<column>\w+)\s*=\s*(?P<value>.+)$").expect("assignment pattern")
});

static NOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(CURRENT_TIMESTAMP|NOW\(\s*\))$").expect("timestamp pattern")
});

static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+$").expect("integer pattern"));

/// Match `sql` against the supported statement shapes.
pub fn parse(sql: &str) -> Result<Statement> {
    let sql = sql.trim();
    let sql = sql.strip_suffix(';').unwrap_or(sql).trim_end();

    let keyword = KEYWORD_RE
        .captures(sql)
        .map(|caps| caps[1].to_ascii_uppercase())
        .ok_or_else(|| StoreError::unsupported("empty or malformed statement"))?;

    match keyword.as_str() {
        "SELECT" => parse_select(sql),
        "INSERT" => parse_insert(sql),
        "UPDATE" => parse_update(sql),
        "CREATE" => Ok(Statement::Create),
        other => Err(StoreError::unsupported(format!(
            "'{}' statements are not supported",
            other
        ))),
    }
}

fn parse_select(sql: &str) -> Result<Statement> {
    let masked = mask_literals(sql);
    let caps = SELECT_RE
        .captures(&masked)
        .ok_or_else(|| StoreError::unsupported("malformed SELECT"))?;
    check_table(&caps["table"])?;

    let filter = clause(sql, &caps, "where").map(parse_filter).transpose()?;
    let order_by = clause(sql, &caps, "order")
        .map(parse_order_by)
        .transpose()?;

    Ok(Statement::Select(SelectStatement { filter, order_by }))
}

fn parse_insert(sql: &str) -> Result<Statement> {
    let masked = mask_literals(sql);
    let caps = INSERT_RE
        .captures(&masked)
        .ok_or_else(|| StoreError::unsupported("malformed INSERT"))?;
    check_table(&caps["table"])?;

    let mut columns = Vec::new();
    for name in split_list(clause(sql, &caps, "columns").unwrap_or_default())? {
        let column: Column = name.parse()?;
        if matches!(column, Column::Id | Column::CreatedAt | Column::UpdatedAt) {
            return Err(StoreError::invalid_value(
                column.name(),
                "assigned by the store",
            ));
        }
        if columns.contains(&column) {
            return Err(StoreError::unsupported(format!(
                "column '{}' listed twice",
                column
            )));
        }
        columns.push(column);
    }

    let values = split_list(clause(sql, &caps, "values").unwrap_or_default())?
        .into_iter()
        .map(parse_operand)
        .collect::<Result<Vec<_>>>()?;

    if columns.len() != values.len() {
        return Err(StoreError::unsupported(format!(
            "column count mismatch: {} column(s), {} value(s)",
            columns.len(),
            values.len()
        )));
    }

    Ok(Statement::Insert(InsertStatement { columns, values }))
}

fn parse_update(sql: &str) -> Result<Statement> {
    let masked = mask_literals(sql);
    let caps = UPDATE_RE
        .captures(&masked)
        .ok_or_else(|| StoreError::unsupported("malformed UPDATE"))?;
    check_table(&caps["table"])?;

    let assignments = split_list(clause(sql, &caps, "set").unwrap_or_default())?
        .into_iter()
        .map(parse_assignment)
        .collect::<Result<Vec<_>>>()?;
    let filter = clause(sql, &caps, "where").map(parse_filter).transpose()?;

    Ok(Statement::Update(UpdateStatement {
        assignments,
        filter,
    }))
}

fn parse_assignment(text: &str) -> Result<Assignment> {
    let caps = ASSIGNMENT_RE
        .captures(text)
        .ok_or_else(|| StoreError::unsupported(format!("malformed assignment '{}'", text)))?;
    let column: Column = caps["column"].parse()?;
    let raw = caps["value"].trim();

    let value = if NOW_RE.is_match(raw) {
        AssignValue::CurrentTimestamp
    } else {
        AssignValue::Operand(parse_operand(raw)?)
    };

    match (column, &value) {
        (
            Column::Role | Column::Password | Column::Name | Column::GoogleId,
            AssignValue::Operand(_),
        ) => {}
        (Column::UpdatedAt, AssignValue::CurrentTimestamp) => {}
        (Column::UpdatedAt, _) => {
            return Err(StoreError::invalid_value(
                column.name(),
                "only CURRENT_TIMESTAMP can be assigned",
            ));
        }
        (_, AssignValue::CurrentTimestamp) => {
            return Err(StoreError::invalid_value(
                column.name(),
                "CURRENT_TIMESTAMP is only accepted for updated_at",
            ));
        }
        _ => {
            return Err(StoreError::invalid_value(
                column.name(),
                "column cannot be updated",
            ));
        }
    }

    Ok(Assignment { column, value })
}

fn parse_filter(text: &str) -> Result<Filter> {
    let text = text.trim();
    let Some(caps) = PREDICATE_RE.captures(text) else {
        if COMPOUND_RE.is_match(&mask_literals(text)) {
            return Err(StoreError::unsupported(
                "WHERE supports a single predicate, AND/OR are not supported",
            ));
        }
        return Err(StoreError::unsupported(format!(
            "WHERE supports only `column = value`, got '{}'",
            text
        )));
    };

    Ok(Filter {
        column: caps["column"].parse()?,
        value: parse_operand(&caps["operand"])?,
    })
}

fn parse_order_by(text: &str) -> Result<OrderBy> {
    let caps = ORDER_RE.captures(text.trim()).ok_or_else(|| {
        StoreError::unsupported(format!("ORDER BY supports one column, got '{}'", text))
    })?;
    let asc = caps
        .name("direction")
        .is_none_or(|d| d.as_str().eq_ignore_ascii_case("ASC"));

    Ok(OrderBy {
        column: caps["column"].parse()?,
        asc,
    })
}

fn parse_operand(text: &str) -> Result<Operand> {
    let text = text.trim();
    if text == "?" {
        return Ok(Operand::Placeholder);
    }
    if text.eq_ignore_ascii_case("NULL") {
        return Ok(Operand::Literal(Value::Null));
    }
    if INTEGER_RE.is_match(text) {
        return text
            .parse::<i128>()
            .map(|n| Operand::Literal(Value::Integer(n)))
            .map_err(|_| StoreError::unsupported(format!("integer out of range: {}", text)));
    }
    for quote in ['\'', '"'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
            .filter(|_| text.len() >= 2)
        {
            let doubled = format!("{quote}{quote}");
            return Ok(Operand::Literal(Value::Text(
                inner.replace(&doubled, &quote.to_string()),
            )));
        }
    }
    Err(StoreError::unsupported(format!("unrecognized value '{}'", text)))
}

/// Copy of `sql` with the inside of every quoted literal blanked out, so a
/// keyword in a literal cannot end a clause. Byte offsets are unchanged.
fn mask_literals(sql: &str) -> String {
    let mut masked = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    for ch in sql.chars() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                masked.push(ch);
            }
            Some(_) => masked.extend(std::iter::repeat_n('_', ch.len_utf8())),
            None => {
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
                masked.push(ch);
            }
        }
    }
    masked
}

/// The text of a named group, taken from the unmasked statement.
fn clause<'a>(sql: &'a str, caps: &Captures<'_>, name: &str) -> Option<&'a str> {
    caps.name(name).map(|m| &sql[m.range()])
}

fn check_table(name: &str) -> Result<()> {
    if name.eq_ignore_ascii_case(TABLE) {
        Ok(())
    } else {
        Err(StoreError::unsupported(format!("unknown table '{}'", name)))
    }
}

/// Split a comma separated list, ignoring commas inside quotes or parentheses.
fn split_list(text: &str) -> Result<Vec<&str>> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                items.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(StoreError::unsupported("unterminated string literal"));
    }
    items.push(text[start..].trim());

    if items.iter().any(|item| item.is_empty()) {
        return Err(StoreError::unsupported(format!("empty item in list '{}'", text)));
    }
    Ok(items)
}
