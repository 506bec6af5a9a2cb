use crate::ast::{Column, Value};
use crate::error::{Result, StoreError};
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access level of an account. Serialized as `"community"` / `"admin"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Community,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Community => "community",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "community" => Ok(Role::Community),
            "admin" => Ok(Role::Admin),
            other => Err(StoreError::invalid_value(
                "role",
                format!("'{}' is not one of community, admin", other),
            )),
        }
    }
}

/// One user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub email: String,
    pub password: Option<String>,
    pub name: Option<String>,
    pub google_id: Option<String>,
    pub role: Role,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(id: u64, email: String, now: DateTime<Utc>) -> Self {
        Record {
            id,
            email,
            password: None,
            name: None,
            google_id: None,
            role: Role::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The value a WHERE or ORDER BY clause sees for `column`.
    pub fn field(&self, column: Column) -> Value {
        match column {
            Column::Id => Value::Integer(i128::from(self.id)),
            Column::Email => Value::Text(self.email.clone()),
            Column::Password => Value::from(self.password.clone()),
            Column::Name => Value::from(self.name.clone()),
            Column::GoogleId => Value::from(self.google_id.clone()),
            Column::Role => Value::Text(self.role.as_str().to_string()),
            Column::CreatedAt => Value::Text(iso_millis::format(&self.created_at)),
            Column::UpdatedAt => Value::Text(iso_millis::format(&self.updated_at)),
        }
    }

    /// Move `updated_at` to `now`, or one millisecond past its current value
    /// when the clock has not advanced.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + TimeDelta::milliseconds(1)
        };
    }
}

/// The persisted unit: every record plus the next identifier to hand out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub users: Vec<Record>,
    #[serde(rename = "nextId")]
    pub next_id: u64,
}

impl StoreDocument {
    pub fn new() -> Self {
        StoreDocument {
            users: Vec::new(),
            next_id: 1,
        }
    }

    /// Hands out the current counter value and advances it. The counter
    /// is left untouched once it cannot advance past `u64::MAX`.
    pub fn allocate_id(&mut self) -> Result<u64> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| StoreError::invalid_value("id", "identifier counter exhausted"))?;
        Ok(id)
    }
}

impl Default for StoreDocument {
    fn default() -> Self {
        StoreDocument::new()
    }
}

/// Current time at the precision the file format keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(iso_millis::format(&ts), "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_document_layout() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut doc = StoreDocument::new();
        let id = doc.allocate_id().unwrap();
        doc.users.push(Record::new(id, "a@example.com".into(), ts));

        let json: serde_json::Value = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["nextId"], 2);
        assert_eq!(json["users"][0]["id"], 1);
        assert_eq!(json["users"][0]["role"], "community");
        assert_eq!(json["users"][0]["google_id"], serde_json::Value::Null);
        assert_eq!(json["users"][0]["created_at"], "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_allocate_id_at_counter_limit() {
        let mut doc = StoreDocument::new();
        doc.next_id = u64::MAX;
        assert!(matches!(
            doc.allocate_id(),
            Err(StoreError::InvalidValue { column: "id", .. })
        ));
        assert_eq!(doc.next_id, u64::MAX);
    }

    #[test]
    fn test_touch_is_strictly_later() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut record = Record::new(1, "a@example.com".into(), ts);
        record.touch(ts);
        assert!(record.updated_at > record.created_at);
        assert_eq!(
            iso_millis::format(&record.updated_at),
            "2024-05-01T12:00:00.001Z"
        );
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
    }
}
