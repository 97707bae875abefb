use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Columns of the `logs` table in their stored order. The order is part of
/// the on-disk format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    Timestamp,
    ClientIp,
    BackendIp,
    Status,
    BackendStatus,
    RequestUrl,
    RedirectUrl,
    UserAgent,
    CountryCode,
    BrowserFamily,
    BrowserMajor,
    DeviceBrand,
    DeviceFamily,
    DeviceModel,
    OsFamily,
    OsMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    DateTime,
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Text => "TEXT",
        }
    }
}

impl Column {
    pub const ALL: [Column; 17] = [
        Column::Id,
        Column::Timestamp,
        Column::ClientIp,
        Column::BackendIp,
        Column::Status,
        Column::BackendStatus,
        Column::RequestUrl,
        Column::RedirectUrl,
        Column::UserAgent,
        Column::CountryCode,
        Column::BrowserFamily,
        Column::BrowserMajor,
        Column::DeviceBrand,
        Column::DeviceFamily,
        Column::DeviceModel,
        Column::OsFamily,
        Column::OsMajor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Timestamp => "t",
            Column::ClientIp => "client_ip",
            Column::BackendIp => "backend_ip",
            Column::Status => "status",
            Column::BackendStatus => "bstatus",
            Column::RequestUrl => "request_url",
            Column::RedirectUrl => "redirect_url",
            Column::UserAgent => "user_agent",
            Column::CountryCode => "country_code",
            Column::BrowserFamily => "browser_family",
            Column::BrowserMajor => "browser_major",
            Column::DeviceBrand => "device_brand",
            Column::DeviceFamily => "device_family",
            Column::DeviceModel => "device_model",
            Column::OsFamily => "os_family",
            Column::OsMajor => "os_major",
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Id | Column::Status | Column::BackendStatus => ColumnType::Integer,
            Column::Timestamp => ColumnType::DateTime,
            _ => ColumnType::Text,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single converted value destined for one [`Column`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Integer(i64),
    DateTime(DateTime<Utc>),
    Text(String),
}

impl ColumnValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValue::Integer(_) => ColumnType::Integer,
            ColumnValue::DateTime(_) => ColumnType::DateTime,
            ColumnValue::Text(_) => ColumnType::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnTypeMismatch {
    pub column: Column,
    pub expected: ColumnType,
    pub found: ColumnType,
}

impl fmt::Display for ColumnTypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column '{}' expects {} but got {}",
            self.column,
            self.expected.sql_type(),
            self.found.sql_type()
        )
    }
}

impl std::error::Error for ColumnTypeMismatch {}

/// One persisted access-log row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub backend_ip: String,
    pub status: i64,
    pub backend_status: i64,
    pub request_url: String,
    pub redirect_url: String,
    pub user_agent: String,
    pub country_code: String,
    pub browser_family: String,
    pub browser_major: String,
    pub device_brand: String,
    pub device_family: String,
    pub device_model: String,
    pub os_family: String,
    pub os_major: String,
}

impl LogRecord {
    pub fn set(&mut self, column: Column, value: ColumnValue) -> Result<(), ColumnTypeMismatch> {
        let mismatch = |found: &ColumnValue| ColumnTypeMismatch {
            column,
            expected: column.column_type(),
            found: found.column_type(),
        };

        match (column, value) {
            (Column::Id, ColumnValue::Integer(v)) => self.id = v,
            (Column::Status, ColumnValue::Integer(v)) => self.status = v,
            (Column::BackendStatus, ColumnValue::Integer(v)) => self.backend_status = v,
            (Column::Timestamp, ColumnValue::DateTime(v)) => self.timestamp = v,
            (column, ColumnValue::Text(v)) => match self.text_mut(column) {
                Some(slot) => *slot = v,
                None => return Err(mismatch(&ColumnValue::Text(v))),
            },
            (_, other) => return Err(mismatch(&other)),
        }
        Ok(())
    }

    pub fn value(&self, column: Column) -> ColumnValue {
        match column {
            Column::Id => ColumnValue::Integer(self.id),
            Column::Status => ColumnValue::Integer(self.status),
            Column::BackendStatus => ColumnValue::Integer(self.backend_status),
            Column::Timestamp => ColumnValue::DateTime(self.timestamp),
            text => ColumnValue::Text(self.text(text).unwrap_or_default().to_string()),
        }
    }

    fn text(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::ClientIp => &self.client_ip,
            Column::BackendIp => &self.backend_ip,
            Column::RequestUrl => &self.request_url,
            Column::RedirectUrl => &self.redirect_url,
            Column::UserAgent => &self.user_agent,
            Column::CountryCode => &self.country_code,
            Column::BrowserFamily => &self.browser_family,
            Column::BrowserMajor => &self.browser_major,
            Column::DeviceBrand => &self.device_brand,
            Column::DeviceFamily => &self.device_family,
            Column::DeviceModel => &self.device_model,
            Column::OsFamily => &self.os_family,
            Column::OsMajor => &self.os_major,
            Column::Id | Column::Timestamp | Column::Status | Column::BackendStatus => return None,
        };
        Some(value.as_str())
    }

    fn text_mut(&mut self, column: Column) -> Option<&mut String> {
        let slot = match column {
            Column::ClientIp => &mut self.client_ip,
            Column::BackendIp => &mut self.backend_ip,
            Column::RequestUrl => &mut self.request_url,
            Column::RedirectUrl => &mut self.redirect_url,
            Column::UserAgent => &mut self.user_agent,
            Column::CountryCode => &mut self.country_code,
            Column::BrowserFamily => &mut self.browser_family,
            Column::BrowserMajor => &mut self.browser_major,
            Column::DeviceBrand => &mut self.device_brand,
            Column::DeviceFamily => &mut self.device_family,
            Column::DeviceModel => &mut self.device_model,
            Column::OsFamily => &mut self.os_family,
            Column::OsMajor => &mut self.os_major,
            Column::Id | Column::Timestamp | Column::Status | Column::BackendStatus => return None,
        };
        Some(slot)
    }
}
