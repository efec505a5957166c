//! 변경 이력 (감사 로그).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 감사 대상 테이블 이름.
pub mod tables {
    pub const STOCK_LIST: &str = "stock_list";
    pub const STOCK_INVESTOR_TRADING: &str = "stock_investor_trading";
}

/// 변경 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("알 수 없는 감사 동작: {}", other)),
        }
    }
}

/// 저장된 감사 로그 (`data_history`). 추가만 가능합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct AuditEntry {
    pub id: i64,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub action: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 새 감사 로그.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub table_name: &'static str,
    pub record_id: Option<i64>,
    pub action: AuditAction,
    pub description: String,
}

impl NewAuditEntry {
    pub fn new(table_name: &'static str, action: AuditAction, description: impl Into<String>) -> Self {
        Self {
            table_name,
            record_id: None,
            action,
            description: description.into(),
        }
    }

    pub fn with_record(mut self, record_id: i64) -> Self {
        self.record_id = Some(record_id);
        self
    }
}

/// 동작별 감사 로그 건수.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: i64,
    pub creates: i64,
    pub updates: i64,
    pub deletes: i64,
}
