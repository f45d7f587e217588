use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

/// 报案状态，只允许这三个取值；管理员可在任意取值之间切换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Closed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "reviewed" => Ok(ReportStatus::Reviewed),
            "closed" => Ok(ReportStatus::Closed),
            other => Err(format!("unknown report status: {other}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for ReportStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ReportStatus {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse::<ReportStatus>().map_err(Into::into)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub status: ReportStatus,
    pub reporter_id: i32,
    pub created_at: DateTime<Utc>,
}

/// 提交报案的请求体；reporterId 与 status 不接受客户端取值
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
}

/// 过滤参数原样下推到查询，未知取值自然匹配不到任何行
#[derive(Debug, Default, Deserialize)]
pub struct ListReportsQuery {
    pub status: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: ReportStatus,
}

const REPORT_COLUMNS: &str =
    "id, title, description, category, location, status, reporter_id, created_at";

impl Report {
    pub async fn create(
        pool: &PgPool,
        reporter_id: i32,
        req: &CreateReportRequest,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            r#"
            INSERT INTO reports (title, description, category, location, status, reporter_id)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.category)
        .bind(&req.location)
        .bind(reporter_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(
        pool: &PgPool,
        status: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            r#"
            SELECT {REPORT_COLUMNS}
            FROM reports
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR category = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(status)
        .bind(category)
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_reporter(
        pool: &PgPool,
        reporter_id: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            r#"
            SELECT {REPORT_COLUMNS}
            FROM reports
            WHERE reporter_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(reporter_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update_status(
        pool: &PgPool,
        id: i32,
        status: ReportStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            r#"
            UPDATE reports
            SET status = $1
            WHERE id = $2
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_exactly_three_values() {
        assert_eq!("pending".parse::<ReportStatus>().unwrap(), ReportStatus::Pending);
        assert_eq!("reviewed".parse::<ReportStatus>().unwrap(), ReportStatus::Reviewed);
        assert_eq!("closed".parse::<ReportStatus>().unwrap(), ReportStatus::Closed);
        assert!("archived".parse::<ReportStatus>().is_err());
        assert!(serde_json::from_str::<ReportStatus>(r#""resolved""#).is_err());
    }

    #[test]
    fn report_serializes_with_camel_case_keys() {
        let report = Report {
            id: 1,
            title: "t".into(),
            description: "d".into(),
            category: "c".into(),
            location: "l".into(),
            status: ReportStatus::Pending,
            reporter_id: 7,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["reporterId"], 7);
        assert_eq!(value["status"], "pending");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("reporter_id").is_none());
    }

    #[test]
    fn create_request_reports_every_missing_field() {
        let req = CreateReportRequest {
            title: "".into(),
            description: "".into(),
            category: "".into(),
            location: "".into(),
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 4);
    }

    #[test]
    fn status_update_body_rejects_values_outside_the_enum() {
        assert!(serde_json::from_str::<UpdateStatusRequest>(r#"{"status":"reviewed"}"#).is_ok());
        assert!(serde_json::from_str::<UpdateStatusRequest>(r#"{"status":"REVIEWED"}"#).is_err());
        assert!(serde_json::from_str::<UpdateStatusRequest>(r#"{"status":"done"}"#).is_err());
    }
}
