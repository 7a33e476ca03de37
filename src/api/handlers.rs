use crate::config::AppConfig;
use crate::error::ReconError;
use crate::models::{ComparisonRow, DataQuality, Period, ReconSummary, Reconciliation};
use crate::service::engine;
use crate::source::{AfipCsvSource, SpreadsheetXmlSource};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinError;

/// 共享状态: 只读配置, 每次请求各自建立对账工作表
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// 查询参数: 月/年 (兼容 mes / anio)
#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    #[serde(alias = "mes")]
    pub month: Option<u32>,
    #[serde(alias = "anio")]
    pub year: Option<i32>,
    #[serde(default)]
    pub only_differences: bool,
}

/// 请求体: 直接上传两个文件的内容
#[derive(Debug, Deserialize)]
pub struct CompareUpload {
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub tax_csv: String,
    pub erp_xml: String,
    #[serde(default)]
    pub only_differences: bool,
}

/// 响应体
#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub success: bool,
    pub count: usize,
    pub period: Period,
    pub summary: ReconSummary,
    pub quality: DataQuality,
    pub data: Vec<ComparisonRow>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 对账配置中的两个文件
pub async fn compare_configured(
    State(state): State<AppState>,
    query: Result<Query<CompareQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };

    let period = match Period::from_parts(query.month, query.year) {
        Ok(period) => period,
        Err(e) => return error_response(e),
    };

    let config = state.config.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        engine::run(&config.tax_source(), &config.erp_source(), period, config.match_options())
    })
    .await;

    respond(outcome, query.only_differences)
}

/// 对账上传的内容
pub async fn compare_uploaded(
    State(state): State<AppState>,
    req: Result<Json<CompareUpload>, JsonRejection>,
) -> Response {
    let req = match req {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };

    let period = match Period::from_parts(req.month, req.year) {
        Ok(period) => period,
        Err(e) => return error_response(e),
    };

    let options = state.config.match_options();
    let lookup = state.config.matching.sheet_lookup;
    let only_differences = req.only_differences;
    let outcome = tokio::task::spawn_blocking(move || {
        let tax = AfipCsvSource::from_text(req.tax_csv);
        let erp = SpreadsheetXmlSource::from_text(req.erp_xml, lookup);
        engine::run(&tax, &erp, period, options)
    })
    .await;

    respond(outcome, only_differences)
}

fn respond(outcome: Result<Result<Reconciliation, ReconError>, JoinError>, only_differences: bool) -> Response {
    match outcome {
        Ok(Ok(reconciliation)) => {
            let summary = reconciliation.summary();
            let Reconciliation { period, rows, quality } = reconciliation;
            let data: Vec<ComparisonRow> = if only_differences {
                rows.into_iter().filter(ComparisonRow::is_difference).collect()
            } else {
                rows
            };

            let response = CompareResponse {
                success: true,
                count: data.len(),
                period,
                summary,
                quality,
                data,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Err(e)) => error_response(e),
        Err(e) => {
            tracing::error!("对账任务异常终止: {}", e);
            let response = ErrorResponse {
                success: false,
                error: format!("Error: {}", e),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

fn error_response(e: ReconError) -> Response {
    let status = if e.is_period_error() {
        StatusCode::BAD_REQUEST
    } else if e.is_source_error() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    tracing::warn!("对账失败 ({}): {}", status, e);
    let response = ErrorResponse {
        success: false,
        error: e.to_string(),
    };
    (status, Json(response)).into_response()
}

/// 请求参数/请求体无法解析
fn rejection_response(status: StatusCode, message: String) -> Response {
    tracing::warn!("请求被拒绝 ({}): {}", status, message);
    let response = ErrorResponse {
        success: false,
        error: message,
    };
    (status, Json(response)).into_response()
}
