//! # Record Query Endpoints
//!
//! Read-only pages over finished (and in-progress) sessions: the record
//! list with derived duration and speaker fields, and per-record segment
//! listings in the same shape the live channel pushes.

use crate::db::SegmentRow;
use crate::error::{AppError, AppResult};
use crate::session::writer::LiveAnalysisPayload;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

impl From<SegmentRow> for LiveAnalysisPayload {
    fn from(row: SegmentRow) -> Self {
        Self {
            start: row.start_seconds,
            end: row.end_seconds,
            text: row.text,
            text_sentiment: row.text_sentiment,
            voice_sentiment: row.voice_sentiment,
            speaker: row.speaker,
            similarity_score: row.similarity_score,
        }
    }
}

/// GET /api/records
pub async fn get_records(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let records = state.store().list_records()?;
    Ok(HttpResponse::Ok().json(records))
}

#[derive(Debug, Deserialize)]
pub struct SegmentsQuery {
    id: String,
}

/// GET /api/segments?id=<record>
pub async fn get_segments(
    state: web::Data<AppState>,
    query: web::Query<SegmentsQuery>,
) -> AppResult<HttpResponse> {
    if query.id.trim().is_empty() {
        return Err(AppError::BadRequest("id parameter is required".to_string()));
    }

    let segments: Vec<LiveAnalysisPayload> = state
        .store()
        .segments_for_record(query.id.trim())?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(HttpResponse::Ok().json(segments))
}
