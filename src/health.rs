use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": "voice-gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "sessions": {
            "active": metrics.active_sessions,
            "started": metrics.sessions_started
        },
        "pipeline": {
            "vad_mode": config.audio.vad_mode,
            "silence_frame_limit": config.audio.silence_frame_limit,
            "min_segment_seconds": config.audio.min_segment_seconds,
            "utterances_dispatched": metrics.utterances_dispatched,
            "segments_persisted": metrics.segments_persisted,
            "live_messages_sent": metrics.live_messages_sent
        },
        "services": {
            "asr": config.services.asr_url,
            "audio_analysis": config.services.audio_analysis_url,
            "text_analysis": config.services.text_analysis_url
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "active_sessions": metrics.active_sessions,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "pipeline": {
            "utterances_dispatched": metrics.utterances_dispatched,
            "segments_persisted": metrics.segments_persisted,
            "live_messages_sent": metrics.live_messages_sent
        },
        "endpoints": endpoint_stats
    }))
}
