use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use kdl_core::model::Sinks;
use serde::Serialize;

use crate::cli::ProgressMode;

/// Builds the `Sinks` the coordinator reports into, rendering either an
/// `indicatif` text bar or newline-delimited JSON. Rendering happens
/// directly inside each callback; the coordinator's own message loop already
/// paces these calls, so no separate polling task is needed here.
pub fn build_sinks(mode: ProgressMode) -> Sinks {
    match mode {
        ProgressMode::Quiet => Sinks::default(),
        ProgressMode::Text => text_sinks(),
        ProgressMode::Json => json_sinks(),
    }
}

fn text_sinks() -> Sinks {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}%")
            .unwrap()
            .progress_chars("#>-"),
    );

    let progress_bar = bar.clone();
    let on_progress = move |percent: f64| {
        progress_bar.set_position(percent.round() as u64);
    };

    let complete_bar = bar.clone();
    let on_complete = move |path: &Path| {
        complete_bar.finish_with_message(format!("{} {}", "saved".green(), path.display()));
    };

    let error_bar = bar;
    let on_error = move |message: &str| {
        error_bar.finish_with_message(format!("{} {message}", "failed".red()));
    };

    Sinks {
        on_progress: Some(Box::new(on_progress)),
        on_complete: Some(Box::new(on_complete)),
        on_error: Some(Box::new(on_error)),
    }
}

fn json_sinks() -> Sinks {
    let on_progress = move |percent: f64| {
        emit(JsonProgressEvent::progress(percent));
    };
    let on_complete = move |path: &Path| {
        emit(JsonProgressEvent::finish("complete", path.display().to_string()));
    };
    let on_error = move |message: &str| {
        emit(JsonProgressEvent::finish("failed", message.to_string()));
    };

    Sinks {
        on_progress: Some(Box::new(on_progress)),
        on_complete: Some(Box::new(on_complete)),
        on_error: Some(Box::new(on_error)),
    }
}

fn emit(event: JsonProgressEvent) {
    if let Ok(serialized) = serde_json::to_string(&event) {
        println!("{serialized}");
    }
}

#[derive(Serialize)]
struct JsonProgressEvent {
    event: &'static str,
    timestamp_ms: u128,
    percent: Option<f64>,
    detail: Option<String>,
}

impl JsonProgressEvent {
    fn progress(percent: f64) -> Self {
        Self {
            event: "progress",
            timestamp_ms: now_ms(),
            percent: Some(percent),
            detail: None,
        }
    }

    fn finish(event: &'static str, detail: String) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            percent: None,
            detail: Some(detail),
        }
    }
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
