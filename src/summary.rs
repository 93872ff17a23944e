use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gpx_types::GpxFile;

/// Overview of a loaded document, as returned to JS by `gpxSummary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpxSummary {
    pub version: String,
    pub creator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    pub waypoints: usize,
    pub routes: usize,
    pub tracks: usize,
    pub points: usize,
}

impl GpxSummary {
    pub fn of(file: &GpxFile) -> Self {
        let metadata = file.metadata.as_ref();
        Self {
            version: file.version.clone(),
            creator: file.creator.clone(),
            name: metadata.and_then(|m| m.name.clone()),
            time: metadata.and_then(|m| m.time),
            waypoints: file.waypoints.len(),
            routes: file.routes.len(),
            tracks: file.tracks.len(),
            points: file.point_count(),
        }
    }
}
