//! Statistics endpoints

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::FetchResult;
use super::fetch::{fetch_json, Fetch, FetchRequest};
use super::{
    STATISTICS_AGE, STATISTICS_BODY_TYPE, STATISTICS_EMOTION, STATISTICS_GENDER,
    STATISTICS_VISIT_COUNT,
};

/// Time window of the visit count series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitWindow {
    /// Hourly buckets over the last six hours
    Last6Hours,
    Day,
    Week,
    Month,
}

impl VisitWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitWindow::Last6Hours => "last_6_hours",
            VisitWindow::Day => "day",
            VisitWindow::Week => "week",
            VisitWindow::Month => "month",
        }
    }
}

impl std::str::FromStr for VisitWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_6_hours" | "6h" => Ok(VisitWindow::Last6Hours),
            "day" => Ok(VisitWindow::Day),
            "week" => Ok(VisitWindow::Week),
            "month" => Ok(VisitWindow::Month),
            other => Err(format!("unknown visit window: {}", other)),
        }
    }
}

/// One bucket of the visit count series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitCount {
    /// Bucket label as sent by the backend (date or hour)
    pub date: String,
    pub value: u64,
}

/// Share of one category (body type, gender, age band)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Share {
    #[serde(rename = "type")]
    pub kind: String,
    pub percentage: f64,
}

/// Count of one emotion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionCount {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: u64,
}

/// Client for the statistics endpoints
#[derive(Clone)]
pub struct StatisticsApi {
    fetch: Arc<dyn Fetch>,
}

impl StatisticsApi {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self { fetch }
    }

    pub async fn visit_counts(&self, window: VisitWindow) -> FetchResult<Vec<VisitCount>> {
        let request = FetchRequest::get(STATISTICS_VISIT_COUNT).param("type", window.as_str());
        fetch_json(self.fetch.as_ref(), request).await
    }

    pub async fn body_types(&self) -> FetchResult<Vec<Share>> {
        fetch_json(self.fetch.as_ref(), FetchRequest::get(STATISTICS_BODY_TYPE)).await
    }

    pub async fn genders(&self) -> FetchResult<Vec<Share>> {
        fetch_json(self.fetch.as_ref(), FetchRequest::get(STATISTICS_GENDER)).await
    }

    pub async fn emotions(&self) -> FetchResult<Vec<EmotionCount>> {
        fetch_json(self.fetch.as_ref(), FetchRequest::get(STATISTICS_EMOTION)).await
    }

    pub async fn ages(&self) -> FetchResult<Vec<Share>> {
        fetch_json(self.fetch.as_ref(), FetchRequest::get(STATISTICS_AGE)).await
    }
}
