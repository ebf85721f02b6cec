// src/consolidate/events.rs
//! Calendar of contextual events shown alongside each display year.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

const BUNDLED: &str = include_str!("../../data/events.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub description: String,
    pub impact: Impact,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCalendar {
    by_year: HashMap<i32, Vec<Event>>,
}

impl EventCalendar {
    pub fn bundled() -> Result<Self, AppError> {
        Self::parse(BUNDLED)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    fn parse(raw: &str) -> Result<Self, AppError> {
        let by_year: HashMap<i32, Vec<Event>> = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("Invalid event calendar: {}", e)))?;
        Ok(Self { by_year })
    }

    /// Events for a calendar year, in calendar order. Unknown years have none.
    pub fn events_for(&self, year: i32) -> Vec<Event> {
        self.by_year.get(&year).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_calendar() {
        let calendar = EventCalendar::bundled().unwrap();
        let events = calendar.events_for(2020);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "COVID-19 Pandemic");
        assert_eq!(events[0].impact, Impact::Negative);
        assert_eq!(calendar.events_for(2024)[1].date, "2024-03-20");
        assert!(calendar.events_for(2010).is_empty());
    }

    #[test]
    fn calendar_file_replaces_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(
            &path,
            r#"{"2031": [{"title": "Tariff change", "description": "Import duty cut", "impact": "positive", "date": "2031-01-05"}]}"#,
        )
        .unwrap();
        let calendar = EventCalendar::from_file(&path).unwrap();
        assert_eq!(calendar.events_for(2031)[0].impact, Impact::Positive);
        assert!(calendar.events_for(2020).is_empty());

        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(EventCalendar::from_file(&path), Err(AppError::Config(_))));
    }
}
