//! Calendar bucketing of tickets for the status charts.
//!
//! Everything here works on tickets already in memory and is recomputed from
//! scratch on every call.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Value, json};

use crate::models::{Ticket, TicketStatus};

pub const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
pub const QUARTERS: [&str; 4] = ["Q1", "Q2", "Q3", "Q4"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Monthly,
    Quarterly,
    Annually,
}

/// Per-status counts, one slot per category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSeries {
    pub categories: Vec<String>,
    pub closed: Vec<u32>,
    pub under_review: Vec<u32>,
    pub pending: Vec<u32>,
}

impl StatusSeries {
    fn with_categories(categories: Vec<String>) -> Self {
        let n = categories.len();
        StatusSeries {
            categories,
            closed: vec![0; n],
            under_review: vec![0; n],
            pending: vec![0; n],
        }
    }

    fn count(&mut self, index: usize, status: &TicketStatus) {
        let slot = match status {
            TicketStatus::Closed => &mut self.closed,
            TicketStatus::UnderReview => &mut self.under_review,
            TicketStatus::Pending => &mut self.pending,
            TicketStatus::Other(_) => return,
        };
        if let Some(n) = slot.get_mut(index) {
            *n += 1;
        }
    }

    /// Series in the order the trends chart draws them.
    pub fn to_chart(&self) -> Value {
        json!({
            "categories": self.categories,
            "series": [
                { "name": "Tickets Closed", "data": self.closed },
                { "name": "Under Review", "data": self.under_review },
                { "name": "Pending", "data": self.pending },
            ],
        })
    }
}

/// Parses the timestamps the API emits: `2025-06-25 15:15:56`, RFC 3339, or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Buckets tickets by the calendar period of their `updated_at`.
///
/// - monthly / quarterly: only tickets updated in `current_year`.
/// - annually: one bucket per year seen, ascending.
///
/// Unparseable timestamps are skipped; unknown statuses open a year bucket but count nowhere.
pub fn bucket_by_status(tickets: &[Ticket], period: Period, current_year: i32) -> StatusSeries {
    match period {
        Period::Monthly => bucket_in_year(tickets, current_year, &MONTHS, |month0| month0),
        Period::Quarterly => bucket_in_year(tickets, current_year, &QUARTERS, |month0| month0 / 3),
        Period::Annually => bucket_by_year(tickets),
    }
}

fn bucket_in_year(
    tickets: &[Ticket],
    year: i32,
    labels: &[&str],
    index_of: impl Fn(usize) -> usize,
) -> StatusSeries {
    let mut series = StatusSeries::with_categories(labels.iter().map(|s| s.to_string()).collect());

    for ticket in tickets {
        let Some(updated) = parse_timestamp(&ticket.updated_at) else {
            continue;
        };
        if updated.year() != year {
            continue;
        }
        series.count(index_of(updated.month0() as usize), &ticket.session_status);
    }

    series
}

fn bucket_by_year(tickets: &[Ticket]) -> StatusSeries {
    let mut years: BTreeMap<i32, Vec<&TicketStatus>> = BTreeMap::new();
    for ticket in tickets {
        if let Some(updated) = parse_timestamp(&ticket.updated_at) {
            years.entry(updated.year()).or_default().push(&ticket.session_status);
        }
    }

    let mut series = StatusSeries::with_categories(years.keys().map(|y| y.to_string()).collect());
    for (index, statuses) in years.values().enumerate() {
        for status in statuses {
            series.count(index, status);
        }
    }
    series
}

/// The stacked monthly bar chart: Closed, Pending, Under Review for each month of `year`.
pub fn monthly_status_chart(tickets: &[Ticket], year: i32) -> Value {
    let series = bucket_by_status(tickets, Period::Monthly, year);
    json!({
        "year": year,
        "categories": series.categories,
        "series": [
            { "name": "Closed", "data": series.closed },
            { "name": "Pending", "data": series.pending },
            { "name": "Under Review", "data": series.under_review },
        ],
    })
}
