//! Dashboard metric cards.
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ClientError;
use crate::handlers::stats::parse_timestamp;
use crate::http::ApiClient;
use crate::models::{Ticket, TicketCount, TicketStatus};

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TicketStats {
    pub total: i64,
    pub pending: i64,
    pub under_review: i64,
    pub closed: i64,
}

impl From<TicketCount> for TicketStats {
    fn from(count: TicketCount) -> Self {
        let pending = count.total_per_status.pending.unwrap_or(0);
        let under_review = count.total_per_status.under_review.unwrap_or(0);
        TicketStats {
            total: count.total,
            pending,
            under_review,
            closed: (count.total - (pending + under_review)).max(0),
        }
    }
}

/// Totals for the metric cards.
///
/// # API
/// - **GET `/tickets/count`** returns `total` and `total_per_status`. The server does not count closed
///   tickets, so they are whatever is left over.
pub async fn handle_ticket_metrics(client: &ApiClient) -> Result<TicketStats, ClientError> {
    let count: TicketCount = client.get::<TicketCount>("/tickets/count").await?.into_data()?;
    Ok(TicketStats::from(count))
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DailyStatus {
    pub closed_today: u32,
    pub pending: u32,
    pub under_review: u32,
    pub closed_percentage: f64,
    pub total_updated_today: u32,
}

/// Share of today's updated tickets that ended up closed. Pending and under-review totals ignore the date.
pub fn daily_status(tickets: &[Ticket], today: NaiveDate) -> DailyStatus {
    let mut status = DailyStatus {
        closed_today: 0,
        pending: 0,
        under_review: 0,
        closed_percentage: 0.0,
        total_updated_today: 0,
    };

    for ticket in tickets {
        let updated_today = parse_timestamp(&ticket.updated_at).is_some_and(|dt| dt.date() == today);
        if updated_today {
            status.total_updated_today += 1;
            if ticket.session_status == TicketStatus::Closed {
                status.closed_today += 1;
            }
        }
        match ticket.session_status {
            TicketStatus::Pending => status.pending += 1,
            TicketStatus::UnderReview => status.under_review += 1,
            _ => {}
        }
    }

    if status.total_updated_today > 0 {
        let pct = f64::from(status.closed_today) / f64::from(status.total_updated_today) * 100.0;
        status.closed_percentage = (pct * 100.0).round() / 100.0;
    }

    status
}
