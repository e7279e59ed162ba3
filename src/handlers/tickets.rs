//! Ticket list handlers (list, recent, status changes, delete).
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::ClientError;
use crate::http::ApiClient;
use crate::models::{Page, Ticket, TicketStatus, UpdateStatusRequest};

const RECENT_TICKETS: u32 = 7;

/// Fetches one page of tickets.
///
/// # API
/// - **GET `/tickets`** with optional `page` / `per_page` query parameters.
pub async fn handle_list_tickets(
    page: Option<u32>,
    per_page: Option<u32>,
    client: &ApiClient,
) -> Result<Value, ClientError> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(page) = page {
        query.push(("page", page.to_string()));
    }
    if let Some(per_page) = per_page {
        query.push(("per_page", per_page.to_string()));
    }

    let page: Page<Vec<Ticket>> = client.get_with_query("/tickets", &query).await?.into_data()?;

    Ok(json!({
        "tickets": page.data,
        "pagination": page.links(),
    }))
}

/// The dashboard's "recent tickets" card.
///
/// # Logic
/// - Asks for the first seven tickets.
/// - An unsuccessful envelope clears the list instead of failing; transport and HTTP errors still propagate.
pub async fn handle_recent_tickets(client: &ApiClient) -> Result<Vec<Ticket>, ClientError> {
    let envelope = client
        .get_with_query::<Page<Vec<Ticket>>, _>("/tickets", &[("per_page", RECENT_TICKETS)])
        .await?;

    if !envelope.is_success() {
        warn!(message = ?envelope.failure_text(), "recent tickets request was not successful");
        return Ok(Vec::new());
    }

    Ok(envelope.data.map(|page| page.data).unwrap_or_default())
}

/// Fetches every ticket, following `next_page_url` until the server stops linking.
pub async fn fetch_all_tickets(client: &ApiClient) -> Result<Vec<Ticket>, ClientError> {
    let pages: Vec<Vec<Ticket>> = client.collect_pages("/tickets").await?;
    Ok(pages.into_iter().flatten().collect())
}

/// Finds one ticket by id by walking the list; there is no single-ticket endpoint.
pub async fn find_ticket(ticket_id: i64, client: &ApiClient) -> Result<Ticket, ClientError> {
    fetch_all_tickets(client)
        .await?
        .into_iter()
        .find(|t| t.id == ticket_id)
        .ok_or_else(|| ClientError::Api { status: 404, message: format!("Ticket {} not found", ticket_id) })
}

/// Submits the chosen status for a ticket. The server owns the lifecycle; no transition rules apply here.
///
/// # API
/// - **PUT `/tickets/:id`** with `{ "session_status": ... }`.
pub async fn handle_update_status(
    ticket_id: i64,
    status: TicketStatus,
    client: &ApiClient,
) -> Result<Value, ClientError> {
    if let TicketStatus::Other(s) = &status {
        return Err(ClientError::Validation(format!(
            "'{}' is not a ticket status (expected pending, underReview or closed)",
            s
        )));
    }

    let body = UpdateStatusRequest { session_status: status.clone() };
    let envelope = client
        .put_json::<Value, _>(&format!("/tickets/{}", ticket_id), &body)
        .await?
        .ensure_success()?;

    info!(ticket_id, status = %status, "ticket status updated");
    Ok(json!({
        "id": ticket_id,
        "session_status": status,
        "ticket": envelope.data,
    }))
}

/// Deletes a ticket. Callers must have confirmed first.
pub async fn handle_delete_ticket(ticket_id: i64, client: &ApiClient) -> Result<Value, ClientError> {
    client
        .delete::<Value>(&format!("/tickets/{}", ticket_id))
        .await?
        .ensure_success()?;

    info!(ticket_id, "ticket deleted");
    Ok(json!({ "deleted": ticket_id }))
}
