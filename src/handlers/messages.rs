//! Ticket chat: history, read receipts, paging back and sending replies.
use reqwest::multipart::Form;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::handlers::uploads::{LocalFile, with_simulated_progress};
use crate::http::ApiClient;
use crate::models::{CreateMessageRequest, Message, Page, Pagination, ReadStatusRequest, Ticket};

#[derive(Debug, Deserialize)]
struct UploadedFile {
    filepath: String,
}

/// One ticket's conversation as the agent sees it. Messages are oldest first.
#[derive(Debug, Clone)]
pub struct ChatSession {
    ticket_id: i64,
    customer_id: Option<i64>,
    agent_id: i64,
    messages: Vec<Message>,
    pagination: Pagination,
}

impl ChatSession {
    /// Loads the latest page and marks the customer's unread messages as read.
    ///
    /// # API
    /// - **GET `/messages/:ticketId/messages`**
    /// - **PUT `/messages/:ticketId/read-status`** `{ message_ids }`, only when something was unread.
    ///
    /// # Logic
    /// - The server repeats the ticket description as the first message; that copy is dropped because the
    ///   description is already shown above the chat.
    pub async fn open(client: &ApiClient, ticket: &Ticket, agent_id: i64) -> Result<Self, ClientError> {
        let path = format!("/messages/{}/messages", ticket.id);
        let page: Page<Vec<Message>> = client.get(&path).await?.into_data()?;
        let pagination = page.links();
        let fetched = page.data;

        let unread: Vec<i64> = fetched
            .iter()
            .filter(|m| m.sender_id != agent_id && m.is_unread())
            .map(|m| m.id)
            .collect();

        let repeats_description = fetched.first().is_some_and(|m| m.message_content == ticket.description);
        let messages = if repeats_description { fetched.into_iter().skip(1).collect() } else { fetched };

        // a failed receipt leaves the messages unread on the server but the chat stays usable
        if !unread.is_empty() {
            let receipt = client
                .put_json::<Value, _>(
                    &format!("/messages/{}/read-status", ticket.id),
                    &ReadStatusRequest { message_ids: unread.clone() },
                )
                .await
                .and_then(|envelope| envelope.ensure_success());
            match receipt {
                Ok(_) => debug!(ticket_id = ticket.id, count = unread.len(), "marked messages as read"),
                Err(e) => warn!(
                    ticket_id = ticket.id,
                    error = %e.message_or("Failed to mark messages as read"),
                    "read receipt failed"
                ),
            }
        }

        Ok(ChatSession {
            ticket_id: ticket.id,
            customer_id: ticket.user_id,
            agent_id,
            messages,
            pagination,
        })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn has_more(&self) -> bool {
        self.pagination.next_page_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Whether a message came from the customer rather than an agent.
    pub fn is_from_customer(&self, message: &Message) -> bool {
        message.sender_id != self.agent_id
    }

    /// Prepends the next page of older messages. Returns how many were added; 0 when there is nothing left.
    pub async fn load_more(&mut self, client: &ApiClient) -> Result<usize, ClientError> {
        let Some(next) = self.pagination.next_page_url.clone().filter(|u| !u.is_empty()) else {
            return Ok(0);
        };

        let Some(path) = client.relative_path(&next) else {
            return Ok(0);
        };

        let page: Page<Vec<Message>> = client.get(&path).await?.into_data()?;
        self.pagination = page.links();
        let mut older = page.data;
        let added = older.len();
        older.append(&mut self.messages);
        self.messages = older;

        debug!(ticket_id = self.ticket_id, added, "loaded older messages");
        Ok(added)
    }

    /// Sends a reply. An attachment is uploaded first and its stored path goes into the message.
    ///
    /// # API
    /// - **POST `/messages/upload-file`** multipart `{ file, user_id }`, answers with `data.filepath`.
    /// - **POST `/messages`** `{ ticket_id, sender_id, recipient_id, message_content, filepath }`.
    pub async fn send(
        &mut self,
        client: &ApiClient,
        content: &str,
        attachment: Option<LocalFile>,
    ) -> Result<Message, ClientError> {
        let content = content.trim();
        if content.is_empty() && attachment.is_none() {
            return Err(ClientError::Validation("Type a message or attach a file".to_string()));
        }

        let filepath = match attachment {
            Some(file) => Some(self.upload_attachment(client, file).await?),
            None => None,
        };

        let body = CreateMessageRequest {
            ticket_id: self.ticket_id,
            sender_id: self.agent_id,
            recipient_id: self.customer_id,
            message_content: content.to_string(),
            filepath,
        };
        let sent: Message = client.post_json::<Message, _>("/messages", &body).await?.into_data()?;

        self.messages.push(sent.clone());
        info!(ticket_id = self.ticket_id, message_id = sent.id, "Message sent!");
        Ok(sent)
    }

    async fn upload_attachment(&self, client: &ApiClient, file: LocalFile) -> Result<String, ClientError> {
        let label = file.name.clone();
        let form = Form::new()
            .part("file", file.into_part()?)
            .text("user_id", self.agent_id.to_string());

        let uploaded: UploadedFile =
            with_simulated_progress(&label, client.post_multipart::<UploadedFile>("/messages/upload-file", form))
                .await?
                .into_data()
                .map_err(|e| match e {
                    ClientError::Decode(_) => ClientError::Decode("File upload failed.".to_string()),
                    other => other,
                })?;
        Ok(uploaded.filepath)
    }

    /// The document `chat` commands print.
    pub fn to_json(&self) -> Value {
        let messages: Vec<Value> = self
            .messages()
            .iter()
            .map(|m| json!({ "message": m, "from_customer": self.is_from_customer(m) }))
            .collect();
        json!({
            "ticket_id": self.ticket_id,
            "messages": messages,
            "pagination": self.pagination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use mockito::Matcher;

    const AGENT: i64 = 2;

    fn client_for(base: &str) -> ApiClient {
        ApiClient::new(&Settings::new(base, None, AGENT, 5).unwrap()).unwrap()
    }

    fn ticket() -> Ticket {
        serde_json::from_value(json!({
            "id": 4,
            "user_id": 5,
            "description": "Unable to login",
            "session_status": "pending"
        }))
        .unwrap()
    }

    fn message(id: i64, sender: i64, content: &str, read: u8) -> Value {
        let recipient = if sender == AGENT { 5 } else { AGENT };
        json!({
            "id": id,
            "ticket_id": 4,
            "sender_id": sender,
            "recipient_id": recipient,
            "message_content": content,
            "read_status": read,
            "created_at": "2025-06-25 15:15:56"
        })
    }

    fn page(messages: Vec<Value>, next: Option<String>) -> String {
        json!({
            "status": "success",
            "data": { "data": messages, "next_page_url": next, "prev_page_url": null }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_open_drops_description_and_marks_read() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/messages/4/messages")
            .with_status(200)
            .with_body(page(
                vec![
                    message(10, 5, "Unable to login", 0),
                    message(11, AGENT, "Have you tried resetting?", 0),
                    message(12, 5, "Yes", 0),
                    message(13, 5, "Still broken", 1),
                ],
                None,
            ))
            .create_async()
            .await;
        let read = server
            .mock("PUT", "/messages/4/read-status")
            .match_body(Matcher::Json(json!({ "message_ids": [10, 12] })))
            .with_status(200)
            .with_body(r#"{"status":"success","data":null}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let chat = ChatSession::open(&client, &ticket(), AGENT).await.unwrap();
        let ids: Vec<i64> = chat.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![11, 12, 13]);
        assert!(!chat.has_more());
        assert!(chat.is_from_customer(&chat.messages()[1]));
        read.assert_async().await;
    }

    #[tokio::test]
    async fn test_open_without_unread_skips_receipt() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/messages/4/messages")
            .with_status(200)
            .with_body(page(vec![message(11, AGENT, "Hello", 0), message(12, 5, "Hi", 1)], None))
            .create_async()
            .await;
        let read = server.mock("PUT", "/messages/4/read-status").expect(0).create_async().await;

        let client = client_for(&server.url());
        let chat = ChatSession::open(&client, &ticket(), AGENT).await.unwrap();
        assert_eq!(chat.messages().len(), 2);
        read.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_read_receipt_keeps_messages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/messages/4/messages")
            .with_status(200)
            .with_body(page(vec![message(12, 5, "Yes", 0)], None))
            .create_async()
            .await;
        let read = server
            .mock("PUT", "/messages/4/read-status")
            .with_status(500)
            .with_body(r#"{"message":"read-status down"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let chat = ChatSession::open(&client, &ticket(), AGENT).await.unwrap();
        let ids: Vec<i64> = chat.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![12]);
        read.assert_async().await;
    }

    #[tokio::test]
    async fn test_load_more_prepends_older_page() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        server
            .mock("GET", "/messages/4/messages")
            .match_query(Matcher::Missing)
            .with_status(200)
            .with_body(page(vec![message(20, AGENT, "Newest", 1)], Some(format!("{}/messages/4/messages?page=2", base))))
            .create_async()
            .await;
        server
            .mock("GET", "/messages/4/messages")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(page(vec![message(18, 5, "Oldest", 1), message(19, AGENT, "Older", 1)], None))
            .create_async()
            .await;

        let client = client_for(&base);
        let mut chat = ChatSession::open(&client, &ticket(), AGENT).await.unwrap();
        assert!(chat.has_more());
        assert_eq!(chat.load_more(&client).await.unwrap(), 2);

        let ids: Vec<i64> = chat.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![18, 19, 20]);
        assert!(!chat.has_more());
        assert_eq!(chat.load_more(&client).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_uploads_then_posts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/messages/4/messages")
            .with_status(200)
            .with_body(page(vec![], None))
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/messages/upload-file")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="user_id""#.to_string()),
                Matcher::Regex(r#"filename="receipt.pdf""#.to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"filepath":"messages/receipt.pdf"}}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/messages")
            .match_body(Matcher::Json(json!({
                "ticket_id": 4,
                "sender_id": AGENT,
                "recipient_id": 5,
                "message_content": "See attached",
                "filepath": "messages/receipt.pdf"
            })))
            .with_status(201)
            .with_body(json!({ "status": "success", "data": message(30, AGENT, "See attached", 0) }).to_string())
            .create_async()
            .await;

        let client = client_for(&server.url());
        let mut chat = ChatSession::open(&client, &ticket(), AGENT).await.unwrap();
        let file = LocalFile::new("receipt.pdf", b"%PDF-1.4".to_vec());
        let sent = chat.send(&client, "  See attached  ", Some(file)).await.unwrap();
        assert_eq!(sent.id, 30);
        assert_eq!(chat.messages().len(), 1);
        upload.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_message_is_refused() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/messages/4/messages")
            .with_status(200)
            .with_body(page(vec![], None))
            .create_async()
            .await;
        let create = server.mock("POST", "/messages").expect(0).create_async().await;

        let client = client_for(&server.url());
        let mut chat = ChatSession::open(&client, &ticket(), AGENT).await.unwrap();
        assert!(matches!(chat.send(&client, "   ", None).await, Err(ClientError::Validation(_))));
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_upload_sends_no_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/messages/4/messages")
            .with_status(200)
            .with_body(page(vec![], None))
            .create_async()
            .await;
        server
            .mock("POST", "/messages/upload-file")
            .with_status(200)
            .with_body(r#"{"status":"error","message":"","data":null,"error":"File too large"}"#)
            .create_async()
            .await;
        let create = server.mock("POST", "/messages").expect(0).create_async().await;

        let client = client_for(&server.url());
        let mut chat = ChatSession::open(&client, &ticket(), AGENT).await.unwrap();
        let err = chat
            .send(&client, "", Some(LocalFile::new("big.png", vec![0; 16])))
            .await
            .unwrap_err();
        assert_eq!(err.message_or("An error occurred."), "File too large");
        assert!(chat.messages().is_empty());
        create.assert_async().await;
    }
}
