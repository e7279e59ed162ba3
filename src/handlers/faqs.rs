//! FAQ handlers and the one-record-at-a-time FAQ editor.
use serde_json::{Value, json};
use tracing::info;

use crate::error::ClientError;
use crate::http::ApiClient;
use crate::models::{Faq, FaqCategory, FaqRequest};

/// Every FAQ. Answers may be left out and fetched with [`handle_faq_answer`].
///
/// # API
/// - **GET `/faqs`**; `data` is either the list itself or a `{data: [...]}` page.
pub async fn handle_list_faqs(client: &ApiClient) -> Result<Vec<Faq>, ClientError> {
    let data: Value = client.get::<Value>("/faqs").await?.into_data()?;
    list_payload(data)
}

/// # API
/// - **GET `/faqs/categories`**
pub async fn handle_faq_categories(client: &ApiClient) -> Result<Vec<FaqCategory>, ClientError> {
    let data: Value = client.get::<Value>("/faqs/categories").await?.into_data()?;
    list_payload(data)
}

/// Loads a single FAQ with its answer, for when a row is expanded.
///
/// # API
/// - **GET `/faqs/:id`**
pub async fn handle_faq_answer(id: &str, client: &ApiClient) -> Result<Faq, ClientError> {
    client.get::<Faq>(&format!("/faqs/{}", id)).await?.into_data()
}

/// Deletes an FAQ. Callers must have confirmed first.
///
/// # API
/// - **DELETE `/faqs/:id`**
pub async fn handle_delete_faq(id: &str, client: &ApiClient) -> Result<Value, ClientError> {
    client.delete::<Value>(&format!("/faqs/{}", id)).await?.ensure_success()?;
    info!(id, "FAQ deleted");
    Ok(json!({ "deleted": id }))
}

/// List endpoints are not consistent about paging.
pub(crate) fn list_payload<T: serde::de::DeserializeOwned>(data: Value) -> Result<Vec<T>, ClientError> {
    let items = match data {
        Value::Object(mut page) => page.remove("data").unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    Ok(serde_json::from_value(items)?)
}

/// Refuses a form with any blank field.
pub fn validate_faq(form: &FaqRequest) -> Result<(), ClientError> {
    let missing: Vec<&str> = [
        ("category", &form.category),
        ("question", &form.question),
        ("answer", &form.answer),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClientError::Validation(format!("Missing required fields: {}", missing.join(", "))))
    }
}

/// The FAQ list plus the id of the record being edited, if any.
#[derive(Debug, Clone, Default)]
pub struct FaqEditor {
    faqs: Vec<Faq>,
    editing: Option<String>,
}

impl FaqEditor {
    pub fn new(faqs: Vec<Faq>) -> Self {
        FaqEditor { faqs, editing: None }
    }

    pub async fn load(client: &ApiClient) -> Result<Self, ClientError> {
        Ok(FaqEditor::new(handle_list_faqs(client).await?))
    }

    pub fn faqs(&self) -> &[Faq] {
        &self.faqs
    }

    /// Starts editing `id`, returning the form prefilled from the record.
    pub fn begin_edit(&mut self, id: &str) -> Result<FaqRequest, ClientError> {
        let faq = self
            .faqs
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| ClientError::Validation(format!("No FAQ with id {}", id)))?;
        let form = FaqRequest {
            category: faq.category.clone(),
            question: faq.question.clone(),
            answer: faq.answer.clone().unwrap_or_default(),
        };
        self.editing = Some(id.to_string());
        Ok(form)
    }

    /// Creates a new FAQ, or updates the one being edited.
    ///
    /// # API
    /// - new: **POST `/faqs`**, the returned record is appended.
    /// - editing: **PUT `/faqs/:id`**, the record is replaced in place and edit mode ends.
    ///
    /// Nothing changes locally when the request fails.
    pub async fn submit(&mut self, client: &ApiClient, form: FaqRequest) -> Result<Faq, ClientError> {
        validate_faq(&form)?;

        match self.editing.clone() {
            Some(id) => {
                let envelope = client
                    .put_json::<Value, _>(&format!("/faqs/{}", id), &form)
                    .await?
                    .ensure_success()?;
                let updated = returned_or_merged(envelope.data, &id, &form);
                if let Some(slot) = self.faqs.iter_mut().find(|f| f.id == id) {
                    *slot = updated.clone();
                }
                self.editing = None;
                info!(id = %updated.id, "FAQ updated");
                Ok(updated)
            }
            None => {
                let created: Faq = client.post_json::<Faq, _>("/faqs", &form).await?.into_data()?;
                self.faqs.push(created.clone());
                info!(id = %created.id, "FAQ created");
                Ok(created)
            }
        }
    }
}

/// The server usually echoes the saved record; when it does not, the form is what was saved.
fn returned_or_merged(data: Option<Value>, id: &str, form: &FaqRequest) -> Faq {
    data.and_then(|d| serde_json::from_value::<Faq>(d).ok())
        .unwrap_or_else(|| Faq {
            id: id.to_string(),
            category: form.category.clone(),
            question: form.question.clone(),
            answer: Some(form.answer.clone()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use mockito::Matcher;

    fn client_for(base: &str) -> ApiClient {
        ApiClient::new(&Settings::new(base, None, 2, 5).unwrap()).unwrap()
    }

    fn faq(id: &str, question: &str) -> Faq {
        Faq {
            id: id.to_string(),
            category: "Billing".to_string(),
            question: question.to_string(),
            answer: None,
        }
    }

    fn form(category: &str, question: &str, answer: &str) -> FaqRequest {
        FaqRequest {
            category: category.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
        }
    }

    #[test]
    fn test_validate_faq_lists_missing_fields() {
        assert!(validate_faq(&form("Billing", "How?", "Like this")).is_ok());
        let err = validate_faq(&form("  ", "How?", "")).unwrap_err();
        assert_eq!(err.message_or(""), "Missing required fields: category, answer");
    }

    #[test]
    fn test_list_payload_accepts_bare_and_paged() {
        let bare: Vec<FaqCategory> = list_payload(json!([{ "id": 1, "name": "General" }])).unwrap();
        assert_eq!(bare[0].id, "1");
        let paged: Vec<FaqCategory> = list_payload(json!({ "data": [{ "id": "2", "name": "Billing" }] })).unwrap();
        assert_eq!(paged[0].name, "Billing");
    }

    #[test]
    fn test_begin_edit_prefills_form() {
        let mut editor = FaqEditor::new(vec![faq("1", "How do I pay?")]);
        let prefilled = editor.begin_edit("1").unwrap();
        assert_eq!(prefilled.question, "How do I pay?");
        assert_eq!(prefilled.answer, "");
        assert_eq!(editor.editing.as_deref(), Some("1"));
        assert!(editor.begin_edit("9").is_err());
    }

    #[tokio::test]
    async fn test_invalid_form_sends_nothing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/faqs").expect(0).create_async().await;

        let client = client_for(&server.url());
        let mut editor = FaqEditor::default();
        assert!(editor.submit(&client, form("General", "", "x")).await.is_err());
        assert!(editor.faqs().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_appends_returned_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/faqs")
            .match_body(Matcher::Json(json!({ "category": "General", "question": "Q?", "answer": "A." })))
            .with_status(201)
            .with_body(r#"{"status":"success","message":"created","data":{"id":42,"category":"General","question":"Q?","answer":"A."}}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let mut editor = FaqEditor::new(vec![faq("1", "Old")]);
        let created = editor.submit(&client, form("General", "Q?", "A.")).await.unwrap();
        assert_eq!(created.id, "42");
        assert_eq!(editor.faqs().len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/faqs/2")
            .with_status(200)
            .with_body(r#"{"status":"success","message":"updated","data":null}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let mut editor = FaqEditor::new(vec![faq("1", "First"), faq("2", "Second"), faq("3", "Third")]);
        editor.begin_edit("2").unwrap();
        editor.submit(&client, form("Billing", "Second, edited", "Yes")).await.unwrap();

        let questions: Vec<&str> = editor.faqs().iter().map(|f| f.question.as_str()).collect();
        assert_eq!(questions, vec!["First", "Second, edited", "Third"]);
        assert!(editor.editing.is_none());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_list_and_edit_mode() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/faqs/1")
            .with_status(422)
            .with_body(r#"{"status":"error","message":"Category does not exist","data":null}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let mut editor = FaqEditor::new(vec![faq("1", "First")]);
        editor.begin_edit("1").unwrap();
        let err = editor.submit(&client, form("Nope", "First", "A")).await.unwrap_err();
        assert_eq!(err.message_or("Failed to save FAQ"), "Category does not exist");
        assert_eq!(editor.faqs()[0].category, "Billing");
        assert!(editor.editing.is_some());
    }

    #[tokio::test]
    async fn test_answer_and_delete() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/faqs/7")
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"id":7,"category":"General","question":"Q","answer":"Because."}}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/faqs/7")
            .with_status(200)
            .with_body(r#"{"status":"success","message":"deleted","data":null}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let full = handle_faq_answer("7", &client).await.unwrap();
        assert_eq!(full.answer.as_deref(), Some("Because."));

        let out = handle_delete_faq("7", &client).await.unwrap();
        assert_eq!(out["deleted"], "7");
        delete.assert_async().await;
    }
}
