// Query and response shapes shared by the resource handlers

use serde::{Deserialize, Serialize};

use crate::api::extract::AppJson;
use crate::domain::pagination::PageRequest;
use crate::infrastructure::email::{Mailer, OutgoingEmail};
use crate::state::AppState;

/// `?pageSize=&pageNumber=&keyword=`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page_size: Option<u32>,
    pub page_number: Option<u32>,
    pub keyword: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page_size, self.page_number)
    }

    /// Keyword with surrounding whitespace removed; blank counts as absent
    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn message(text: impl Into<String>) -> AppJson<MessageResponse> {
    AppJson(MessageResponse {
        message: text.into(),
    })
}

/// Treats blank optional strings from forms as absent
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Sends a notification; delivery problems are logged, never surfaced
pub async fn notify(state: &AppState, email: OutgoingEmail) {
    deliver(state.mailer.as_ref(), email).await;
}

/// Like [`notify`], but returns before the message is handed to the mailer
///
/// Used where response time must not reveal whether a message was sent.
pub fn notify_in_background(state: &AppState, email: OutgoingEmail) {
    let mailer = state.mailer.clone();
    tokio::spawn(async move {
        deliver(mailer.as_ref(), email).await;
    });
}

async fn deliver(mailer: &dyn Mailer, email: OutgoingEmail) {
    let to = email.to.clone();
    if let Err(e) = mailer.send(email).await {
        tracing::warn!(to = %to, error = %e, "Failed to send email");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keyword_is_absent() {
        let query = PageQuery {
            keyword: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(query.keyword(), None);
    }

    #[test]
    fn page_query_uses_camel_case() {
        let query: PageQuery =
            serde_json::from_str(r#"{"pageSize": 5, "pageNumber": 2, "keyword": " áo "}"#).unwrap();
        assert_eq!(query.page().offset(), 5);
        assert_eq!(query.keyword(), Some("áo"));
    }
}
