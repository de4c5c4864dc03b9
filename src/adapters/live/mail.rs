//! Mail delivery through Graph `sendMail`.

use serde_json::{json, Value};

use super::graph::GraphClient;
use crate::ports::{Email, Notifier, PortFuture};

/// Sends mail as a fixed mailbox.
pub struct GraphMailer {
    graph: GraphClient,
    sender: String,
}

impl GraphMailer {
    /// Creates a mailer sending from `sender`.
    #[must_use]
    pub fn new(graph: GraphClient, sender: &str) -> Self {
        Self { graph, sender: sender.to_string() }
    }
}

fn message_body(email: &Email) -> Value {
    let recipients: Vec<Value> =
        email.to.iter().map(|a| json!({ "emailAddress": { "address": a } })).collect();
    json!({
        "message": {
            "subject": email.subject,
            "body": { "contentType": "HTML", "content": email.html_body },
            "toRecipients": recipients,
        },
        "saveToSentItems": false,
    })
}

impl Notifier for GraphMailer {
    fn send<'a>(&'a self, email: &'a Email) -> PortFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .graph
                .post(&format!("users/{}/sendMail", self.sender))
                .json(&message_body(email));
            GraphClient::send(request).await.map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_lists_every_recipient() {
        let email = Email {
            to: vec!["a@x.org".into(), "b@x.org".into()],
            subject: "New case".into(),
            html_body: "<p>hi</p>".into(),
        };
        let body = message_body(&email);
        assert_eq!(body["message"]["toRecipients"][1]["emailAddress"]["address"], "b@x.org");
        assert_eq!(body["message"]["body"]["contentType"], "HTML");
    }
}
