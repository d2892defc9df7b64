//! A [`Mailer`] that renders messages and writes them to the log instead of
//! an SMTP relay.

use async_trait::async_trait;
use dash_core::{
  ServiceError,
  service::{Email, Mailer},
};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct LogMailer {
  from: String,
}

impl LogMailer {
  pub fn new(from: impl Into<String>) -> Self { Self { from: from.into() } }

  pub fn from_address(&self) -> &str { &self.from }
}

fn field<'a>(context: &'a Value, key: &str) -> &'a str { context[key].as_str().unwrap_or("") }

/// Render the plain-text body of `email` from its template and context.
pub fn render(email: &Email) -> String {
  let ctx = &email.context;
  match email.template.as_str() {
    "set-password" => {
      let name = match field(ctx, "name") {
        "" => email.to.as_str(),
        name => name,
      };
      format!(
        "Hello {name},\n\n\
         An account has been created for you on the dashboard.\n\
         Choose your password here:\n\n  {}\n",
        field(ctx, "url"),
      )
    }
    other => format!("[{other}]\n{ctx:#}\n"),
  }
}

#[async_trait]
impl Mailer for LogMailer {
  async fn send(&self, email: Email) -> Result<(), ServiceError> {
    let body = render(&email);
    tracing::info!(
      from = %self.from,
      to = %email.to,
      subject = %email.subject,
      template = %email.template,
      %body,
      "sending mail"
    );
    Ok(())
  }
}
