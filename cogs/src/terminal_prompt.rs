//! Terminal prompts backed by inquire

use async_trait::async_trait;
use cogs_host::{Answers, PromptError, Prompter};
use cogs_api::{PromptQuestion, QuestionKind};
use inquire::{Confirm, CustomType, InquireError, Password, Select, Text};
use serde_json::{Number, Value};
use std::io::IsTerminal;

/// Asks each question on the terminal, in order
///
/// Prompts run on a blocking task so the runtime stays responsive.
#[derive(Debug, Clone, Copy, Default)]
pub struct InquirePrompter;

impl InquirePrompter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prompter for InquirePrompter {
    async fn prompt(&self, questions: &[PromptQuestion]) -> Result<Answers, PromptError> {
        if !std::io::stdin().is_terminal() {
            return Err(PromptError::NonInteractive);
        }

        let questions = questions.to_vec();
        tokio::task::spawn_blocking(move || -> Result<Answers, PromptError> {
            let mut answers = Answers::new();
            for question in &questions {
                answers.insert(question.name.clone(), ask(question)?);
            }
            Ok(answers)
        })
        .await
        .map_err(|e| PromptError::Failed(e.to_string()))?
    }
}

fn ask(question: &PromptQuestion) -> Result<Value, PromptError> {
    let message = question.display_message();
    let default = question.default_value.as_ref();

    match question.kind {
        QuestionKind::Input => {
            let default = default.map(value_text);
            let mut prompt = Text::new(message);
            if let Some(default) = &default {
                prompt = prompt.with_default(default);
            }
            prompt.prompt().map(Value::String).map_err(map_inquire_error)
        }
        QuestionKind::Number => {
            let mut prompt = CustomType::<f64>::new(message);
            if let Some(default) = default.and_then(Value::as_f64) {
                prompt = prompt.with_default(default);
            }
            let number = prompt.prompt().map_err(map_inquire_error)?;
            Ok(Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null))
        }
        QuestionKind::Confirm => {
            let mut prompt = Confirm::new(message);
            if let Some(default) = default.and_then(Value::as_bool) {
                prompt = prompt.with_default(default);
            }
            prompt.prompt().map(Value::Bool).map_err(map_inquire_error)
        }
        QuestionKind::Password => Password::new(message)
            .without_confirmation()
            .prompt()
            .map(Value::String)
            .map_err(map_inquire_error),
        QuestionKind::List => {
            let cursor = default
                .map(value_text)
                .and_then(|d| question.choices.iter().position(|c| *c == d))
                .unwrap_or(0);
            Select::new(message, question.choices.clone())
                .with_starting_cursor(cursor)
                .prompt()
                .map(Value::String)
                .map_err(map_inquire_error)
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn map_inquire_error(e: InquireError) -> PromptError {
    match e {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            PromptError::Cancelled
        }
        InquireError::NotTTY => PromptError::NonInteractive,
        other => PromptError::Failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_inquire_error() {
        assert!(matches!(
            map_inquire_error(InquireError::OperationCanceled),
            PromptError::Cancelled
        ));
        assert!(matches!(
            map_inquire_error(InquireError::NotTTY),
            PromptError::NonInteractive
        ));
        assert!(matches!(
            map_inquire_error(InquireError::InvalidConfiguration("bad".into())),
            PromptError::Failed(_)
        ));
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("prod")), "prod");
        assert_eq!(value_text(&json!(3)), "3");
    }
}
