//! Terminal presentation of human-input requests.

use std::io::{self, Write};

use serde_json::Value;

use super::input::LineSource;
use crate::core::human_input::{AnswerBag, FieldType, HumanInputBroker, HumanInputPrompt, InputField};

const CANCEL_WORD: &str = "/cancel";

/// Interpret one typed line for `field`. `Ok(None)` means "left blank".
pub(crate) fn parse_field_answer(field: &InputField, line: &str) -> Result<Option<Value>, String> {
    let line = line.trim();
    if line.is_empty() {
        return if field.required {
            Err("An answer is required.".to_string())
        } else {
            Ok(None)
        };
    }

    match field.field_type {
        FieldType::Text => Ok(Some(Value::String(line.to_string()))),
        FieldType::Select | FieldType::Radio => pick_option(field, line).map(|o| Some(Value::String(o))),
        FieldType::Checkbox => {
            let picked = line
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| pick_option(field, part).map(Value::String))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(Value::Array(picked)))
        }
    }
}

/// Match by 1-based number or by option text, case-insensitively.
fn pick_option(field: &InputField, raw: &str) -> Result<String, String> {
    if let Ok(index) = raw.parse::<usize>() {
        if let Some(option) = index.checked_sub(1).and_then(|i| field.options.get(i)) {
            return Ok(option.clone());
        }
    }
    field
        .options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(raw))
        .cloned()
        .ok_or_else(|| format!("'{raw}' is not one of the options."))
}

fn print_field(field: &InputField) {
    let label = if field.label.is_empty() { &field.key } else { &field.label };
    let marker = if field.required { " (required)" } else { "" };
    println!("{label}{marker}");
    for (index, option) in field.options.iter().enumerate() {
        println!("  {}. {option}", index + 1);
    }
    if field.field_type == FieldType::Checkbox {
        println!("  (comma-separated)");
    }
    if let Some(placeholder) = &field.placeholder {
        println!("  e.g. {placeholder}");
    }
}

/// Collect answers for every field. `None` when the human typed the cancel
/// word or input ran out.
pub(crate) async fn collect_answers(prompt: &HumanInputPrompt, lines: &mut LineSource) -> Option<AnswerBag> {
    println!();
    println!("? {}", prompt.question);
    println!("  (type {CANCEL_WORD} to dismiss)");

    let mut answers = AnswerBag::new();
    for field in &prompt.fields {
        print_field(field);
        loop {
            print!("> ");
            let _ = io::stdout().flush();
            let line = lines.next_line().await?;
            if line.trim().eq_ignore_ascii_case(CANCEL_WORD) {
                return None;
            }
            match parse_field_answer(field, &line) {
                Ok(Some(value)) => {
                    answers.insert(field.key.clone(), value);
                    break;
                }
                Ok(None) => break,
                Err(message) => println!("{message}"),
            }
        }
    }
    Some(answers)
}

/// Answer or dismiss `prompt` on the broker from terminal input. A prompt
/// that was evicted or cancelled meanwhile is silently dropped.
pub(crate) async fn present(broker: &HumanInputBroker, prompt: HumanInputPrompt, lines: &mut LineSource) {
    let result = match collect_answers(&prompt, lines).await {
        Some(answers) => broker.resolve(prompt.id, answers),
        None => broker.cancel(prompt.id),
    };
    if let Err(err) = result {
        tracing::debug!(error = %err, "Prompt settled elsewhere");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn colours() -> InputField {
        InputField::choice(
            "colour",
            "Colour",
            FieldType::Radio,
            vec!["Red".into(), "Blue".into()],
        )
    }

    #[test]
    fn choices_accept_numbers_or_text() {
        assert_eq!(parse_field_answer(&colours(), "2"), Ok(Some(json!("Blue"))));
        assert_eq!(parse_field_answer(&colours(), "red"), Ok(Some(json!("Red"))));
        assert!(parse_field_answer(&colours(), "3").is_err());
    }

    #[test]
    fn checkbox_answers_are_arrays() {
        let mut field = colours();
        field.field_type = FieldType::Checkbox;
        assert_eq!(
            parse_field_answer(&field, "1, blue"),
            Ok(Some(json!(["Red", "Blue"])))
        );
    }

    #[test]
    fn blank_answers_depend_on_required() {
        let optional = InputField::text("note", "Note");
        assert_eq!(parse_field_answer(&optional, "  "), Ok(None));
        assert!(parse_field_answer(&optional.required(), "").is_err());
    }

    #[tokio::test]
    async fn answers_are_collected_until_valid() {
        let prompt = HumanInputPrompt {
            id: 1,
            question: "Pick".into(),
            fields: vec![colours().required(), InputField::text("note", "Note")],
        };
        let mut lines = LineSource::scripted(&["", "green", "1", "warm"]);
        let answers = collect_answers(&prompt, &mut lines).await.unwrap();
        assert_eq!(answers.get("colour"), Some(&json!("Red")));
        assert_eq!(answers.get("note"), Some(&json!("warm")));
    }

    #[tokio::test]
    async fn cancel_word_dismisses_the_prompt() {
        let broker = HumanInputBroker::new();
        let mut pending = broker.request("Name?", vec![InputField::text("answer", "Answer")]);
        let prompt = broker.current().unwrap();
        let mut lines = LineSource::scripted(&["/cancel"]);

        present(&broker, prompt, &mut lines).await;
        assert_eq!(
            pending.try_outcome(),
            Some(crate::core::human_input::HumanInputOutcome::Cancelled)
        );
    }
}
