//! Free text to [`QueryIntent`]
//!
//! The text model is asked for `{mode, start_date, end_date, currency}`.
//! Its reply is parsed tolerantly and every missing or malformed field falls
//! back on its own, so extraction never fails a run.

use chrono::NaiveDate;
use fxportal_core_types::{
    format_tr_date, parse_tr_date, QueryIntent, QueryMode, DEFAULT_CURRENCY_HINT,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::llm::utils::parse_json_relaxed;
use crate::llm::TextModel;

/// Result of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A JSON object was found; absent fields already carry their fallbacks.
    Parsed(QueryIntent),
    /// Nothing usable came back. `raw` is the reply or the service error.
    Unparsed { raw: String },
}

impl Extraction {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Extraction::Parsed(_))
    }

    /// Total: an unparsed reply becomes [`QueryIntent::fallback`].
    pub fn into_intent(self, today: NaiveDate) -> QueryIntent {
        match self {
            Extraction::Parsed(intent) => intent,
            Extraction::Unparsed { .. } => QueryIntent::fallback(today),
        }
    }
}

pub struct IntentExtractor {
    model: Arc<dyn TextModel>,
}

impl IntentExtractor {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    pub async fn extract(&self, prompt: &str, today: NaiveDate) -> Extraction {
        let system = system_prompt(today);
        let user = format!("Kullanıcı mesajı: \"\"\"{prompt}\"\"\"");
        match self.model.complete(&system, &user).await {
            Ok(reply) => interpret(&reply, today),
            Err(err) => {
                warn!(error = %err, "Intent extraction request failed");
                Extraction::Unparsed {
                    raw: err.to_string(),
                }
            }
        }
    }
}

pub fn system_prompt(today: NaiveDate) -> String {
    format!(
        "You are an intelligent extractor for currency report automation.\n\
         Extract:\n\
         - mode: 'all' (all currencies for one date), 'single' (one currency for date range), or 'both'.\n\
         - start_date and end_date in dd/MM/yyyy (handle Turkish: 'bugün','dün','son 3 gün'). Today is {}.\n\
         - currency: if mode!='all'.\n\
         ALWAYS output STRICT JSON with keys: mode, start_date, end_date, currency.",
        format_tr_date(today)
    )
}

/// Applies the relaxed parse and the per-field fallbacks to a raw reply.
pub fn interpret(reply: &str, today: NaiveDate) -> Extraction {
    let Some(Value::Object(fields)) = parse_json_relaxed(reply) else {
        debug!(reply, "No JSON object in extraction reply");
        return Extraction::Unparsed {
            raw: reply.to_string(),
        };
    };

    let mode = text_field(&fields, "mode")
        .and_then(|raw| raw.parse::<QueryMode>().ok())
        .unwrap_or(QueryMode::Single);

    let dates = text_field(&fields, "start_date")
        .zip(text_field(&fields, "end_date"))
        .and_then(|(start, end)| parse_tr_date(start).ok().zip(parse_tr_date(end).ok()));
    let (start, end) = dates.unwrap_or_else(|| {
        debug!("Extracted dates unusable; using the fallback window");
        QueryIntent::fallback_window(today)
    });

    let currency = text_field(&fields, "currency").unwrap_or(DEFAULT_CURRENCY_HINT);

    Extraction::Parsed(QueryIntent::new(mode, start, end, currency))
}

fn text_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    struct Unreachable;

    #[async_trait]
    impl TextModel for Unreachable {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Err(LlmError::Request("connection refused".into()))
        }
    }

    #[test]
    fn well_formed_reply() {
        let reply = r#"{"mode":"single","start_date":"04/03/2025","end_date":"07/03/2025","currency":"İsveç Kronu"}"#;
        let Extraction::Parsed(intent) = interpret(reply, today()) else {
            panic!("expected parsed");
        };
        assert_eq!(intent.mode, QueryMode::Single);
        assert_eq!((intent.start_date, intent.end_date), (date(4), date(7)));
        assert_eq!(intent.currency_hint, "İsveç Kronu");
    }

    #[test]
    fn fenced_reply_with_prose() {
        let reply = "Here you go:\n```json\n{\"mode\":\"ALL\",\"start_date\":\"07/03/2025\",\"end_date\":\"07/03/2025\",\"currency\":null}\n```";
        let intent = interpret(reply, today()).into_intent(today());
        assert_eq!(intent.mode, QueryMode::All);
        assert_eq!(intent.start_date, today());
        assert_eq!(intent.currency_hint, DEFAULT_CURRENCY_HINT);
    }

    #[test]
    fn fields_fall_back_individually() {
        let reply = r#"{"mode":"weekly","start_date":"yesterday","end_date":"07/03/2025","currency":"euro"}"#;
        let Extraction::Parsed(intent) = interpret(reply, today()) else {
            panic!("expected parsed");
        };
        assert_eq!(intent.mode, QueryMode::Single);
        assert_eq!((intent.start_date, intent.end_date), (date(4), date(7)));
        assert_eq!(intent.currency_hint, "euro");
    }

    #[test]
    fn reversed_range_is_swapped() {
        let reply = r#"{"mode":"single","start_date":"07/03/2025","end_date":"01/03/2025","currency":"usd"}"#;
        let intent = interpret(reply, today()).into_intent(today());
        assert!(intent.start_date <= intent.end_date);
        assert_eq!(intent.start_date, date(1));
    }

    #[test]
    fn garbage_uses_the_default_intent() {
        let extraction = interpret("I cannot help with that.", today());
        assert!(!extraction.is_parsed());
        assert_eq!(extraction.into_intent(today()), QueryIntent::fallback(today()));
    }

    #[test]
    fn accepted_replies_survive_reserialization() {
        let reply = r#"{"mode":"both","start_date":"4/3/2025","end_date":"07/03/2025","currency":"SEK"}"#;
        let intent = interpret(reply, today()).into_intent(today());
        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains("\"start_date\":\"04/03/2025\""));
        assert_eq!(interpret(&json, today()), Extraction::Parsed(intent));
    }

    #[test]
    fn prompt_carries_today() {
        let prompt = system_prompt(today());
        assert!(prompt.contains("Today is 07/03/2025"));
        assert!(prompt.contains("son 3 gün"));
    }

    #[tokio::test]
    async fn service_error_is_unparsed() {
        let extractor = IntentExtractor::new(Arc::new(Unreachable));
        let extraction = extractor.extract("son 3 gün İsveç Kronu", today()).await;
        assert!(matches!(extraction, Extraction::Unparsed { ref raw } if raw.contains("connection refused")));
        assert_eq!(extraction.into_intent(today()), QueryIntent::fallback(today()));
    }
}
