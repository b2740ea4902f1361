use duet_common::merge::merge;
use duet_common::pagination::{cursor, paginate};
use duet_common::types::{Message, UserId};
use duet_common::{identity, presence, typing, validate};
use wasm_bindgen::prelude::*;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid payload error: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Sync(#[from] duet_common::SyncError),
}

#[derive(serde::Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultData {
    String { data: String },
    Bool { data: bool },
    Messages { data: Vec<Message> },
    Page { messages: Vec<Message>, has_more: bool },
}

#[derive(serde::Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReturnValue {
    Ok { value: Vec<ResultData> },
    Error { message: String },
}
impl ReturnValue {
    pub fn to_value(&self) -> wasm_bindgen::JsValue {
        // plain objects rather than JS Maps
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        serde::Serialize::serialize(self, &serializer).unwrap_or_else(|e| {
            gloo::console::log!(e.to_string());
            JsValue::NULL
        })
    }
}

impl From<Result<ResultData, Error>> for ReturnValue {
    fn from(result: Result<ResultData, Error>) -> Self {
        match result {
            Ok(data) => ReturnValue::Ok { value: vec![data] },
            Err(e) => ReturnValue::Error {
                message: e.to_string(),
            },
        }
    }
}

fn get_messages(value: JsValue) -> Result<Vec<Message>, Error> {
    serde_wasm_bindgen::from_value(value).map_err(|e| Error::InvalidPayload(e.to_string()))
}

fn get_message(value: JsValue) -> Result<Message, Error> {
    serde_wasm_bindgen::from_value(value).map_err(|e| Error::InvalidPayload(e.to_string()))
}

/// Millisecond timestamps arrive as JS numbers.
fn millis(value: f64) -> Result<i64, Error> {
    if value.is_finite() {
        Ok(value as i64)
    } else {
        Err(Error::InvalidPayload(format!("not a timestamp: {value}")))
    }
}

fn merge_inner(existing: Vec<Message>, incoming: Vec<Message>) -> ResultData {
    ResultData::Messages {
        data: merge(&existing, &incoming),
    }
}

fn reconcile_inner(existing: Vec<Message>, canonical: Message, owner: &str) -> ResultData {
    ResultData::Messages {
        data: identity::reconcile(&existing, canonical, &UserId::from(owner)),
    }
}

fn paginate_inner(rows: Vec<Message>, limit: usize) -> ResultData {
    let limit = validate::clamp_page_limit(limit as i64);
    let page = paginate(rows, limit);
    ResultData::Page {
        messages: page.messages,
        has_more: page.has_more,
    }
}

fn validate_text_inner(text: &str) -> Result<ResultData, Error> {
    let data = validate::validate_body(text)?;
    Ok(ResultData::String { data })
}

fn merge_js(existing: JsValue, incoming: JsValue) -> Result<ResultData, Error> {
    Ok(merge_inner(get_messages(existing)?, get_messages(incoming)?))
}

fn reconcile_js(existing: JsValue, canonical: JsValue, owner: &str) -> Result<ResultData, Error> {
    Ok(reconcile_inner(
        get_messages(existing)?,
        get_message(canonical)?,
        owner,
    ))
}

fn should_emit_js(current_input: &str, last_emit_at: f64, now: f64) -> Result<ResultData, Error> {
    Ok(ResultData::Bool {
        data: typing::should_emit(current_input, millis(last_emit_at)?, millis(now)?),
    })
}

#[wasm_bindgen]
pub fn merge_messages(existing: JsValue, incoming: JsValue) -> JsValue {
    ReturnValue::from(merge_js(existing, incoming)).to_value()
}

#[wasm_bindgen]
pub fn reconcile_message(existing: JsValue, canonical: JsValue, owner: String) -> JsValue {
    ReturnValue::from(reconcile_js(existing, canonical, &owner)).to_value()
}

/// `rows` is the newest-first fetch of up to `limit + 1` rows.
#[wasm_bindgen]
pub fn paginate_page(rows: JsValue, limit: usize) -> JsValue {
    let result = get_messages(rows).map(|rows| paginate_inner(rows, limit));
    ReturnValue::from(result).to_value()
}

/// `created_at` to pass as `before` for the next older page, if any.
#[wasm_bindgen]
pub fn page_cursor(messages: JsValue) -> JsValue {
    let result = get_messages(messages).map(|messages| match cursor(&messages) {
        Some(data) => ResultData::String {
            data: data.to_string(),
        },
        None => ResultData::Bool { data: false },
    });
    ReturnValue::from(result).to_value()
}

#[wasm_bindgen]
pub fn is_online(last_seen_at: Option<String>, now_ms: f64) -> JsValue {
    let result = millis(now_ms).map(|now| ResultData::Bool {
        data: presence::is_online(last_seen_at.as_deref(), now),
    });
    ReturnValue::from(result).to_value()
}

#[wasm_bindgen]
pub fn should_emit_typing(current_input: &str, last_emit_at: f64, now: f64) -> JsValue {
    ReturnValue::from(should_emit_js(current_input, last_emit_at, now)).to_value()
}

/// Trimmed body, or the reason it cannot be sent.
#[wasm_bindgen]
pub fn validate_text(text: &str) -> JsValue {
    ReturnValue::from(validate_text_inner(text)).to_value()
}
