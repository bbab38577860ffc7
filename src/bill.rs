// src/bill.rs

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// A raw bill file as handed over by the user-facing layer.
///
/// The payload is kept on the entry after submission so a failed analysis
/// can be retried without asking the user to select the file again.
#[derive(Debug, Clone)]
pub struct BillFile {
    pub name: String,
    /// Declared media type, e.g. "application/pdf" or "image/png".
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Processing lifecycle of one submitted bill.
///
/// `Processing -> Completed` and `Processing -> Error` are the only forward
/// transitions; `Error -> Processing` happens on an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillStatus {
    Processing,
    Completed,
    Error,
}

/// Spending category the model assigns to a bill.
///
/// The prompt constrains the model to the first three; `Other` catches any
/// off-enum string the model emits anyway, so one odd label does not fail
/// the whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillCategory {
    #[serde(alias = "operating-expense", alias = "operating", alias = "expense")]
    OperatingExpense,
    #[serde(alias = "education", alias = "learning/education", alias = "study")]
    Learning,
    #[serde(alias = "investment", alias = "savings/investment", alias = "saving")]
    Savings,
    #[serde(other)]
    Other,
}

/// Structured data extracted from one bill by the model.
///
/// Every field is optional: the reply is accepted as soon as it parses as
/// JSON, and consumers must tolerate missing or extra fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedBill {
    #[serde(default)]
    pub vendor: Option<String>,
    /// Billed total. Accepts a JSON number or a numeric string with
    /// currency symbols / thousand separators; anything else becomes None.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    /// ISO calendar date as text, not validated beyond JSON parsing.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: Option<BillCategory>,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Accept `12.5`, `"12.5"`, `"$1,234.56"`, `null`; map the rest to None.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => parse_amount_text(&s),
        _ => None,
    }))
}

fn parse_amount_text(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// One user-submitted file and its processing lifecycle.
///
/// Exactly one of `extracted` / `error` is populated, and only in the
/// matching status. Entries are never mutated in place: transitions return
/// a new value carrying the same `id`, and the store swaps it in whole.
#[derive(Debug, Clone)]
pub struct BillEntry {
    /// Unique within the session, assigned at submission. Immutable.
    pub id: String,
    pub file: BillFile,
    /// Client-observed submission instant. Survives retries.
    pub uploaded_at: OffsetDateTime,
    pub status: BillStatus,
    pub extracted: Option<ExtractedBill>,
    pub error: Option<String>,
}

impl BillEntry {
    /// A fresh entry, published in `Processing` state.
    pub fn new(id: String, file: BillFile) -> Self {
        Self {
            id,
            file,
            uploaded_at: OffsetDateTime::now_utc(),
            status: BillStatus::Processing,
            extracted: None,
            error: None,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file.name
    }

    /// Terminal success transition.
    pub fn completed(self, data: ExtractedBill) -> Self {
        Self {
            status: BillStatus::Completed,
            extracted: Some(data),
            error: None,
            ..self
        }
    }

    /// Terminal failure transition (absent a retry).
    pub fn failed(self, error: impl Into<String>) -> Self {
        Self {
            status: BillStatus::Error,
            extracted: None,
            error: Some(error.into()),
            ..self
        }
    }

    /// Retry transition: back into `Processing` with the failure cleared.
    pub fn reprocessing(self) -> Self {
        Self {
            status: BillStatus::Processing,
            extracted: None,
            error: None,
            ..self
        }
    }
}
