use serde::{Deserialize, Serialize};

use crate::core::llm::Provider;

/// Conversational role of a persona. The Portuguese tags used by the
/// dashboard are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaType {
    #[serde(alias = "atendimento")]
    Intake,
    #[serde(alias = "orcamento")]
    Quoting,
    #[serde(alias = "validacao")]
    Validation,
    Email,
}

impl PersonaType {
    pub fn as_str(self) -> &'static str {
        match self {
            PersonaType::Intake => "intake",
            PersonaType::Quoting => "quoting",
            PersonaType::Validation => "validation",
            PersonaType::Email => "email",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "intake" | "atendimento" => Some(PersonaType::Intake),
            "quoting" | "orcamento" => Some(PersonaType::Quoting),
            "validation" | "validacao" => Some(PersonaType::Validation),
            "email" => Some(PersonaType::Email),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPersona {
    pub agent_id: String,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub target_model: String,
    pub provider: Option<Provider>,
    pub active: bool,
    pub persona_type: PersonaType,
    pub created_at: String,
    pub updated_at: String,
}

fn default_true() -> bool {
    true
}

/// Save/create payload. Fields are loosely typed so that missing or unknown
/// values surface as validation errors instead of deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentInput {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub target_model: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub persona_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Pending,
    Processing,
    Completed,
    Approved,
    Sent,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Processing => "processing",
            QuoteStatus::Completed => "completed",
            QuoteStatus::Approved => "approved",
            QuoteStatus::Sent => "sent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(QuoteStatus::Pending),
            "processing" => Some(QuoteStatus::Processing),
            "completed" => Some(QuoteStatus::Completed),
            "approved" => Some(QuoteStatus::Approved),
            "sent" => Some(QuoteStatus::Sent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteProduct {
    pub id: String,
    pub name: String,
    pub product_type: String,
    pub subtype: Option<String>,
    pub dimension: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteRequest {
    pub id: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub location: String,
    pub delivery_date: Option<String>,
    pub payment_terms: Option<String>,
    pub status: QuoteStatus,
    pub items: Vec<QuoteProduct>,
    /// Absent until every line item carries a unit price.
    pub total_value: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

impl QuoteRequest {
    pub(crate) fn compute_total(items: &[QuoteProduct]) -> Option<f64> {
        if items.is_empty() {
            return None;
        }
        items.iter().try_fold(0.0, |acc, item| {
            item.unit_price.map(|price| acc + price * f64::from(item.quantity))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuote {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub delivery_date: Option<String>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub items: Vec<NewQuoteItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuoteItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiTokenRecord {
    pub id: String,
    pub name: String,
    pub created_at: String,
}
