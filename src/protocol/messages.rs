use serde::Deserialize;

/// Discriminant of an inbound message
///
/// The backend may grow new kinds; anything unrecognized decodes as
/// `Unknown` and is dropped upstream instead of failing the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Session-level status, may carry an assessment
    State,
    /// Interim transcript fragment
    Partial,
    /// Confirmed transcript fragment
    Final,
    /// Phishing-risk assessment
    Risk,
    #[serde(other)]
    Unknown,
}

/// One message from the analysis backend
///
/// A tagged variant: which payload fields are present depends on `kind`.
/// Fields absent on the wire stay `None`; they are never defaulted to a
/// zero value.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub kind: MessageKind,

    /// Stream position in seconds
    #[serde(rename = "t")]
    pub timestamp: f64,

    /// Transcript fragment (`partial` / `final`)
    #[serde(default)]
    pub text: Option<String>,

    /// Keyword-level assessment (`risk`, sometimes `state`)
    #[serde(default)]
    pub immediate: Option<ImmediateRisk>,

    /// Full-context assessment (`risk`, sometimes `state`)
    #[serde(default)]
    pub comprehensive: Option<ComprehensiveRisk>,
}

/// Fast keyword-driven risk assessment
#[derive(Debug, Clone, Deserialize)]
pub struct ImmediateRisk {
    /// Severity tier
    pub level: i32,
    /// 0.0 to 1.0
    pub probability: f64,
    #[serde(default)]
    pub phishing_type: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub method: Option<String>,
}

/// Whole-conversation risk assessment
#[derive(Debug, Clone, Deserialize)]
pub struct ComprehensiveRisk {
    pub is_phishing: bool,
    /// 0.0 to 1.0
    pub confidence: f64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub analyzed_length: Option<i64>,
}
