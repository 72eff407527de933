use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Service type enumeration for billable work.
///
/// These are the five service labels a task may carry. Each client
/// configures a flat per-unit price for each label; a missing or zero
/// price means the service is not billable for that client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    PosterDesign,
    VideoEditing,
    AiVideo,
    DocumentEditing,
    OtherWork,
}

impl ServiceType {
    /// Parses a service label as stored on a task.
    ///
    /// Any unknown label (including the empty string) resolves to `None`,
    /// which downstream pricing treats as not billable.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Poster Design" => Some(ServiceType::PosterDesign),
            "Video Editing" => Some(ServiceType::VideoEditing),
            "AI Video" => Some(ServiceType::AiVideo),
            "Document Editing" => Some(ServiceType::DocumentEditing),
            "Other Work" => Some(ServiceType::OtherWork),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::PosterDesign => "Poster Design",
            ServiceType::VideoEditing => "Video Editing",
            ServiceType::AiVideo => "AI Video",
            ServiceType::DocumentEditing => "Document Editing",
            ServiceType::OtherWork => "Other Work",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Client model representing an agency client.
///
/// This struct maps to the `clients` table. The five `*_price` columns
/// form the flat per-service rate table consumed by the pricing resolver.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique identifier for the client
    pub id: Uuid,

    /// Client display name
    pub name: String,

    /// Client email address
    pub email: String,

    /// Contact phone number
    pub phone: Option<String>,

    /// Billing address (rendered on the invoice document)
    pub address: Option<String>,

    /// Flat price for Poster Design work (NULL or zero = not billable)
    pub poster_design_price: Option<Decimal>,

    /// Flat price for Video Editing work
    pub video_editing_price: Option<Decimal>,

    /// Flat price for AI Video work
    pub ai_video_price: Option<Decimal>,

    /// Flat price for Document Editing work
    pub document_editing_price: Option<Decimal>,

    /// Flat price for Other Work
    pub other_work_price: Option<Decimal>,
}

impl Client {
    /// Returns the configured rate for a service type, or zero when unset.
    pub fn rate_for(&self, service: ServiceType) -> Decimal {
        let rate = match service {
            ServiceType::PosterDesign => self.poster_design_price,
            ServiceType::VideoEditing => self.video_editing_price,
            ServiceType::AiVideo => self.ai_video_price,
            ServiceType::DocumentEditing => self.document_editing_price,
            ServiceType::OtherWork => self.other_work_price,
        };
        rate.unwrap_or(Decimal::ZERO)
    }
}
