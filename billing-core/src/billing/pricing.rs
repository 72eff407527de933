use rust_decimal::Decimal;

use crate::models::client::{Client, ServiceType};

/// Resolves the flat unit price a client pays for a service label.
///
/// Unknown labels (including the empty string) and unset or zero
/// configured rates both resolve to zero, which every caller treats as
/// "not billable". Deterministic function of the client record only.
pub fn resolve_price(client: &Client, label: &str) -> Decimal {
    match ServiceType::from_label(label) {
        Some(service) => client.rate_for(service),
        None => Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use uuid::Uuid;

    fn client_with_poster_rate(rate: Option<&str>) -> Client {
        Client {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            email: "billing@acme.test".to_string(),
            phone: None,
            address: None,
            poster_design_price: rate.map(|r| Decimal::from_str(r).unwrap()),
            video_editing_price: None,
            ai_video_price: None,
            document_editing_price: None,
            other_work_price: None,
        }
    }

    #[test]
    fn test_resolves_configured_rate() {
        let client = client_with_poster_rate(Some("500"));
        assert_eq!(
            resolve_price(&client, "Poster Design"),
            Decimal::from_str("500").unwrap()
        );
    }

    #[test]
    fn test_unset_rate_is_zero() {
        let client = client_with_poster_rate(None);
        assert_eq!(resolve_price(&client, "Poster Design"), Decimal::ZERO);
        assert_eq!(resolve_price(&client, "AI Video"), Decimal::ZERO);
    }

    #[test]
    fn test_unknown_label_is_zero() {
        let client = client_with_poster_rate(Some("500"));
        assert_eq!(resolve_price(&client, "Logo Design"), Decimal::ZERO);
        assert_eq!(resolve_price(&client, ""), Decimal::ZERO);
    }

    #[test]
    fn test_all_five_labels_parse() {
        for label in [
            "Poster Design",
            "Video Editing",
            "AI Video",
            "Document Editing",
            "Other Work",
        ] {
            assert!(ServiceType::from_label(label).is_some(), "{label}");
            assert_eq!(ServiceType::from_label(label).unwrap().label(), label);
        }
    }
}
