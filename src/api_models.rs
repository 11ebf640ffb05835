use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/**
 * A single vote as submitted by a client
 */
#[derive(Debug, Deserialize)]
pub struct Ballot {
    pub choice: String,
}

/**
 * Confirmation returned once a ballot has been recorded
 */
#[derive(Debug, Serialize)]
pub struct Receipt {
    pub message: String,
}

impl Receipt {
    pub fn for_choice(choice: &str) -> Self {
        Self {
            message: format!("Vote for {} recorded!", choice),
        }
    }
}

/**
 * Aggregated results keyed by choice label
 *
 * Choices nobody has voted for are simply absent.
 */
pub type Tally = HashMap<String, i64>;

/**
 * Error payload for the JSON API
 */
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }

    pub fn db_unavailable() -> Self {
        Self::new("Database connection failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ballot_parses_a_string_choice() {
        let ballot: Ballot = serde_json::from_str(r#"{"choice":"ai"}"#).unwrap();
        assert_eq!(ballot.choice, "ai");
    }

    #[test]
    fn ballot_rejects_missing_null_or_non_string_choice() {
        assert!(serde_json::from_str::<Ballot>("{}").is_err());
        assert!(serde_json::from_str::<Ballot>(r#"{"choice":null}"#).is_err());
        assert!(serde_json::from_str::<Ballot>(r#"{"choice":7}"#).is_err());
    }

    #[test]
    fn receipt_echoes_the_choice() {
        let receipt = Receipt::for_choice("devops");
        assert_eq!(
            serde_json::to_string(&receipt).unwrap(),
            r#"{"message":"Vote for devops recorded!"}"#
        );
    }

    #[test]
    fn unavailable_error_matches_the_api_contract() {
        let error = ApiError::db_unavailable();
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"error":"Database connection failed"}"#
        );
    }
}
