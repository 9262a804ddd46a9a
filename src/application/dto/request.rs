//! Request DTOs
//!
//! Each action's payload is deserialized from the request object and then
//! run through `validator`. Integer ids are accepted both as JSON numbers and
//! as numeric strings.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::support::errors::ReservationError;

#[derive(Debug, Deserialize, Validate)]
pub struct BookSlotRequest {
    #[serde(deserialize_with = "flexible_id")]
    pub slot_id: i32,
    #[validate(length(min = 1, max = 100, message = "user_name is required"))]
    pub user_name: String,
    #[validate(length(min = 1, max = 32, message = "vehicle_number is required"))]
    pub vehicle_number: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookingIdRequest {
    #[serde(deserialize_with = "flexible_id")]
    pub booking_id: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MyBookingsRequest {
    #[validate(length(min = 1, max = 100, message = "user_name is required"))]
    pub user_name: String,
}

/// Deserialize `request` into `T` and validate it.
pub fn parse_validated<T>(request: &Value) -> Result<T, ReservationError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = T::deserialize(request)
        .map_err(|e| ReservationError::InvalidRequest(e.to_string()))?;

    value.validate().map_err(|errors| {
        let mut field_errors: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    format!("{}: {}", field, msg)
                })
            })
            .collect();
        field_errors.sort();

        if field_errors.is_empty() {
            ReservationError::InvalidRequest("validation failed".to_string())
        } else {
            ReservationError::InvalidRequest(field_errors.join("; "))
        }
    })?;

    Ok(value)
}

fn flexible_id<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => {
            i32::try_from(n).map_err(|_| de::Error::custom(format!("id {} is out of range", n)))
        }
        RawId::Text(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|_| de::Error::custom(format!("'{}' is not a valid id", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        let a: BookSlotRequest = parse_validated(&json!({
            "action": "book_slot", "slot_id": 3, "user_name": "alice", "vehicle_number": "XYZ1"
        }))
        .unwrap();
        let b: BookingIdRequest =
            parse_validated(&json!({"action": "cancel_booking", "booking_id": " 12 "})).unwrap();
        assert_eq!(a.slot_id, 3);
        assert_eq!(b.booking_id, 12);
    }

    #[test]
    fn non_numeric_id_is_invalid() {
        let err = parse_validated::<BookingIdRequest>(&json!({"booking_id": "abc"})).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn missing_and_empty_fields_are_invalid() {
        let missing = parse_validated::<BookSlotRequest>(&json!({"slot_id": 1, "user_name": "bob"}));
        assert!(matches!(missing, Err(ReservationError::InvalidRequest(m)) if m.contains("vehicle_number")));

        let empty = parse_validated::<MyBookingsRequest>(&json!({"user_name": ""}));
        assert_eq!(
            empty.unwrap_err(),
            ReservationError::InvalidRequest("user_name: user_name is required".into())
        );
    }
}
