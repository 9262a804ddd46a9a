//! Reply DTOs
//!
//! Every reply is a JSON object carrying `status` (`"success"` or `"error"`).
//! Error replies add a stable `code` and a human-readable `message`.

use serde::Serialize;

use crate::application::services::{BookingReceipt, BookingView};
use crate::domain::Slot;
use crate::support::errors::ReservationError;
use crate::support::time::format_wire_time;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotDto {
    pub slot_id: i32,
    pub slot_number: String,
    pub status: String,
}

impl From<Slot> for SlotDto {
    fn from(slot: Slot) -> Self {
        Self {
            slot_id: slot.id,
            slot_number: slot.label,
            status: slot.occupancy.as_str().to_string(),
        }
    }
}

/// One entry of a `my_bookings` listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingDto {
    pub booking_id: i32,
    pub slot_number: String,
    pub vehicle_number: String,
    pub start_time: String,
    pub booking_status: String,
}

impl From<BookingView> for BookingDto {
    fn from(view: BookingView) -> Self {
        Self {
            booking_id: view.reservation.id,
            slot_number: view.slot_label,
            vehicle_number: view.reservation.asset_tag,
            start_time: format_wire_time(&view.reservation.created_at),
            booking_status: view.reservation.status.as_str().to_string(),
        }
    }
}

/// Full record returned by `get_booking`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingDetailDto {
    pub booking_id: i32,
    pub slot_number: String,
    pub user_name: String,
    pub vehicle_number: String,
    pub start_time: String,
    pub booking_status: String,
}

impl From<BookingView> for BookingDetailDto {
    fn from(view: BookingView) -> Self {
        Self {
            booking_id: view.reservation.id,
            slot_number: view.slot_label,
            user_name: view.reservation.holder_name,
            vehicle_number: view.reservation.asset_tag,
            start_time: format_wire_time(&view.reservation.created_at),
            booking_status: view.reservation.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Slots {
        slots: Vec<SlotDto>,
    },
    Booked {
        message: String,
        booking_id: i32,
        slot_number: String,
        start_time: String,
    },
    Message {
        message: String,
    },
    Bookings {
        bookings: Vec<BookingDto>,
    },
    Booking {
        booking: BookingDetailDto,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply {
    Success(Payload),
    Error { code: &'static str, message: String },
}

impl Reply {
    pub fn slots(slots: Vec<Slot>) -> Self {
        Self::Success(Payload::Slots {
            slots: slots.into_iter().map(SlotDto::from).collect(),
        })
    }

    pub fn booked(receipt: BookingReceipt) -> Self {
        Self::Success(Payload::Booked {
            message: format!("Slot {} booked successfully", receipt.slot_label),
            booking_id: receipt.reservation_id,
            slot_number: receipt.slot_label,
            start_time: format_wire_time(&receipt.created_at),
        })
    }

    pub fn cancelled() -> Self {
        Self::Success(Payload::Message {
            message: "Booking cancelled successfully".to_string(),
        })
    }

    pub fn bookings(views: Vec<BookingView>) -> Self {
        Self::Success(Payload::Bookings {
            bookings: views.into_iter().map(BookingDto::from).collect(),
        })
    }

    pub fn booking(view: BookingView) -> Self {
        Self::Success(Payload::Booking {
            booking: view.into(),
        })
    }

    pub fn unknown_action() -> Self {
        Self::Error {
            code: "unknown_action",
            message: "Unknown action".to_string(),
        }
    }

    /// Integrity failures never leak their detail to clients.
    pub fn failure(err: &ReservationError) -> Self {
        let message = if err.is_fatal() {
            "Internal error".to_string()
        } else {
            err.to_string()
        };
        Self::Error {
            code: err.code(),
            message,
        }
    }

    /// Metric label for this reply
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Error { code, .. } => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Occupancy, Reservation, ReservationStatus};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn slot_listing_shape() {
        let reply = Reply::slots(vec![
            Slot::new(1, "A1"),
            Slot::new(2, "A2").with_occupancy(Occupancy::Occupied),
        ]);
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({
                "status": "success",
                "slots": [
                    {"slot_id": 1, "slot_number": "A1", "status": "Available"},
                    {"slot_id": 2, "slot_number": "A2", "status": "Occupied"}
                ]
            })
        );
    }

    #[test]
    fn booked_reply_formats_start_time() {
        let reply = Reply::booked(BookingReceipt {
            reservation_id: 7,
            slot_id: 3,
            slot_label: "A3".into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
        });
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({
                "status": "success",
                "message": "Slot A3 booked successfully",
                "booking_id": 7,
                "slot_number": "A3",
                "start_time": "2024-05-01 08:30:00"
            })
        );
    }

    #[test]
    fn history_entry_shape() {
        let view = BookingView {
            reservation: Reservation {
                id: 2,
                slot_id: 1,
                holder_name: "carol".into(),
                asset_tag: "CAR-2".into(),
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
                status: ReservationStatus::Cancelled,
            },
            slot_label: "A1".into(),
        };
        let value = serde_json::to_value(Reply::bookings(vec![view])).unwrap();
        assert_eq!(value["bookings"][0]["booking_status"], "Cancelled");
        assert_eq!(value["bookings"][0]["vehicle_number"], "CAR-2");
        assert!(value["bookings"][0].get("user_name").is_none());
    }

    #[test]
    fn errors_carry_code_and_message() {
        let value = serde_json::to_value(Reply::failure(&ReservationError::SlotUnavailable)).unwrap();
        assert_eq!(
            value,
            json!({"status": "error", "code": "slot_unavailable", "message": "Slot is already occupied"})
        );

        let hidden = Reply::failure(&ReservationError::Integrity("slot 4 double freed".into()));
        assert_eq!(
            serde_json::to_value(&hidden).unwrap()["message"],
            "Internal error"
        );
        assert_eq!(hidden.outcome(), "internal_error");
    }
}
