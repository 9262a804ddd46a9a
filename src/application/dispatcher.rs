//! Request dispatcher: resolves the `action` tag and delegates to the
//! reservation core.
//!
//! Stateless apart from the shared core handle; every request is answered
//! with exactly one [`Reply`].

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::application::dto::{
    parse_validated, BookSlotRequest, BookingIdRequest, MyBookingsRequest, Reply,
};
use crate::application::services::ReservationService;
use crate::support::errors::ReservationError;

/// Record request outcome and latency to Prometheus.
fn record_request(action: &'static str, outcome: &'static str, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    metrics::histogram!("parking_request_duration_seconds", "action" => action).record(duration);
    metrics::counter!("parking_requests_total", "action" => action, "outcome" => outcome)
        .increment(1);
}

#[derive(Clone)]
pub struct RequestDispatcher {
    core: Arc<ReservationService>,
}

impl RequestDispatcher {
    pub fn new(core: Arc<ReservationService>) -> Self {
        Self { core }
    }

    pub async fn dispatch(&self, request: &Value) -> Reply {
        let start = Instant::now();

        let (action, result) = match request.get("action").and_then(Value::as_str) {
            Some("get_slots") => ("get_slots", Ok(Reply::slots(self.core.list_slots()))),
            Some("book_slot") => ("book_slot", self.book_slot(request).await),
            Some("cancel_booking") => ("cancel_booking", self.cancel_booking(request).await),
            Some("my_bookings") => ("my_bookings", self.my_bookings(request).await),
            Some("get_booking") => ("get_booking", self.get_booking(request).await),
            other => {
                debug!(action = ?other, "Unknown action");
                ("unknown", Ok(Reply::unknown_action()))
            }
        };

        let reply = result.unwrap_or_else(|e| {
            if !e.is_fatal() {
                warn!(action, code = e.code(), error = %e, "Request rejected");
            }
            Reply::failure(&e)
        });
        record_request(action, reply.outcome(), start);
        reply
    }

    async fn book_slot(&self, request: &Value) -> Result<Reply, ReservationError> {
        let req: BookSlotRequest = parse_validated(request)?;
        let receipt = self
            .core
            .book(req.slot_id, &req.user_name, &req.vehicle_number)
            .await?;
        Ok(Reply::booked(receipt))
    }

    async fn cancel_booking(&self, request: &Value) -> Result<Reply, ReservationError> {
        let req: BookingIdRequest = parse_validated(request)?;
        self.core.cancel(req.booking_id).await?;
        Ok(Reply::cancelled())
    }

    async fn my_bookings(&self, request: &Value) -> Result<Reply, ReservationError> {
        let req: MyBookingsRequest = parse_validated(request)?;
        let views = self.core.bookings_for(&req.user_name).await?;
        Ok(Reply::bookings(views))
    }

    async fn get_booking(&self, request: &Value) -> Result<Reply, ReservationError> {
        let req: BookingIdRequest = parse_validated(request)?;
        self.core
            .find_booking(req.booking_id)
            .await?
            .map(Reply::booking)
            .ok_or(ReservationError::ReservationNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::slot::slot_labels;
    use crate::domain::Slot;
    use crate::infrastructure::InMemoryLedger;
    use serde_json::json;

    fn dispatcher() -> RequestDispatcher {
        let slots = slot_labels("A", 10)
            .into_iter()
            .enumerate()
            .map(|(i, label)| Slot::new(i as i32 + 1, label))
            .collect();
        let core = ReservationService::new(slots, Arc::new(InMemoryLedger::new()));
        RequestDispatcher::new(Arc::new(core))
    }

    async fn call(d: &RequestDispatcher, request: Value) -> Value {
        serde_json::to_value(d.dispatch(&request).await).unwrap()
    }

    #[tokio::test]
    async fn scenario_over_actions() {
        let d = dispatcher();

        let slots = call(&d, json!({"action": "get_slots"})).await;
        assert_eq!(slots["status"], "success");
        assert_eq!(slots["slots"].as_array().unwrap().len(), 10);
        assert_eq!(slots["slots"][1]["slot_number"], "A10");

        let booked = call(
            &d,
            json!({"action": "book_slot", "slot_id": "1", "user_name": "bob", "vehicle_number": "CAR-1"}),
        )
        .await;
        assert_eq!(booked["status"], "success");
        assert_eq!(booked["booking_id"], 1);
        assert_eq!(booked["message"], "Slot A1 booked successfully");

        let taken = call(
            &d,
            json!({"action": "book_slot", "slot_id": 1, "user_name": "carol", "vehicle_number": "CAR-2"}),
        )
        .await;
        assert_eq!(taken["code"], "slot_unavailable");

        let cancelled = call(&d, json!({"action": "cancel_booking", "booking_id": 1})).await;
        assert_eq!(cancelled["message"], "Booking cancelled successfully");

        let again = call(&d, json!({"action": "cancel_booking", "booking_id": 1})).await;
        assert_eq!(again["code"], "already_cancelled");

        let mine = call(&d, json!({"action": "my_bookings", "user_name": "bob"})).await;
        assert_eq!(mine["bookings"][0]["booking_status"], "Cancelled");

        let detail = call(&d, json!({"action": "get_booking", "booking_id": 1})).await;
        assert_eq!(detail["booking"]["user_name"], "bob");
    }

    #[tokio::test]
    async fn unknown_and_missing_actions() {
        let d = dispatcher();
        let unknown = call(&d, json!({"action": "reserve_everything"})).await;
        assert_eq!(
            unknown,
            json!({"status": "error", "code": "unknown_action", "message": "Unknown action"})
        );
        let missing = call(&d, json!({"slot_id": 1})).await;
        assert_eq!(missing["code"], "unknown_action");
    }

    #[tokio::test]
    async fn bad_payloads_are_invalid_requests() {
        let d = dispatcher();
        let reply = call(&d, json!({"action": "book_slot", "slot_id": "one"})).await;
        assert_eq!(reply["code"], "invalid_request");
        assert!(reply["message"].as_str().unwrap().starts_with("Invalid request: "));

        let blank = call(
            &d,
            json!({"action": "book_slot", "slot_id": 2, "user_name": "   ", "vehicle_number": "X"}),
        )
        .await;
        assert_eq!(blank["code"], "invalid_request");

        let lookup = call(&d, json!({"action": "get_booking", "booking_id": 77})).await;
        assert_eq!(lookup["code"], "booking_not_found");
    }

    #[tokio::test]
    async fn unknown_slot_reply() {
        let d = dispatcher();
        let reply = call(
            &d,
            json!({"action": "book_slot", "slot_id": 999, "user_name": "bob", "vehicle_number": "X"}),
        )
        .await;
        assert_eq!(reply["code"], "slot_not_found");
        assert_eq!(reply["message"], "Slot not found");
    }
}
