//! Walk-in notification texts, attached to the broadcast events for an
//! external notifier to deliver. Delivery itself lives outside this service.

pub fn checked_in_message(customer_name: &str, live_position: i64, estimated_wait: i64) -> String {
    format!(
        "Hi {customer_name}! You're #{live_position} in line. Estimated wait: {estimated_wait} mins. We'll text when you're next!"
    )
}

pub fn called_message(customer_name: &str, barber_name: &str) -> String {
    format!("{customer_name}, you're up next! {barber_name} is ready for you. Please head to the chair.")
}
