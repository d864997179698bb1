use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::BookingStatus;

// Sent only after the change is committed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingEvent {
    Created {
        booking_id: String,
        guest_id: String,
        total_price: Decimal,
    },
    StatusChanged {
        booking_id: String,
        from: BookingStatus,
        to: BookingStatus,
    },
}

pub type EventSender = mpsc::UnboundedSender<BookingEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<BookingEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

pub fn emit(events: &EventSender, event: BookingEvent) {
    // The mutation already happened, a missing worker only gets logged
    if let Err(e) = events.send(event) {
        tracing::warn!(event = ?e.0, "task worker unavailable, dropping booking event");
    }
}

#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn send_booking_confirmation(&self, booking_id: &str, guest_id: &str)
        -> anyhow::Result<()>;

    async fn process_payment(&self, booking_id: &str, amount: Decimal) -> anyhow::Result<()>;

    async fn send_status_update(
        &self,
        booking_id: &str,
        from: BookingStatus,
        to: BookingStatus,
    ) -> anyhow::Result<()>;
}

pub struct LoggingTaskRunner;

#[async_trait]
impl TaskRunner for LoggingTaskRunner {
    async fn send_booking_confirmation(
        &self,
        booking_id: &str,
        guest_id: &str,
    ) -> anyhow::Result<()> {
        tracing::info!(booking_id, guest_id, "sending booking confirmation");
        Ok(())
    }

    async fn process_payment(&self, booking_id: &str, amount: Decimal) -> anyhow::Result<()> {
        tracing::info!(booking_id, %amount, "processing payment");
        Ok(())
    }

    async fn send_status_update(
        &self,
        booking_id: &str,
        from: BookingStatus,
        to: BookingStatus,
    ) -> anyhow::Result<()> {
        tracing::info!(booking_id, %from, %to, "sending status update");
        Ok(())
    }
}

pub async fn handle_event(runner: &dyn TaskRunner, event: &BookingEvent) -> anyhow::Result<()> {
    match event {
        BookingEvent::Created {
            booking_id,
            guest_id,
            total_price,
        } => {
            runner.send_booking_confirmation(booking_id, guest_id).await?;
            runner.process_payment(booking_id, *total_price).await?;
        }
        BookingEvent::StatusChanged {
            booking_id,
            from,
            to,
        } => {
            runner.send_status_update(booking_id, *from, *to).await?;
        }
    }
    Ok(())
}

pub fn spawn_worker(runner: Arc<dyn TaskRunner>, mut events: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(e) = handle_event(runner.as_ref(), &event).await {
                tracing::error!(error = %e, ?event, "background task failed");
            }
        }
        tracing::info!("task worker stopped");
    })
}
