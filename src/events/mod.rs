use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the services after a successful commit. Consumed by the
/// background processing loop, which currently only logs them; integrations
/// (webhooks, mail) can hook in there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated(Uuid),
    CartItemAdded {
        cart_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
    CartItemUpdated {
        cart_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        cart_id: Uuid,
        line_id: Uuid,
    },
    CartCleared(Uuid),

    // Coupon events
    CouponApplied {
        cart_id: Uuid,
        coupon_id: Uuid,
    },
    CouponRemoved {
        cart_id: Uuid,
    },
    CouponRedeemed {
        coupon_id: Uuid,
        order_id: Uuid,
    },

    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrdersPurged {
        orders_deleted: u64,
    },

    // Fulfillment events
    ShipmentCreated {
        shipment_id: Uuid,
        order_id: Uuid,
    },

    // Stock events
    StockReserved {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
    StockReleased {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
    StockConsumed {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
    MovementRecorded {
        movement_id: Uuid,
        movement_type: String,
        quantity: i32,
    },
    LowStock {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        available: i32,
        min_stock_level: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event after the surrounding transaction already committed.
    /// A full channel must not fail the request at that point, so the error
    /// is logged and swallowed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Background loop draining the event channel. Runs for the lifetime of the
/// process; ends when every sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::LowStock {
                product_id,
                variant_id,
                available,
                min_stock_level,
            } => {
                warn!(
                    %product_id,
                    ?variant_id,
                    available,
                    min_stock_level,
                    "Stock below reorder threshold"
                );
            }
            other => info!("Event: {:?}", other),
        }
    }

    info!("Event processing loop stopped");
}
