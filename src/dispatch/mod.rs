use crate::catalog::{CatalogProvider, candidate_names};
use crate::errors::AurabotError;
use crate::gateway::MessageGateway;
use crate::notify::{NotificationChannel, staff_order_notification};
use crate::order::{OrderAggregate, OrderItem, OrderStatus};
use crate::reply::RawCommand;
use crate::session::SessionManager;
use crate::store::OrderStore;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Suggestions attached to an `invalid_product` report.
const MAX_CANDIDATES: usize = 5;

/// A model-issued command after shape checking. Field spellings follow the
/// wire contract the model is prompted with (`retailer_id`, `bouquet`).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SendCatalog,
    SaveOrderInfo {
        item: Option<ItemSpec>,
        fields: Map<String, Value>,
    },
    UpdateOrderDelivery {
        fields: Map<String, Value>,
    },
    AddOrderItem {
        item: ItemSpec,
    },
    RemoveOrderItem {
        product_id: String,
    },
    ConfirmOrder,
    ClarifyRequest {
        clarification: String,
    },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::SendCatalog => "send_catalog",
            Command::SaveOrderInfo { .. } => "save_order_info",
            Command::UpdateOrderDelivery { .. } => "update_order_delivery",
            Command::AddOrderItem { .. } => "add_order_item",
            Command::RemoveOrderItem { .. } => "remove_order_item",
            Command::ConfirmOrder => "confirm_order",
            Command::ClarifyRequest { .. } => "clarify_request",
        }
    }
}

/// A line item as the model describes it. The price is never taken from the
/// model; it is filled in from the catalog at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub notes: Option<String>,
}

/// Structured outcome of one dispatched command, recorded as a `system`
/// transcript row so the next completion sees what actually happened.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DispatchReport {
    CatalogSent {
        count: usize,
    },
    OrderDataUpdated {
        fields: Vec<String>,
    },
    ItemAdded {
        product_id: String,
        name: String,
        quantity: u32,
    },
    InvalidProduct {
        requested: String,
        candidates: Vec<String>,
    },
    ItemRemoved {
        product_id: String,
    },
    OrderConfirmed {
        new_session_id: String,
    },
    IncompleteOrder {
        missing: Vec<String>,
        warnings: Vec<String>,
    },
    ClarificationSent {
        clarification: String,
    },
    Error {
        message: String,
    },
}

/// Check a raw command's shape and produce a typed [`Command`].
///
/// Unsupported types return `UnknownCommand` and malformed fields return
/// `Validation`; both feed the repair loop, which re-prompts the model with
/// the rejection, sharing its attempt budget.
pub fn decode(raw: &RawCommand) -> Result<Command, AurabotError> {
    match raw.kind.as_str() {
        "send_catalog" => Ok(Command::SendCatalog),
        "save_order_info" => Ok(Command::SaveOrderInfo {
            item: item_spec(&raw.fields),
            fields: raw.fields.clone(),
        }),
        "update_order_delivery" => Ok(Command::UpdateOrderDelivery {
            fields: raw.fields.clone(),
        }),
        "add_order_item" => {
            let item = item_spec(&raw.fields).ok_or_else(|| {
                AurabotError::Validation(
                    "add_order_item requires both 'retailer_id' and 'bouquet'".to_string(),
                )
            })?;
            Ok(Command::AddOrderItem { item })
        }
        "remove_order_item" => {
            let product_id = string_key(&raw.fields, "product_id")
                .or_else(|| string_key(&raw.fields, "retailer_id"))
                .ok_or_else(|| {
                    AurabotError::Validation("remove_order_item requires 'product_id'".to_string())
                })?;
            Ok(Command::RemoveOrderItem { product_id })
        }
        "confirm_order" => Ok(Command::ConfirmOrder),
        "clarify_request" => Ok(Command::ClarifyRequest {
            clarification: string_key(&raw.fields, "clarification").unwrap_or_default(),
        }),
        other => Err(AurabotError::UnknownCommand(other.to_string())),
    }
}

/// A line item is present only when the command carries both a product id and
/// a name. `product_id`/`name` are accepted as aliases for the wire keys.
fn item_spec(fields: &Map<String, Value>) -> Option<ItemSpec> {
    let product_id =
        string_key(fields, "retailer_id").or_else(|| string_key(fields, "product_id"))?;
    let name = string_key(fields, "bouquet").or_else(|| string_key(fields, "name"))?;
    Some(ItemSpec {
        product_id,
        name,
        quantity: coerce_quantity(fields.get("quantity")),
        notes: string_key(fields, "notes"),
    })
}

fn string_key(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let text = fields.get(key)?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Accept a number or a digit string; anything else falls back to 1.
fn coerce_quantity(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().map_or(1, |q| u32::try_from(q).unwrap_or(u32::MAX)),
        Some(Value::String(s)) => s.trim().parse::<u32>().unwrap_or(1),
        _ => 1,
    }
    .max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Received,
    Validated,
    Applied,
    Reported,
    Rejected,
}

/// Applies a decoded command to the session's order aggregate and runs its
/// side effects.
///
/// A command's mutations happen on an in-memory copy of the aggregate and are
/// persisted with a single `save`, so a failure anywhere leaves the stored
/// order untouched. Business rejections (invalid product, incomplete order)
/// come back as `Ok` report variants; infrastructure failures come back as
/// `Err`.
pub struct CommandDispatcher {
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogProvider>,
    gateway: Arc<dyn MessageGateway>,
    notifier: Arc<dyn NotificationChannel>,
    sessions: Arc<SessionManager>,
}

impl CommandDispatcher {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogProvider>,
        gateway: Arc<dyn MessageGateway>,
        notifier: Arc<dyn NotificationChannel>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            orders,
            catalog,
            gateway,
            notifier,
            sessions,
        }
    }

    pub async fn dispatch(
        &self,
        command: &Command,
        session_id: &str,
        sender_id: &str,
    ) -> Result<DispatchReport, AurabotError> {
        debug!(
            kind = command.kind(),
            session_id,
            state = ?DispatchState::Received,
            "dispatching command"
        );

        let report = match command {
            Command::SendCatalog => self.send_catalog(sender_id).await?,
            Command::SaveOrderInfo { item, fields } => {
                self.save_order_info(item.as_ref(), fields, session_id, sender_id)
                    .await?
            }
            Command::UpdateOrderDelivery { fields } => {
                self.update_order_fields(fields, session_id, sender_id).await?
            }
            Command::AddOrderItem { item } => {
                self.add_order_item(item, session_id, sender_id).await?
            }
            Command::RemoveOrderItem { product_id } => {
                self.remove_order_item(product_id, session_id, sender_id).await?
            }
            Command::ConfirmOrder => self.confirm_order(session_id, sender_id).await?,
            Command::ClarifyRequest { clarification } => {
                debug!(session_id, "clarification requested");
                DispatchReport::ClarificationSent {
                    clarification: clarification.clone(),
                }
            }
        };

        let state = match report {
            DispatchReport::InvalidProduct { .. }
            | DispatchReport::IncompleteOrder { .. }
            | DispatchReport::Error { .. } => DispatchState::Rejected,
            _ => DispatchState::Reported,
        };
        debug!(kind = command.kind(), session_id, state = ?state, "command dispatched");
        Ok(report)
    }

    async fn load_or_create(
        &self,
        session_id: &str,
        sender_id: &str,
    ) -> Result<OrderAggregate, AurabotError> {
        Ok(self
            .orders
            .load(session_id, sender_id)
            .await?
            .unwrap_or_else(|| OrderAggregate::new(session_id, sender_id)))
    }

    async fn send_catalog(&self, sender_id: &str) -> Result<DispatchReport, AurabotError> {
        let products = self.catalog.list_available().await?;
        if products.is_empty() {
            warn!("send_catalog requested but no products are available");
            return Ok(DispatchReport::Error {
                message: "catalog is empty".to_string(),
            });
        }

        let mut sent = 0usize;
        for product in &products {
            let caption = match product.price {
                Some(price) => format!("{}\n{} THB", product.name, price),
                None => product.name.clone(),
            };
            let result = match &product.image_url {
                Some(url) => {
                    self.gateway
                        .send_image_with_caption(sender_id, url, &caption)
                        .await
                }
                None => self.gateway.send_text(sender_id, &caption).await,
            };
            match result {
                Ok(_) => sent += 1,
                Err(e) => {
                    warn!(product_id = %product.id, error = %e, "catalog entry send failed");
                }
            }
        }

        if sent == 0 {
            return Ok(DispatchReport::Error {
                message: "catalog delivery failed".to_string(),
            });
        }
        info!(count = sent, "catalog sent");
        Ok(DispatchReport::CatalogSent { count: sent })
    }

    async fn save_order_info(
        &self,
        item: Option<&ItemSpec>,
        fields: &Map<String, Value>,
        session_id: &str,
        sender_id: &str,
    ) -> Result<DispatchReport, AurabotError> {
        let mut order = self.load_or_create(session_id, sender_id).await?;

        // An invalid product does not block the general fields; the model is
        // told about catalog problems through add_order_item instead.
        if let Some(spec) = item {
            let check = self.catalog.validate(&spec.product_id).await?;
            if check.valid {
                let price = check.product.as_ref().and_then(|p| p.price);
                order.upsert_item(OrderItem {
                    product_id: spec.product_id.clone(),
                    name: spec.name.clone(),
                    quantity: spec.quantity,
                    price,
                    notes: spec.notes.clone(),
                });
            } else {
                warn!(product_id = %spec.product_id, "item skipped, not in catalog");
            }
        }

        let applied = order.apply_fields(fields);
        debug!(session_id, state = ?DispatchState::Validated, ?applied, "order fields merged");
        self.orders.save(&order).await?;
        debug!(session_id, state = ?DispatchState::Applied, "order saved");
        Ok(DispatchReport::OrderDataUpdated {
            fields: applied.iter().map(ToString::to_string).collect(),
        })
    }

    async fn update_order_fields(
        &self,
        fields: &Map<String, Value>,
        session_id: &str,
        sender_id: &str,
    ) -> Result<DispatchReport, AurabotError> {
        let mut order = self.load_or_create(session_id, sender_id).await?;
        let applied = order.apply_fields(fields);
        self.orders.save(&order).await?;
        Ok(DispatchReport::OrderDataUpdated {
            fields: applied.iter().map(ToString::to_string).collect(),
        })
    }

    async fn add_order_item(
        &self,
        spec: &ItemSpec,
        session_id: &str,
        sender_id: &str,
    ) -> Result<DispatchReport, AurabotError> {
        let check = self.catalog.validate(&spec.product_id).await?;
        if !check.valid {
            let available = self.catalog.list_available().await.unwrap_or_default();
            info!(product_id = %spec.product_id, "rejected item not present in catalog");
            return Ok(DispatchReport::InvalidProduct {
                requested: spec.product_id.clone(),
                candidates: candidate_names(&available, MAX_CANDIDATES),
            });
        }

        let mut order = self.load_or_create(session_id, sender_id).await?;
        let price = check.product.as_ref().and_then(|p| p.price);
        order.upsert_item(OrderItem {
            product_id: spec.product_id.clone(),
            name: spec.name.clone(),
            quantity: spec.quantity,
            price,
            notes: spec.notes.clone(),
        });
        self.orders.save(&order).await?;
        info!(session_id, product_id = %spec.product_id, quantity = spec.quantity, "item added");
        Ok(DispatchReport::ItemAdded {
            product_id: spec.product_id.clone(),
            name: spec.name.clone(),
            quantity: spec.quantity,
        })
    }

    async fn remove_order_item(
        &self,
        product_id: &str,
        session_id: &str,
        sender_id: &str,
    ) -> Result<DispatchReport, AurabotError> {
        let mut order = self.load_or_create(session_id, sender_id).await?;
        if !order.remove_item(product_id) {
            return Ok(DispatchReport::Error {
                message: format!("product '{}' is not in the order", product_id),
            });
        }
        self.orders.save(&order).await?;
        info!(session_id, product_id, "item removed");
        Ok(DispatchReport::ItemRemoved {
            product_id: product_id.to_string(),
        })
    }

    async fn confirm_order(
        &self,
        session_id: &str,
        sender_id: &str,
    ) -> Result<DispatchReport, AurabotError> {
        let mut order = self.load_or_create(session_id, sender_id).await?;

        let validation = order.validate();
        if !validation.complete {
            info!(session_id, missing = ?validation.missing_required, "confirmation rejected");
            return Ok(DispatchReport::IncompleteOrder {
                missing: validation.missing_required,
                warnings: validation.warnings,
            });
        }

        if let Err(e) = order.advance(OrderStatus::Confirmed) {
            return Ok(DispatchReport::Error {
                message: e.to_string(),
            });
        }
        self.orders.save(&order).await?;

        // The confirmed order is durable at this point. Notification and
        // session renewal failures must not un-confirm it.
        let note = staff_order_notification(&order, sender_id);
        if let Err(e) = self.notifier.push(&note).await {
            warn!(session_id, error = %e, "staff notification failed");
        }

        let new_session_id = self.sessions.renew_after_order(sender_id).await?;
        info!(
            order_id = %order.order_id,
            new_session_id = %new_session_id,
            "order confirmed"
        );
        Ok(DispatchReport::OrderConfirmed { new_session_id })
    }
}
