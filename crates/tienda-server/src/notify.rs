//! One-shot notification fan-out for freshly confirmed orders.
//!
//! Each side effect (client email, admin email, platform webhook) is fired
//! independently: a failure is logged and never blocks the others, and the
//! caller only invokes this for the call that actually performed the
//! `pending -> paid` transition, which is what bounds every effect to
//! exactly once per order.

use rust_decimal::Decimal;

use tienda_core::OrderLineView;
use tienda_db::{CustomerRow, OrderRow};
use tienda_platform::{NewSalePayload, SaleCustomer, SaleItem, SaleShipping};

use crate::api::AppState;

/// Outbound mail boundary. Actual SMTP wiring lives outside this service;
/// the default implementation logs the would-be delivery.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str);
}

/// Mailer that records deliveries in the log instead of sending them.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) {
        tracing::info!(to, subject, body_len = body.len(), "email delivery (log only)");
    }
}

/// Fires all confirmation side effects for an order that just became paid.
///
/// Never returns an error: every failure path is logged and swallowed so
/// the already-committed state transition is unaffected.
pub async fn fire_confirmation_effects(state: &AppState, order_id: i64, payment_reference: &str) {
    let (order, customer, _items) = match tienda_db::get_order(&state.pool, order_id).await {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!(order_id, error = %e, "cannot load order for notifications");
            return;
        }
    };

    let lines = match tienda_db::order_line_views(&state.pool, order_id).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::error!(order_id, error = %e, "cannot load order lines for notifications");
            Vec::new()
        }
    };

    let (subject, body) = format_client_email(&order, &customer, &lines);
    state.mailer.send(&customer.email, &subject, &body);

    let (subject, body) = format_admin_email(&order, &customer, &lines);
    state.mailer.send(&state.config.admin_email, &subject, &body);

    let payload = build_sale_payload(&order, &customer, &lines, payment_reference);
    if let Err(e) = state.platform.notify_new_sale(&payload).await {
        tracing::error!(order_id, error = %e, "platform new-sale notification failed");
    }
}

fn format_lines(lines: &[OrderLineView]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&format!(
            "  {} x{} — ${}\n",
            line.label(),
            line.quantity(),
            line.line_total()
        ));
    }
    out
}

/// Client-facing confirmation body; plain text, HTML templating is handled
/// by the mail provider.
fn format_client_email(
    order: &OrderRow,
    customer: &CustomerRow,
    lines: &[OrderLineView],
) -> (String, String) {
    let subject = format!("Confirmación de compra — Orden #{}", order.id);
    let body = format!(
        "Hola {},\n\n¡Gracias por tu compra! Tu pago fue acreditado.\n\n\
         Orden #{}\n{}\nTotal: ${}\nEntrega: {}\n",
        customer.full_name,
        order.id,
        format_lines(lines),
        order.total_amount,
        order.delivery_method,
    );
    (subject, body)
}

fn format_admin_email(
    order: &OrderRow,
    customer: &CustomerRow,
    lines: &[OrderLineView],
) -> (String, String) {
    let subject = format!("Nueva venta — Orden #{}", order.id);
    let body = format!(
        "Orden #{} pagada.\nCliente: {} <{}>\n{}\nTotal: ${}\n",
        order.id,
        customer.full_name,
        customer.email,
        format_lines(lines),
        order.total_amount,
    );
    (subject, body)
}

/// Assembles the management-platform payload from persisted order state.
fn build_sale_payload(
    order: &OrderRow,
    customer: &CustomerRow,
    lines: &[OrderLineView],
    payment_reference: &str,
) -> NewSalePayload {
    let billing = order.billing_data.clone().unwrap_or_default();
    let shipping_data = order.shipping_data.clone().unwrap_or_default();

    let doc_number = billing
        .get("dni")
        .or_else(|| billing.get("cuit"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let doc_type = billing
        .get("invoice_type")
        .and_then(|v| v.as_str())
        .unwrap_or("Consumer")
        .to_string();

    let items: Vec<SaleItem> = lines
        .iter()
        .map(|line| SaleItem {
            sku: line.correlation_sku(),
            quantity: line.quantity(),
            unit_price: line.unit_price(),
        })
        .collect();

    // Shipping cost is not stored on its own column; it is the difference
    // between the charged total and the item lines.
    let items_total: Decimal = lines.iter().map(OrderLineView::line_total).sum();
    let shipping_cost = (order.total_amount - items_total).max(Decimal::ZERO);

    let (address, pickup_details) = if order.delivery_method == "pickup" {
        (
            None,
            Some(serde_json::json!({
                "name": shipping_data.get("pickup_name").cloned().unwrap_or_default(),
                "dni": shipping_data.get("pickup_dni").cloned().unwrap_or_default(),
            })),
        )
    } else {
        (
            Some(serde_json::json!({
                "street": shipping_data.get("address").cloned().unwrap_or_default(),
                "city": shipping_data.get("city").cloned().unwrap_or_default(),
                "state": shipping_data.get("province").cloned().unwrap_or_default(),
                "zip": shipping_data.get("zip_code").cloned().unwrap_or_default(),
            })),
            None,
        )
    };

    NewSalePayload {
        external_order_id: format!("#{}", order.id),
        payment_id: payment_reference.to_string(),
        date: order.created_at,
        customer: SaleCustomer {
            name: customer.full_name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone().unwrap_or_default(),
            doc_type,
            doc_number,
        },
        shipping: SaleShipping {
            r#type: order.delivery_method.clone(),
            cost: shipping_cost,
            address,
            pickup_details,
        },
        billing,
        items,
        total: order.total_amount,
        payment_method: "mercadopago".to_string(),
    }
}
