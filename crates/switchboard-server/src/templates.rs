use switchboard_gateway::notify::TemplateResolver;
use switchboard_types::models::{NotificationContent, NotificationContext, NotificationKind, Role};

/// Built-in English templates, one per notification kind and audience.
/// The storefront normally injects its own localized resolver; this keeps
/// the binary usable on its own.
pub struct DefaultTemplates;

impl TemplateResolver for DefaultTemplates {
    fn render(
        &self,
        kind: NotificationKind,
        role: Role,
        context: &NotificationContext,
    ) -> NotificationContent {
        let name = context.display_name.as_deref().unwrap_or("A customer");
        let link = context.link.clone();

        let (title, body, default_link) = match (kind, role) {
            (NotificationKind::Payment, Role::Admin) => (
                "Payment received".to_string(),
                match &context.amount {
                    Some(amount) => format!("{} paid {}", name, amount),
                    None => format!("{} completed a payment", name),
                },
                "/admin/payments".to_string(),
            ),
            (NotificationKind::Payment, _) => (
                "Payment confirmed".to_string(),
                match &context.amount {
                    Some(amount) => format!("We received your payment of {}", amount),
                    None => "We received your payment".to_string(),
                },
                "/account/billing".to_string(),
            ),

            (NotificationKind::Order, Role::Admin) => (
                "New order".to_string(),
                match &context.order_id {
                    Some(order_id) => format!("{} placed order {}", name, order_id),
                    None => format!("{} placed an order", name),
                },
                "/admin/orders".to_string(),
            ),
            (NotificationKind::Order, _) => (
                "Order received".to_string(),
                match &context.order_id {
                    Some(order_id) => format!("Your order {} is being processed", order_id),
                    None => "Your order is being processed".to_string(),
                },
                "/account/orders".to_string(),
            ),

            (NotificationKind::Subscription, Role::Admin) => (
                "Subscription update".to_string(),
                match &context.plan {
                    Some(plan) => format!("{} is now on the {} plan", name, plan),
                    None => format!("{}'s subscription changed", name),
                },
                "/admin/subscriptions".to_string(),
            ),
            (NotificationKind::Subscription, _) => (
                "Subscription updated".to_string(),
                match &context.plan {
                    Some(plan) => format!("Your {} plan is active", plan),
                    None => "Your subscription was updated".to_string(),
                },
                "/account/subscription".to_string(),
            ),

            (NotificationKind::SupportMessage, Role::Admin) => (
                "New support message".to_string(),
                format!("{} wrote in support chat", name),
                "/admin/support".to_string(),
            ),
            (NotificationKind::SupportMessage, _) => (
                "Support replied".to_string(),
                "You have a new reply from support".to_string(),
                "/support".to_string(),
            ),

            (NotificationKind::System, _) => (
                "Service notice".to_string(),
                context
                    .event
                    .clone()
                    .unwrap_or_else(|| "A system event occurred".to_string()),
                "/".to_string(),
            ),
        };

        NotificationContent {
            title,
            body,
            link: link.unwrap_or(default_link),
        }
    }
}
