use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use switchboard_db::models::NotificationRow;
use switchboard_types::events::{ServerEvent, UnreadScope};
use switchboard_types::models::{
    Notification, NotificationContent, NotificationContext, NotificationKind, NotificationRequest,
    Role,
};

use crate::error::{HubError, blocking_join};
use crate::hub::Hub;

/// Produces title/body/link text for a notification. Implementations are
/// injected; the hub never formats user-facing strings itself.
pub trait TemplateResolver: Send + Sync {
    fn render(
        &self,
        kind: NotificationKind,
        role: Role,
        context: &NotificationContext,
    ) -> NotificationContent;
}

impl Hub {
    /// One row for the target user, pushed live to every connection they
    /// currently hold.
    pub async fn create_for_user(&self, request: NotificationRequest) -> Result<(), HubError> {
        let context = NotificationContext::from_request(&request);
        self.deliver_to(request.user.user_id, Role::User, request.kind, &context)
            .await?;
        Ok(())
    }

    /// One row per admin account. Best effort by policy: a failure for one
    /// admin is logged and the loop moves on — rows already written stay.
    pub async fn create_for_admins(&self, request: NotificationRequest) -> Result<(), HubError> {
        let context = NotificationContext::from_request(&request);

        let db = self.db.clone();
        let admin_ids = tokio::task::spawn_blocking(move || db.list_admin_user_ids())
            .await
            .map_err(blocking_join)??;

        for raw in admin_ids {
            let admin_id: Uuid = match raw.parse() {
                Ok(id) => id,
                Err(e) => {
                    error!(admin = %raw, %e, "skipping admin with corrupt id");
                    continue;
                }
            };
            if let Err(err) = self
                .deliver_to(admin_id, Role::Admin, request.kind, &context)
                .await
            {
                error!(admin = %admin_id, %err, "notification fan-out failed for admin");
            }
        }
        Ok(())
    }

    /// Admin set plus the target user: (number of admins) + 1 rows.
    pub async fn create_for_both(&self, request: NotificationRequest) -> Result<(), HubError> {
        self.create_for_admins(request.clone()).await?;
        self.create_for_user(request).await?;
        Ok(())
    }

    /// Render, persist one row, push it to the recipient's live connections,
    /// then push their recomputed unread badge. A recipient who disconnected
    /// while the write was in flight simply receives nothing.
    async fn deliver_to(
        &self,
        recipient: Uuid,
        role: Role,
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> Result<(), HubError> {
        let content = self.templates.render(kind, role, context);
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_user_id: recipient,
            kind,
            title: content.title,
            body: content.body,
            link: content.link,
            is_read: false,
            created_at: Utc::now(),
        };

        let db = self.db.clone();
        let row = NotificationRow::from_notification(&notification);
        let recipient_key = recipient.to_string();
        let unread = tokio::task::spawn_blocking(move || {
            db.insert_notification(&row)?;
            db.unread_notification_count(&recipient_key)
        })
        .await
        .map_err(blocking_join)??;

        let event = match role {
            Role::Admin => ServerEvent::NotificationCreated { notification },
            _ => ServerEvent::NotificationReceived { notification },
        };
        self.presence.send_to_user(recipient, &event);
        self.presence.send_to_user(
            recipient,
            &ServerEvent::UnreadCount {
                scope: UnreadScope::Notifications,
                conversation_id: None,
                count: unread,
            },
        );
        Ok(())
    }
}
