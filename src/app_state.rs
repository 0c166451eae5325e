use chrono::Duration;
use std::sync::Arc;

use crate::assignment::AssignmentService;
use crate::config::Config;
use crate::db::store::Store;
use crate::delivery::email::{EmailChannel, SmtpMailer};
use crate::delivery::push::ExpoPushClient;
use crate::delivery::DeliveryError;
use crate::utils::notification::NotificationEnqueuer;
use crate::workers::{DispatchWorker, ReminderScheduler};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub enqueuer: NotificationEnqueuer,
    pub assignments: AssignmentService,
    pub reminders: ReminderScheduler,
    pub dispatcher: DispatchWorker,
}

impl AppState {
    /// Wires services and workers with the production delivery channels.
    pub fn new(store: Arc<dyn Store>, config: Config) -> Result<Self, DeliveryError> {
        let mut dispatcher = DispatchWorker::new(store.clone())
            .with_push(Arc::new(ExpoPushClient::new(config.push_endpoint.clone())));

        match &config.smtp {
            Some(smtp) => {
                let mailer = SmtpMailer::new(smtp)?;
                dispatcher = dispatcher.with_email(EmailChannel::new(Arc::new(mailer), smtp.from.clone()));
            }
            None => tracing::info!("SMTP not configured, email delivery disabled"),
        }

        Ok(Self::with_dispatcher(store, config, dispatcher))
    }

    /// Same wiring with a caller-supplied dispatch worker (fake transports in tests).
    pub fn with_dispatcher(store: Arc<dyn Store>, config: Config, dispatcher: DispatchWorker) -> Self {
        let enqueuer = NotificationEnqueuer::new(store.clone());
        let assignments = AssignmentService::new(store.clone(), enqueuer.clone());
        let reminders = ReminderScheduler::new(
            store.clone(),
            Duration::hours(config.reminder_horizon_hours),
            config.reminder_batch_size,
        );
        let dispatcher = dispatcher
            .with_portal_base_url(config.portal_base_url.clone())
            .with_limits(
                config.dispatch_batch_size,
                config.dispatch_concurrency,
                config.delivery_timeout,
            );

        Self {
            store,
            config: Arc::new(config),
            enqueuer,
            assignments,
            reminders,
            dispatcher,
        }
    }
}
