pub mod auth;
pub mod bulk;
pub mod history;
pub mod internal_id;
pub mod notifications;
pub mod overtime;
pub mod policy;
pub mod state_machine;

pub use auth::{AuthService, Claims};
pub use bulk::BulkOutcome;
pub use notifications::{LogMailer, Mailer, NotificationDispatcher, Notifier};
pub use overtime::{CorrectionRequest, Inserted, OvertimeService};
pub use policy::Actor;
pub use state_machine::Outcome;
