//! Notification delivery for Alertline.
//!
//! | Notifier | Feature   | Transport                         |
//! |----------|-----------|-----------------------------------|
//! | email    | `email`   | SMTP via lettre                   |
//! | zulip    | `zulip`   | Zulip REST API via reqwest        |
//! | webhook  | `webhook` | JSON POST via reqwest             |
//! | console  | always    | stdout                            |
//! | memory   | always    | in-process buffer, used in tests  |
//!
//! Every notifier carries a [`NotifierFilter`]; the [`Dispatcher`] sends a
//! report only to notifiers whose filter accepts it.
//!
//! ```rust,no_run
//! use alertline_notifiers::{build_notifiers, Dispatcher, NotifierConfig};
//!
//! # async fn example(report: alertline_core::Report) -> alertline_notifiers::Result<()> {
//! let notifiers = build_notifiers(&[NotifierConfig::new("console", "stdout")])?;
//! let dispatcher = Dispatcher::with_notifiers(notifiers);
//! dispatcher.dispatch(&report).await?;
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod format;

pub use channels::{
    ConsoleNotifier, MemoryNotifier, Notifier, NotifierFactory, NotifierInfo,
};
pub use config::{build_notifiers, default_factories, NotifierConfig};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use filter::NotifierFilter;

#[cfg(feature = "email")]
pub use channels::EmailNotifier;
#[cfg(feature = "webhook")]
pub use channels::WebhookNotifier;
#[cfg(feature = "zulip")]
pub use channels::{ZulipNotifier, ZulipTarget};
