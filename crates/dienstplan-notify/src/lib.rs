pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod types;

pub use dispatch::Dispatcher;
pub use error::DeliveryError;
pub use gateway::{LogGateway, NotificationGateway};
pub use types::{Channel, DeliveryReport, NotificationRequest, TemplateKind};
