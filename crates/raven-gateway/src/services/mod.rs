//! Built-in realtime services.

pub mod subscription;
pub mod typing;

pub use subscription::SubscriptionService;
pub use typing::TypingService;
