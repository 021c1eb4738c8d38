pub mod activity;
pub mod controller;
pub mod machine;
pub mod resolver;
pub mod target;

pub use activity::ActivityPulse;
pub use controller::PollingController;
pub use machine::PollingState;
pub use resolver::SettingsResolver;
pub use target::CachedResource;
