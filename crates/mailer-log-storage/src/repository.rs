//! Repository layer for data access

pub mod emails;
pub mod events;

// Re-export concrete repository implementations with simple names
pub use emails::DbEmailRepository;
pub use events::DbEventRepository;

// Re-export repository traits
pub use emails::EmailRepository;
pub use events::EventRepository;
