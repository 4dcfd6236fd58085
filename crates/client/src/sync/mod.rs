pub mod attribution;
pub mod outbox;
pub mod poller;
pub mod roster;
pub mod session;
pub mod typing;
pub mod uploads;
