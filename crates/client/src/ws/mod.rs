pub mod events;
pub mod normalize;
pub mod transport;
