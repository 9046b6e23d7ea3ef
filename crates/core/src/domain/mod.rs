pub mod destination;
pub mod session;
pub mod slots;
