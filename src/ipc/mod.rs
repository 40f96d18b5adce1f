pub mod tcp;

pub use tcp::{Connection, Dialer};
