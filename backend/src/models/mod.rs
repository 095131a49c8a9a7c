pub mod config;
pub mod hebrew;
pub mod location;
pub mod sun;
pub mod time;

pub use config::*;
pub use hebrew::*;
pub use location::*;
pub use sun::*;
pub use time::*;
