pub mod countdown;
pub mod data;
pub mod endpoints;
pub mod events;
pub mod schedule;
pub mod status;
pub mod time;
pub mod util;
