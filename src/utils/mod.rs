pub mod time;

pub use time::unix_now;
