pub mod service;

pub use service::metered_call;
