pub mod channel;
pub mod error;

pub use channel::{CommittedChannel, IncomeRecord, Invoice, PaymentChannel};
pub use error::{Code, OracleError, StoreError, ValidationError};
