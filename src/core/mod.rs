pub mod order_steps;
pub mod pricing;
pub mod submission;
pub mod wizard;

pub use crate::domain::model::{OrderFormState, PriceEstimate};
pub use crate::domain::ports::{FunctionInvoker, SessionProvider, Storage, TableStore};
pub use crate::utils::error::Result;
