pub mod audit;
pub mod decline;
pub mod error;
pub mod gateway;
pub mod id;
pub mod money;
pub mod request;
pub mod store;
pub mod transaction;
