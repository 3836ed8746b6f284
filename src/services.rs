pub mod checkout;
pub mod reconciler;
pub mod reference;
pub mod validation;
