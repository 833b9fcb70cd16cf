pub mod accessor;
pub mod bootstrap;
pub mod portal;
pub mod session;
pub mod upload;
pub mod validation;
