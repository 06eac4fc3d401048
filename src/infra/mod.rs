//! Network access and local persistence.

pub mod esi;
pub mod orders;
pub mod provider;
pub mod reference;
pub mod store;
