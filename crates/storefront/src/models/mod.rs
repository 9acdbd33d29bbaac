//! Domain models for the storefront.
//!
//! Records are plain data: persistence lives in [`crate::db`], behaviour in
//! [`crate::services`].

pub mod cart;
pub mod principal;
pub mod product;
pub mod ticket;
pub mod user;

pub use cart::{Cart, CartLine, PopulatedCart, PopulatedLine};
pub use principal::Principal;
pub use product::{NewProduct, Product};
pub use ticket::{NewTicket, Ticket};
pub use user::{NewUser, User};
