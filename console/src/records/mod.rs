//! Flat application records reshaped from the remote API's wire format.

pub mod contacto;
pub mod documento;

pub use contacto::{Contacto, ContactoItem, group_contactos};
pub use documento::{Documento, Producto};
