//! Domain models for the mailbox workspace

mod detail;
mod draft;
mod item;

pub use detail::{Field, ItemDetail, Variant, VariantId};
pub use draft::Draft;
pub use item::{Item, ItemFlags, ItemId, ItemPatch, MailContext};
