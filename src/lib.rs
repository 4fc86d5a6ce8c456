#![no_std]

extern crate alloc;

mod tlv;
mod name;
mod metainfo;
mod signature;

mod crypto;
mod data;
mod interest;

mod face;

pub use tlv::*;
pub use name::*;
pub use metainfo::*;
pub use signature::*;

pub use crypto::*;
pub use data::*;
pub use interest::*;

pub use face::*;
