pub mod api;
pub mod models;

pub use models::{
    HomeType, Listing, Message, MessageKind, MessageStatus, Neighborhood, ParseEnumError, User,
};
