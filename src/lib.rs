pub mod api;
pub mod auction;
pub mod bidding;
pub mod connection;
pub mod feed;
pub mod floor;
pub mod listener;
pub mod room;
pub mod session;
