#[path = "../common/mod.rs"]
mod common;

mod atomicity;
mod conflict;
mod expiry;
mod lifecycle;
mod limits;
