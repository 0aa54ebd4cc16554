//! Repository-style queries. Every function takes the connection (or open
//! transaction) it runs on; the `Database` methods wrap them in a unit of work.

pub mod chat;
pub mod courses;
pub mod discussion;
pub mod groups;
pub mod users;
pub mod votes;
