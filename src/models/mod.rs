pub mod contact;
pub mod message;
pub mod template;
