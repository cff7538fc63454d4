pub mod mail_object;
pub mod mail_payload;
