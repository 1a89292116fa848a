pub mod dispatch;
pub mod push;
