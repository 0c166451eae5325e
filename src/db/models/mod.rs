pub mod assignment;
pub mod device_token;
pub mod notification;
pub mod task;
