//! Authentication endpoints: signup, verification, login, passwords.

pub mod login;
pub mod otp;
pub mod password;
pub mod signup;
pub mod types;
