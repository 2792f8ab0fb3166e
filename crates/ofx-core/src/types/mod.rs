//! 사이트 프로필과 계좌 정의.

pub mod account;
pub mod site;

pub use account::*;
pub use site::*;
