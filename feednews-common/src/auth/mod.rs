//! Credential handling: password hashes for stored users and signed bearer tokens
//! for authenticated requests.

pub mod password;
pub mod token;
