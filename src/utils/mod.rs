pub mod auth;
pub mod calc;
pub mod logging;
#[cfg(test)]
pub mod test_utils;
pub mod url;
