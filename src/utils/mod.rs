pub mod status;
pub mod url;
