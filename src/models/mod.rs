pub mod contractmodel;
pub mod negotiationmodel;
pub mod usermodel;
