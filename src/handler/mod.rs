pub mod contract;
pub mod negotiation;
pub mod realtime;
