pub mod agreement_service;
pub mod contract_service;
pub mod error;
pub mod feedback_service;
pub mod realtime_service;
pub mod reconciliation;
