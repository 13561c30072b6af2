use serde::{Deserialize, Serialize};
use validator::Validate;

//Contract lifecycle DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CancelContractDto {
    #[validate(length(min = 1, max = 500, message = "Cancellation reason must be between 1 and 500 characters"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitFeedbackDto {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(min = 5, max = 1000, message = "Comment must be between 5 and 1000 characters"))]
    pub comment: String,
}
