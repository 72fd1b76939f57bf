pub mod upload_object;

pub use upload_object::{
    UploadObjectOperation, UploadObjectOperationOutcome, UploadObjectOperationRequest,
    UploadObjectOperationResult,
};
