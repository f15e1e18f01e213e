pub mod transport;

pub use transport::{
    ApiRequest, ApiResponse, Deadline, FilePart, MultipartBody, RequestBody, TransportClient,
};
