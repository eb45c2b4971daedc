pub mod api;

/// Conversion from interpreter records into HTTP response bodies.
pub trait ToResponse {
    type Response;

    fn to_response(&self) -> Self::Response;
}
