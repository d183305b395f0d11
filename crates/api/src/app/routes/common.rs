use core::str::FromStr;

use courseware_core::DomainError;

use crate::app::errors;

/// Parse a typed id from a path segment, answering 400 on garbage.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(errors::domain_error_to_response)
}
