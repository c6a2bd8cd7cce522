//! JSON API client with envelope normalization and request logging.

mod client;
mod error;
mod util;

pub use client::{
    ApiClient, ApiClientBuilder, ClientBuildError, DEFAULT_TIMEOUT, REQUEST_ID_HEADER,
    RequestOptions, generate_request_id,
};
pub use error::TransportError;
pub use util::{
    DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, PaginationParams, pagination_params,
    request_id_from_headers,
};
pub use reqwest::Method;
