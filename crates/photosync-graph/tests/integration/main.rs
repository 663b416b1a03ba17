//! Integration tests for photosync-graph
//!
//! Uses wiremock to simulate the Microsoft Graph API and the identity
//! platform, and verifies end-to-end behavior of lookups, listings,
//! uploads, downloads and the device-code authenticator.


mod test_auth;
mod test_token_renewal;
mod test_upload;
