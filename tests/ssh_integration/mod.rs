//! SSH integration tests
//!
//! Every test starts a bastion on a loopback port and talks to it with a
//! real russh client, so no external services are needed.
//!
//! ## Running the tests
//!
//! ```bash
//! cargo test --test ssh_integration
//! ```


mod auth_tests;
mod tunnel_tests;
