//! docvault-server: HTTP front end for the docvault document store
//!
//! A thin dispatcher over `docvault-auth` and `docvault-storage`: parses
//! requests, resolves the session, asks the authorizer, then touches
//! metadata and bytes.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
