/*!
 * Mock biometric back-end services
 *
 * This crate provides three expectation-driven mocks behind one HTTP server:
 * - Proxy ABIS: insert, identify and delete against an in-memory gallery
 * - Manual verification: APPROVED / REJECTED adjudication decisions
 * - SBI capture: per-session sub-sample capture from template profiles
 */

pub mod abis;
pub mod capture;
pub mod config;
pub mod decision;
pub mod delivery;
pub mod envelope;
pub mod error;
pub mod expectation;
pub mod mv;
pub mod scheduler;
pub mod server;

pub use config::ServiceConfig;
pub use error::{ApiError, FailureReason, ServiceError};
pub use server::{AppState, Server};
