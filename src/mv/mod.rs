/*!
 * Mock manual verification (MV)
 *
 * Answers manual adjudication requests with an APPROVED or REJECTED decision,
 * programmable per registration ID through `/mv/config`.
 */

pub mod model;
pub mod routes;
pub mod service;

pub use model::MvExpectation;
pub use service::MvService;
