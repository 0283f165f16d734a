/*!
 * Proxy ABIS mock
 *
 * Stores template hashes for inserted references and answers identify
 * requests with the references sharing them. Expectations programmed through
 * `/abis/config` can force errors, duplicates and delays.
 */

pub mod model;
pub mod routes;
pub mod service;
pub mod store;
pub mod template;

pub use model::AbisExpectation;
pub use service::{AbisOutcome, AbisService};
pub use store::BiometricStore;
pub use template::{HttpTemplateSource, TemplateSource};
