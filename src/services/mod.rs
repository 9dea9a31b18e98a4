//! Business logic services

pub mod alertmanager;
pub mod exporter;
pub mod fingerprint;
pub mod irm;
pub mod reconciler;

pub use alertmanager::AlertmanagerClient;
pub use exporter::Exporter;
pub use fingerprint::{fingerprint_index, IndexMode};
pub use irm::IrmClient;
pub use reconciler::{detect_inconsistencies, run_export_loop, Inconsistency, Reconciler};
