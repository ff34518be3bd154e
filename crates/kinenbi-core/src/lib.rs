// Core of the anniversary bot: the `Anniversary` model, the `Source` and
// `Sink` seams, the CSV-backed record store and the registry that drives a
// date range across every active source.

pub mod model;
pub mod record_store;
pub mod registry;
pub mod sink;
pub mod source;

pub use model::Anniversary;
pub use record_store::RecordStore;
pub use registry::{RunReport, SourceRegistry};
pub use sink::{DeliveryError, Sink};
pub use source::{LookupError, Source};
